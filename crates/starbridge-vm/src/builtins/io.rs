//! Output built-ins

use crate::error::VmError;
use crate::thread::Thread;
use crate::value::{Args, Value};

/// Join positional arguments with `sep`, `str()`-style
fn joined(fname: &str, args: &Args) -> Result<String, VmError> {
    let mut sep = " ".to_string();
    for (name, value) in &args.named {
        match (name.as_str(), value) {
            ("sep", Value::String(s)) => sep = s.to_string(),
            ("sep", other) => return Err(VmError::arg_type(fname, "sep", "string", other)),
            (other, _) => {
                return Err(VmError::runtime(format!("{fname}: unexpected keyword argument \"{other}\"")))
            }
        }
    }
    Ok(args.positional.iter().map(Value::to_str).collect::<Vec<_>>().join(&sep))
}

/// print(*args, sep=" ")
pub fn vm_print(thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let line = joined("print", args)?;
    thread.print(&line);
    Ok(Value::None)
}

/// fail(*args, sep=" ") always errors
pub fn vm_fail(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let msg = joined("fail", args)?;
    Err(VmError::runtime(format!("fail: {msg}")))
}
