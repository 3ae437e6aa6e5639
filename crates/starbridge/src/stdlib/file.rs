//! Host file access
//!
//! Paths are host paths, not resolved through the machine's file
//! provider. Text must be UTF-8.

use std::fs::{self, OpenOptions};
use std::io::Write;

use starbridge_vm::builtins::registry::BuiltinRegistry;
use starbridge_vm::{Args, Env, Thread, Value, VmError};

use super::{module_env, str_arg};

pub const NAME: &str = "file";

pub fn load() -> Result<Env, VmError> {
    let mut registry = BuiltinRegistry::new();
    registry.register("read_string", vm_read_string);
    registry.register("read_lines", vm_read_lines);
    registry.register("write_string", vm_write_string);
    registry.register("write_lines", vm_write_lines);
    registry.register("append_string", vm_append_string);
    module_env(NAME, registry)
}

fn io_error(fname: &str, path: &str, err: std::io::Error) -> VmError {
    VmError::runtime(format!("{fname}: {path}: {err}"))
}

fn read(fname: &str, args: &Args) -> Result<String, VmError> {
    let [name] = args.unpack(fname, ["name"])?;
    let path = str_arg(fname, "name", &name)?;
    fs::read_to_string(path).map_err(|e| io_error(fname, path, e))
}

fn vm_read_string(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    read("read_string", args).map(Value::string)
}

/// Lines without terminators; a trailing newline does not add an empty line
fn vm_read_lines(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let text = read("read_lines", args)?;
    Ok(Value::list(text.lines().map(Value::string).collect()))
}

fn write(fname: &str, path: &str, data: &str, append: bool) -> Result<Value, VmError> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)
        .map_err(|e| io_error(fname, path, e))?;
    file.write_all(data.as_bytes()).map_err(|e| io_error(fname, path, e))?;
    Ok(Value::None)
}

fn vm_write_string(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [name, data] = args.unpack("write_string", ["name", "data"])?;
    let path = str_arg("write_string", "name", &name)?;
    write("write_string", path, str_arg("write_string", "data", &data)?, false)
}

fn vm_append_string(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [name, data] = args.unpack("append_string", ["name", "data"])?;
    let path = str_arg("append_string", "name", &name)?;
    write("append_string", path, str_arg("append_string", "data", &data)?, true)
}

/// Each element is written with `str()` and terminated by a newline
fn vm_write_lines(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [name, lines] = args.unpack("write_lines", ["name", "lines"])?;
    let path = str_arg("write_lines", "name", &name)?;
    let mut text = String::new();
    for line in lines.iterate()? {
        text.push_str(&line.to_str());
        text.push('\n');
    }
    write("write_lines", path, &text, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(f: fn(&mut Thread, &Args) -> Result<Value, VmError>, args: Vec<Value>) -> Result<Value, VmError> {
        f(&mut Thread::new("t"), &Args::new(args))
    }

    #[test]
    fn test_write_append_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let path = Value::string(path.to_string_lossy());

        call(vm_write_lines, vec![path.clone(), Value::list(vec![Value::string("a"), Value::Int(1)])]).unwrap();
        call(vm_append_string, vec![path.clone(), Value::string("tail")]).unwrap();

        assert_eq!(call(vm_read_string, vec![path.clone()]).unwrap(), Value::string("a\n1\ntail"));
        assert_eq!(
            call(vm_read_lines, vec![path.clone()]).unwrap(),
            Value::list(vec![Value::string("a"), Value::string("1"), Value::string("tail")])
        );

        call(vm_write_string, vec![path.clone(), Value::string("new")]).unwrap();
        assert_eq!(call(vm_read_string, vec![path]).unwrap(), Value::string("new"));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope");
        let err = call(vm_read_string, vec![Value::string(path.to_string_lossy())]).unwrap_err();
        assert!(err.message.starts_with("read_string:"));
    }
}
