//! Helper functions and common imports for integration tests.

use crate::options::Options;
use crate::program::compile;
use crate::thread::Thread;
use crate::value::{Env, Value};
use crate::VmError;

/// Compile and execute source code, returning the value of its final
/// expression statement (None when it ends with any other statement)
pub fn execute(source: &str) -> Result<Value, VmError> {
    execute_on(&mut Thread::new("test"), source)
}

/// Like `execute`, on a caller-provided thread
pub fn execute_on(thread: &mut Thread, source: &str) -> Result<Value, VmError> {
    let program = compile("test.star", source)?;
    let (_, value) = program.init_repl(thread, &Env::new())?;
    Ok(value.unwrap_or(Value::None))
}

/// Execute with dialect options and return the frozen globals
pub fn execute_with(options: Options, source: &str) -> Result<Env, VmError> {
    let program = compile("test.star", source)?;
    program.init(&mut Thread::with_options("test", options), &Env::new())
}

/// Execute and return the error message; panics if execution succeeds
pub fn execute_err(source: &str) -> String {
    match execute(source) {
        Ok(value) => panic!("expected an error, got {}", value.repr()),
        Err(err) => err.message,
    }
}

/// Execute and return the repr of the final expression
pub fn repr(source: &str) -> String {
    execute(source).unwrap().repr()
}
