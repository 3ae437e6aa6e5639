use std::sync::Arc;

use parking_lot::Mutex;

use super::helpers::execute_on;
use crate::error::VmError;
use crate::thread::Thread;
use crate::value::{Env, Value};

fn thread_with_library() -> Thread {
    let mut thread = Thread::new("test");
    thread.set_load(Some(Arc::new(|_thread: &mut Thread, module: &str| {
        if module != "lib.star" {
            return Err(VmError::runtime("no such module"));
        }
        let mut env = Env::new();
        env.insert("greeting".to_string(), Value::string("hello"));
        env.insert("answer".to_string(), Value::Int(42));
        Ok(env)
    })));
    thread
}

#[test]
fn test_load_with_alias() {
    let mut thread = thread_with_library();
    let source = "load(\"lib.star\", \"greeting\", n = \"answer\")\n(greeting, n)\n";
    let value = execute_on(&mut thread, source).unwrap();
    assert_eq!(value.repr(), r#"("hello", 42)"#);
}

#[test]
fn test_load_missing_name() {
    let mut thread = thread_with_library();
    let err = execute_on(&mut thread, "load(\"lib.star\", \"nope\")\n").unwrap_err();
    assert_eq!(err.message, "load: name nope not found in module lib.star");
}

#[test]
fn test_load_failure_is_wrapped() {
    let mut thread = thread_with_library();
    let err = execute_on(&mut thread, "load(\"other.star\", \"x\")\n").unwrap_err();
    assert_eq!(err.message, "cannot load other.star: no such module");
}

#[test]
fn test_print_hook_receives_output() {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = lines.clone();
    let mut thread = Thread::new("test");
    thread.set_print(Some(Arc::new(move |_thread: &Thread, msg: &str| {
        sink.lock().push(msg.to_string());
    })));
    execute_on(&mut thread, "print('a', 1)\nprint('b', sep = ',')\n").unwrap();
    assert_eq!(*lines.lock(), ["a 1", "b"]);
}
