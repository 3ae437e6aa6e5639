use std::thread;
use std::time::Duration;

use super::helpers::execute_on;
use crate::thread::Thread;

const SPIN: &str = "def spin():\n    while True:\n        pass\n\nspin()\n";

#[test]
fn test_cancel_from_another_thread() {
    let mut vm_thread = Thread::new("test");
    let handle = vm_thread.cancel_handle();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        handle.cancel("timeout");
    });

    let err = execute_on(&mut vm_thread, SPIN).unwrap_err();
    canceller.join().unwrap();
    assert!(err.is_cancelled());
    assert_eq!(err.message, "Starlark computation cancelled: timeout");
}

#[test]
fn test_cancelled_before_start() {
    let mut vm_thread = Thread::new("test");
    vm_thread.cancel("early");
    let err = execute_on(&mut vm_thread, "x = 1\n").unwrap_err();
    assert!(err.is_cancelled());

    vm_thread.uncancel();
    assert!(execute_on(&mut vm_thread, "x = 1\n").is_ok());
}
