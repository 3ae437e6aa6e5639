//! End-to-end machine behaviour
//!
//! Covers loading builtin modules, calling guest functions, cancellation,
//! `load()` cycles and state carried between runs.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use starbridge::{
    make_builtin_loader_map, CancellationToken, DirFs, Env, HostMap, HostValue, Machine, MemFs, ModuleLoader,
    NamedLoaderMap, Origin, PrintFn, Value,
};
use starbridge_vm::{compile, Thread};

fn host_map(entries: &[(&str, HostValue)]) -> HostMap {
    entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

#[test]
fn test_lazyload_math_from_globals() {
    let globals = host_map(&[("x", HostValue::Int(9))]);
    let machine = Machine::with_builtins(globals, &[] as &[&str], &["math"]);
    let out = machine
        .run_script("load(\"math\", \"sqrt\")\nb = sqrt(x)\n", HostMap::new())
        .unwrap();
    assert_eq!(out.get("b"), Some(&HostValue::Float(3.0)));
    assert_eq!(machine.export().get("b"), Some(&HostValue::Float(3.0)));
    assert_eq!(machine.run_count(), 1);
}

#[test]
fn test_call_guest_functions() {
    let machine = Machine::new();
    machine
        .run_script("def work():\n    pass\n\ndef add(a, b):\n    return a + b\n\ny = 2\n", HostMap::new())
        .unwrap();

    assert_eq!(machine.call("work", &[]).unwrap(), HostValue::None);
    assert_eq!(
        machine.call("add", &[HostValue::Int(2), HostValue::Int(3)]).unwrap(),
        HostValue::Int(5)
    );

    let err = machine.call("", &[]).unwrap_err();
    assert_eq!(err.to_string(), "host-bridge: call: no function name");
    let err = machine.call("y", &[]).unwrap_err();
    assert_eq!(err.to_string(), "host-bridge: call: mistyped function: y");
    let err = machine.call("nope", &[]).unwrap_err();
    assert_eq!(err.to_string(), "host-bridge: call: no such function: nope");
}

#[test]
fn test_call_before_any_run() {
    let err = Machine::new().call("work", &[]).unwrap_err();
    assert_eq!(err.cause(), "no function loaded");
}

#[test]
fn test_builtin_registry_is_shared() {
    let a = Machine::try_with_builtins(HostMap::new(), &["json"], &["math"]).unwrap();
    let b = Machine::try_with_builtins(HostMap::new(), &["json"], &["math"]).unwrap();
    let script = "s = encode({\"k\": [1, 2]})\n";
    assert_eq!(
        a.run_script(script, HostMap::new()).unwrap().get("s"),
        b.run_script(script, HostMap::new()).unwrap().get("s")
    );

    let err = Machine::try_with_builtins(HostMap::new(), &["json", "not-exist"], &[] as &[&str]).unwrap_err();
    assert_eq!(err.to_string(), "unknown builtin module: not-exist");
}

#[test]
#[should_panic(expected = "unknown builtin module: not-exist")]
fn test_with_builtins_panics_on_unknown_name() {
    let _ = Machine::with_builtins(HostMap::new(), &["json", "not-exist"], &[] as &[&str]);
}

#[test]
fn test_cancel_during_sleep() {
    let machine = Machine::with_builtins(HostMap::new(), &["go_idiomatic"], &[] as &[&str]);
    machine.set_script_content("sleepy.star", "sleep(10)\n");

    let token = CancellationToken::new();
    let canceller = {
        let token = token.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            token.cancel();
        })
    };

    let start = Instant::now();
    let err = machine.run_with_context(token, HostMap::new()).unwrap_err();
    canceller.join().unwrap();

    assert!(start.elapsed() < Duration::from_secs(2), "took {:?}", start.elapsed());
    assert!(err.is_cancelled(), "{err}");
    assert!(err.cause().contains("cancelled"), "{err}");
}

#[test]
fn test_run_with_timeout() {
    let machine = Machine::with_builtins(HostMap::new(), &["go_idiomatic"], &[] as &[&str]);
    machine.set_script_content("sleepy.star", "sleep(10)\n");
    let start = Instant::now();
    let err = machine.run_with_timeout(Duration::from_millis(20), HostMap::new()).unwrap_err();
    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(err.cause().contains("deadline exceeded"), "{err}");

    // The same machine runs again after a cancelled run
    machine.set_script_content("quick.star", "z = 1\n");
    assert_eq!(machine.run().unwrap().get("z"), Some(&HostValue::Int(1)));
}

#[test]
fn test_load_cycle_fails() {
    let fs = MemFs::new()
        .with_file("main.star", "load(\"a.star\", \"a\")\n")
        .with_file("a.star", "load(\"b.star\", \"b\")\na = 1\n")
        .with_file("b.star", "load(\"a.star\", \"a\")\nb = 2\n");
    let machine = Machine::new();
    let err = machine.run_file("main.star", Arc::new(fs), HostMap::new()).unwrap_err();
    let text = err.to_string();
    assert!(text.contains("cycle in load graph"), "{text}");
    assert!(text.contains("a.star") && text.contains("b.star"), "{text}");
}

#[test]
fn test_load_from_file_system() {
    let fs = MemFs::new()
        .with_file("main.star", "load(\"lib.star\", \"double\")\nout = double(21)\n")
        .with_file("lib.star", "def double(n):\n    return n * 2\n");
    let machine = Machine::new();
    let out = machine.run_file("main.star", Arc::new(fs), HostMap::new()).unwrap();
    assert_eq!(out.get("out"), Some(&HostValue::Int(42)));
}

#[test]
fn test_run_file_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("main.star"), "load(\"util.star\", \"greet\")\nmsg = greet(\"bob\")\n").unwrap();
    std::fs::write(dir.path().join("util.star"), "def greet(name):\n    return \"hi \" + name\n").unwrap();

    let machine = Machine::new();
    let out = machine
        .run_file("main.star", Arc::new(DirFs::new(dir.path())), HostMap::new())
        .unwrap();
    assert_eq!(out.get("msg"), Some(&HostValue::String("hi bob".into())));
}

#[test]
fn test_predeclared_accumulates_across_runs() {
    let machine = Machine::new();
    machine.run_script("a = 40\n", HostMap::new()).unwrap();
    let out = machine.run_script("b = a + 2\n", HostMap::new()).unwrap();
    assert_eq!(out.get("b"), Some(&HostValue::Int(42)));
    assert_eq!(machine.run_count(), 2);
}

#[test]
fn test_failed_run_does_not_merge() {
    let machine = Machine::new();
    machine.run_script("a = 1\n", HostMap::new()).unwrap();
    let err = machine.run_script("c = 3\nfail(\"boom\")\n", HostMap::new()).unwrap_err();
    assert_eq!(err.origin(), Origin::Engine);
    assert_eq!(err.action(), "exec");

    let exported = machine.export();
    assert!(exported.contains_key("a"));
    assert!(!exported.contains_key("c"));
}

#[test]
fn test_failed_run_drops_its_extras() {
    let machine = Machine::new();
    machine.run_script("a = 1
", HostMap::new()).unwrap();
    let err = machine
        .run_script("fail(\"boom\")\n", host_map(&[("z", HostValue::Int(5))]))
        .unwrap_err();
    assert_eq!(err.origin(), Origin::Engine);
    assert!(!machine.export().contains_key("z"));

    let err = machine.run_script("w = z\n", HostMap::new()).unwrap_err();
    assert!(err.cause().contains("undefined: z"), "{err}");
    let out = machine.run_script("w = a\n", HostMap::new()).unwrap();
    assert_eq!(out.get("w"), Some(&HostValue::Int(1)));
}

#[test]
fn test_reset_discards_state() {
    let machine = Machine::new();
    machine.run_script("a = 1\n", HostMap::new()).unwrap();
    machine.reset();
    assert!(machine.export().is_empty());

    let err = machine.run_script("b = a\n", HostMap::new()).unwrap_err();
    assert!(err.cause().contains("undefined: a"), "{err}");
}

#[test]
fn test_extras_win_over_globals() {
    let machine = Machine::with_globals(host_map(&[("x", HostValue::Int(1))]));
    let out = machine
        .run_script("y = x\n", host_map(&[("x", HostValue::Int(2))]))
        .unwrap();
    assert_eq!(out.get("y"), Some(&HostValue::Int(2)));
}

#[test]
fn test_globals_changed_between_runs() {
    let machine = Machine::with_globals(host_map(&[("x", HostValue::Int(1))]));
    machine.run_script("y = x\n", HostMap::new()).unwrap();
    machine.set_globals(host_map(&[("z", HostValue::Int(5))]));
    let out = machine.run_script("w = z\n", HostMap::new()).unwrap();
    assert_eq!(out.get("w"), Some(&HostValue::Int(5)));
}

#[test]
fn test_exit_codes() {
    let machine = Machine::with_builtins(HostMap::new(), &["go_idiomatic"], &[] as &[&str]);
    let out = machine.run_script("a = 1\nexit(0)\nb = 2\n", HostMap::new());
    assert!(out.is_ok(), "{out:?}");

    let err = machine.run_script("exit(3)\n", HostMap::new()).unwrap_err();
    assert_eq!(err.to_string(), "host-bridge: run: exit code: 3");
}

#[test]
fn test_exit_inside_loaded_module() {
    let fs = Arc::new(
        MemFs::new()
            .with_file("main.star", "load(\"lib.star\", \"x\")\ny = x\n")
            .with_file("lib.star", "exit(3)\nx = 1\n"),
    );
    let machine = Machine::with_builtins(HostMap::new(), &["go_idiomatic"], &[] as &[&str]);
    for _ in 0..2 {
        let err = machine.run_file("main.star", fs.clone(), HostMap::new()).unwrap_err();
        assert_eq!(err.to_string(), "host-bridge: run: exit code: 3");
    }
    assert!(!machine.export().contains_key("y"));
}

#[test]
fn test_print_sink() {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink: PrintFn = {
        let lines = lines.clone();
        Arc::new(move |_thread, msg| lines.lock().push(msg.to_string()))
    };
    let machine = Machine::new();
    machine.set_print_func(Some(sink));
    machine.run_script("print(\"hello\", 1)\n", HostMap::new()).unwrap();
    assert_eq!(*lines.lock(), vec!["hello 1".to_string()]);
}

#[test]
fn test_custom_lazyload_unwraps_module() {
    let mut members = Env::new();
    members.insert("answer".to_string(), Value::Int(42));
    let module = starbridge_vm::Module::new("facts", members).into_value();
    let mut env = Env::new();
    env.insert("facts".to_string(), module);

    let mut lazyloads = NamedLoaderMap::new();
    lazyloads.insert("facts", ModuleLoader::from_env(env));
    let machine = Machine::with_loaders(HostMap::new(), Default::default(), lazyloads);

    let out = machine.run_script("load(\"facts\", \"answer\")\nv = answer\n", HostMap::new()).unwrap();
    assert_eq!(out.get("v"), Some(&HostValue::Int(42)));
}

#[test]
fn test_lazy_loader_on_bare_thread() {
    let lazyloads = make_builtin_loader_map(&["math"]).unwrap();
    let mut thread = Thread::new("bare");
    thread.set_load(Some(lazyloads.get_lazy_loader()));
    let program = compile("bare.star", "load(\"math\", \"sqrt\")\nr = sqrt(16)\n").unwrap();
    let globals = program.init(&mut thread, &Env::new()).unwrap();
    assert_eq!(globals.get("r"), Some(&Value::Float(4.0)));
}

#[test]
fn test_no_script() {
    let err = Machine::new().run().unwrap_err();
    assert_eq!(err.to_string(), "host-bridge: run: no script to execute");
}

#[test]
fn test_input_conversion_disabled() {
    let machine = Machine::with_globals(host_map(&[("x", HostValue::Int(1))]));
    machine.disable_input_conversion();
    let err = machine.run_script("y = 1\n", HostMap::new()).unwrap_err();
    assert_eq!(err.origin(), Origin::Conversion);
    assert_eq!(err.action(), "convert globals");

    machine.set_globals(host_map(&[("x", HostValue::Guest(Value::Int(7)))]));
    let out = machine.run_script("y = x\n", HostMap::new()).unwrap();
    assert_eq!(out.get("y"), Some(&HostValue::Int(7)));
}
