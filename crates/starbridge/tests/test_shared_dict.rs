//! Shared mappings across machines and threads, and JSON output

use std::sync::{Arc, Barrier};
use std::thread;

use starbridge::{marshal_json, unmarshal_json, HostMap, HostValue, Machine, SharedDict, Value};

fn with_shared(shared: &SharedDict) -> Machine {
    let mut globals = HostMap::new();
    globals.insert("m".to_string(), HostValue::from(shared.clone()));
    Machine::with_globals(globals)
}

#[test]
fn test_write_then_perform_from_another_machine() {
    let shared = SharedDict::new();
    let writer = with_shared(&shared);
    let reader = with_shared(&shared);

    let a = thread::spawn(move || writer.run_script("m[\"k\"] = 1\n", HostMap::new()).map(|_| ()));
    a.join().unwrap().unwrap();

    let out = reader
        .run_script("v = m.perform(lambda d: d[\"k\"])\n", HostMap::new())
        .unwrap();
    assert_eq!(out.get("v"), Some(&HostValue::Int(1)));
}

#[test]
fn test_concurrent_writer_and_performer() {
    let shared = SharedDict::new();
    let barrier = Arc::new(Barrier::new(2));

    let writer = {
        let machine = with_shared(&shared);
        let barrier = barrier.clone();
        thread::spawn(move || {
            barrier.wait();
            machine.run_script("m[\"k\"] = 1\n", HostMap::new()).map(|_| ())
        })
    };
    let reader = {
        let machine = with_shared(&shared);
        let barrier = barrier.clone();
        thread::spawn(move || {
            barrier.wait();
            // Poll until the write lands; every observation is either absent or 1
            loop {
                let out = machine
                    .run_script("v = m.perform(lambda d: d.get(\"k\"))\n", HostMap::new())
                    .map_err(|e| e.to_string())?;
                match out.get("v") {
                    Some(HostValue::None) => thread::yield_now(),
                    Some(other) => return Ok(other.clone()),
                    None => return Err("no binding".to_string()),
                }
            }
        })
    };

    writer.join().unwrap().unwrap();
    assert_eq!(reader.join().unwrap().unwrap(), HostValue::Int(1));
}

#[test]
fn test_guest_methods() {
    let machine = Machine::with_builtins(HostMap::new(), &["go_idiomatic"], &[] as &[&str]);
    let out = machine
        .run_script(
            concat!(
                "d = shared_dict({\"a\": 1})\n",
                "d[\"b\"] = 2\n",
                "n = d.len()\n",
                "decoded = d.from_json('{\"c\": 3}')\n",
                "text = d.to_json()\n",
            ),
            HostMap::new(),
        )
        .unwrap();
    assert_eq!(out.get("n"), Some(&HostValue::Int(2)));
    assert_eq!(out.get("text"), Some(&HostValue::String(r#"{"a":1,"b":2,"c":3}"#.into())));
}

#[test]
fn test_frozen_shared_dict_rejects_guest_writes() {
    let shared = SharedDict::new();
    shared.set(Value::string("k"), Value::Int(1)).unwrap();
    Value::object(shared.clone()).freeze();
    let machine = with_shared(&shared);
    let err = machine.run_script("m[\"k\"] = 2\n", HostMap::new()).unwrap_err();
    assert!(err.cause().contains("frozen"), "{err}");
    assert_eq!(shared.get(&Value::string("k")).unwrap(), Some(Value::Int(1)));
}

#[test]
fn test_json_indentation() {
    let value = unmarshal_json(r#"{"a": 1}"#).unwrap();
    assert_eq!(marshal_json(&value, 0).unwrap(), r#"{"a":1}"#);
    assert_eq!(marshal_json(&value, 2).unwrap(), "{\n  \"a\": 1\n}");
    assert_eq!(marshal_json(&Value::None, 0).unwrap(), "null");
}

#[test]
fn test_json_module_from_guest() {
    let machine = Machine::with_builtins(HostMap::new(), &[] as &[&str], &["json"]);
    let out = machine
        .run_script(
            "load(\"json\", \"dumps\", \"decode\")\ns = dumps({\"a\": [1, 2]}, indent=2)\nback = decode(s)\n",
            HostMap::new(),
        )
        .unwrap();
    assert_eq!(
        out.get("s"),
        Some(&HostValue::String("{\n  \"a\": [\n    1,\n    2\n  ]\n}".into()))
    );
    let Some(HostValue::Map(back)) = out.get("back") else { panic!("not a map: {out:?}") };
    assert_eq!(back.get("a"), Some(&HostValue::List(vec![HostValue::Int(1), HostValue::Int(2)])));
}
