//! Pseudo-random numbers from the thread-local generator

use rand::seq::SliceRandom;
use rand::Rng;
use starbridge_vm::builtins::registry::BuiltinRegistry;
use starbridge_vm::{Args, Env, Thread, Value, VmError};

use super::{float_arg, int_arg, module_env, opt_str_arg};

pub const NAME: &str = "random";

const ALPHANUMERIC: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub fn load() -> Result<Env, VmError> {
    let mut registry = BuiltinRegistry::new();
    registry.register("randint", vm_randint);
    registry.register("random", vm_random);
    registry.register("uniform", vm_uniform);
    registry.register("choice", vm_choice);
    registry.register("shuffle", vm_shuffle);
    registry.register("randstr", vm_randstr);
    module_env(NAME, registry)
}

/// `randint(a, b)`: inclusive on both ends
fn vm_randint(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [a, b] = args.unpack("randint", ["a", "b"])?;
    let (a, b) = (int_arg("randint", "a", &a)?, int_arg("randint", "b", &b)?);
    if a > b {
        return Err(VmError::runtime(format!("randint: empty range [{a}, {b}]")));
    }
    Ok(Value::Int(rand::thread_rng().gen_range(a..=b)))
}

/// `random()`: float in [0, 1)
fn vm_random(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    args.no_args("random")?;
    Ok(Value::Float(rand::thread_rng().gen::<f64>()))
}

/// `uniform(a, b)`: float between `a` and `b`, in either order
fn vm_uniform(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [a, b] = args.unpack("uniform", ["a", "b"])?;
    let (a, b) = (float_arg("uniform", "a", &a)?, float_arg("uniform", "b", &b)?);
    if !a.is_finite() || !b.is_finite() {
        return Err(VmError::runtime("uniform: bounds must be finite"));
    }
    let t: f64 = rand::thread_rng().gen();
    Ok(Value::Float(a + (b - a) * t))
}

fn vm_choice(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [seq] = args.unpack("choice", ["seq"])?;
    let items = seq.to_vec()?;
    items
        .choose(&mut rand::thread_rng())
        .cloned()
        .ok_or_else(|| VmError::runtime("choice: empty sequence"))
}

/// `shuffle(list)`: in place
fn vm_shuffle(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [list] = args.unpack("shuffle", ["list"])?;
    let Value::List(list) = &list else {
        return Err(VmError::arg_type("shuffle", "list", "list", &list));
    };
    list.mutate("shuffle", |items| {
        items.shuffle(&mut rand::thread_rng());
        Ok(())
    })?;
    Ok(Value::None)
}

/// `randstr(chars, length)`; `chars` defaults to ASCII letters and digits
fn vm_randstr(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [chars, length] = args.unpack("randstr", ["chars?", "length?"])?;
    let chars: Vec<char> = opt_str_arg("randstr", "chars", &chars)?
        .unwrap_or(ALPHANUMERIC)
        .chars()
        .collect();
    let length = match length {
        Value::None => 10,
        other => int_arg("randstr", "length", &other)?,
    };
    if chars.is_empty() {
        return Err(VmError::runtime("randstr: empty character set"));
    }
    let length = usize::try_from(length).map_err(|_| VmError::runtime(format!("randstr: negative length {length}")))?;
    let mut rng = rand::thread_rng();
    let out: String = (0..length).map(|_| chars[rng.gen_range(0..chars.len())]).collect();
    Ok(Value::string(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(f: fn(&mut Thread, &Args) -> Result<Value, VmError>, args: Vec<Value>) -> Result<Value, VmError> {
        f(&mut Thread::new("t"), &Args::new(args))
    }

    #[test]
    fn test_randint_bounds() {
        for _ in 0..100 {
            let Value::Int(n) = call(vm_randint, vec![Value::Int(1), Value::Int(3)]).unwrap() else {
                panic!("not an int")
            };
            assert!((1..=3).contains(&n));
        }
        assert!(call(vm_randint, vec![Value::Int(3), Value::Int(1)]).is_err());
    }

    #[test]
    fn test_shuffle_keeps_elements() {
        let list = Value::list((0..20).map(Value::Int).collect());
        call(vm_shuffle, vec![list.clone()]).unwrap();
        let mut items: Vec<i64> = list.to_vec().unwrap().iter().filter_map(Value::as_int).collect();
        items.sort();
        assert_eq!(items, (0..20).collect::<Vec<_>>());

        list.freeze();
        assert!(call(vm_shuffle, vec![list]).is_err());
    }

    #[test]
    fn test_randstr_and_choice() {
        let s = call(vm_randstr, vec![Value::string("ab"), Value::Int(8)]).unwrap();
        let s = s.as_str().unwrap();
        assert_eq!(s.len(), 8);
        assert!(s.chars().all(|c| c == 'a' || c == 'b'));
        assert!(call(vm_choice, vec![Value::list(vec![])]).is_err());
    }
}
