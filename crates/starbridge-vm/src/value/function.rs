use std::fmt;
use std::sync::Arc;

use starbridge_parser::{FunctionDef, Param, Pos};

use crate::error::VmError;
use crate::thread::Thread;
use crate::value::Value;
use crate::vm::{ModuleScope, Scope};

/// Type signature for host-implemented callables
///
/// The second argument is the builtin itself, giving access to its name and
/// bound receiver.
pub type BuiltinFn = dyn Fn(&mut Thread, &Builtin, &Args) -> Result<Value, VmError> + Send + Sync;

/// Plain function pointer form used by the universe and leaf modules
pub type NativeFn = fn(&mut Thread, &Args) -> Result<Value, VmError>;

/// Method implementation; receives the bound receiver
pub type NativeMethod = fn(&mut Thread, &Value, &Args) -> Result<Value, VmError>;

/// A function defined in guest code
pub struct Function {
    pub(crate) def: Arc<FunctionDef>,
    /// Evaluated defaults, one per optional parameter in order
    pub(crate) defaults: Vec<Value>,
    pub(crate) module: Arc<ModuleScope>,
    pub(crate) closure: Option<Arc<Scope>>,
}

impl Function {
    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn params(&self) -> &[Param] {
        &self.def.params
    }

    pub fn position(&self) -> Pos {
        self.def.pos
    }

    /// Filename of the module that defined the function
    pub fn filename(&self) -> &str {
        &self.module.filename
    }

    pub(crate) fn freeze(&self) {
        self.defaults.iter().for_each(Value::freeze);
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {} at {}:{}>", self.name(), self.filename(), self.def.pos)
    }
}

/// A host-implemented callable, optionally bound to a receiver
#[derive(Clone)]
pub struct Builtin {
    name: String,
    func: Arc<BuiltinFn>,
    receiver: Option<Value>,
}

impl Builtin {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&mut Thread, &Builtin, &Args) -> Result<Value, VmError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Arc::new(func),
            receiver: None,
        }
    }

    pub fn native(name: impl Into<String>, func: NativeFn) -> Self {
        Self::new(name, move |thread, _, args| func(thread, args))
    }

    /// A method bound to `receiver`
    pub fn method(name: impl Into<String>, receiver: Value, func: NativeMethod) -> Self {
        Self {
            name: name.into(),
            func: Arc::new(move |thread: &mut Thread, builtin: &Builtin, args: &Args| {
                let recv = builtin.receiver.clone().unwrap_or_default();
                func(thread, &recv, args)
            }),
            receiver: Some(receiver),
        }
    }

    pub fn bind(&self, receiver: Value) -> Self {
        Self {
            name: self.name.clone(),
            func: self.func.clone(),
            receiver: Some(receiver),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn receiver(&self) -> Option<&Value> {
        self.receiver.as_ref()
    }

    pub fn call(&self, thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
        (self.func)(thread, self, args)
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<built-in function {}>", self.name)
    }
}

/// Call arguments: positional values then `name = value` pairs
#[derive(Debug, Clone, Default)]
pub struct Args {
    pub positional: Vec<Value>,
    pub named: Vec<(String, Value)>,
}

impl Args {
    pub fn new(positional: Vec<Value>) -> Self {
        Self {
            positional,
            named: Vec::new(),
        }
    }

    pub fn with_named(positional: Vec<Value>, named: Vec<(String, Value)>) -> Self {
        Self { positional, named }
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.named.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn no_args(&self, fname: &str) -> Result<(), VmError> {
        if !self.is_empty() {
            return Err(VmError::runtime(format!("{fname}: got {} arguments, want 0", self.len())));
        }
        Ok(())
    }

    pub fn no_named(&self, fname: &str) -> Result<(), VmError> {
        if let Some((name, _)) = self.named.first() {
            return Err(VmError::runtime(format!("{fname}: unexpected keyword argument {name:?}")));
        }
        Ok(())
    }

    /// Positional-only arguments with an arity check
    pub fn positional_range(&self, fname: &str, min: usize, max: usize) -> Result<&[Value], VmError> {
        self.no_named(fname)?;
        let n = self.positional.len();
        if n < min {
            return Err(VmError::runtime(format!("{fname}: got {n} arguments, want at least {min}")));
        }
        if n > max {
            return Err(VmError::runtime(format!("{fname}: got {n} arguments, want at most {max}")));
        }
        Ok(&self.positional)
    }

    /// Match arguments against parameter names. A `?` suffix marks a
    /// parameter optional; absent optionals come back as `None`.
    pub fn unpack_opt<const N: usize>(
        &self,
        fname: &str,
        params: [&str; N],
    ) -> Result<[Option<Value>; N], VmError> {
        let names = params.map(|p| p.trim_end_matches('?'));
        let mut out: [Option<Value>; N] = std::array::from_fn(|_| None);

        if self.positional.len() > N {
            return Err(VmError::runtime(format!(
                "{fname}: got {} arguments, want at most {N}",
                self.positional.len()
            )));
        }
        for (slot, value) in out.iter_mut().zip(&self.positional) {
            *slot = Some(value.clone());
        }
        for (name, value) in &self.named {
            let Some(index) = names.iter().position(|n| n == name) else {
                return Err(VmError::runtime(format!("{fname}: unexpected keyword argument {name:?}")));
            };
            if out[index].is_some() {
                return Err(VmError::runtime(format!("{fname}: got multiple values for parameter {name}")));
            }
            out[index] = Some(value.clone());
        }
        for (i, param) in params.iter().enumerate() {
            if out[i].is_none() && !param.ends_with('?') {
                return Err(VmError::runtime(format!("{fname}: missing argument for {}", names[i])));
            }
        }
        Ok(out)
    }

    /// Like `unpack_opt`, with absent optionals as `Value::None`
    pub fn unpack<const N: usize>(&self, fname: &str, params: [&str; N]) -> Result<[Value; N], VmError> {
        Ok(self.unpack_opt(fname, params)?.map(Option::unwrap_or_default))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpack_positional_and_named() {
        let args = Args::with_named(vec![Value::Int(1)], vec![("sep".into(), Value::string("-"))]);
        let [x, sep, end] = args.unpack("f", ["x", "sep?", "end?"]).unwrap();
        assert_eq!(x, Value::Int(1));
        assert_eq!(sep, Value::string("-"));
        assert!(end.is_none());
    }

    #[test]
    fn test_unpack_errors() {
        let args = Args::new(vec![]);
        let err = args.unpack("f", ["x"]).unwrap_err();
        assert_eq!(err.message, "f: missing argument for x");

        let args = Args::new(vec![Value::Int(1), Value::Int(2)]);
        let err = args.unpack("f", ["x"]).unwrap_err();
        assert_eq!(err.message, "f: got 2 arguments, want at most 1");

        let args = Args::with_named(vec![Value::Int(1)], vec![("x".into(), Value::Int(2))]);
        let err = args.unpack("f", ["x"]).unwrap_err();
        assert_eq!(err.message, "f: got multiple values for parameter x");

        let args = Args::with_named(vec![], vec![("y".into(), Value::Int(2))]);
        let err = args.unpack("f", ["x?"]).unwrap_err();
        assert_eq!(err.message, "f: unexpected keyword argument \"y\"");
    }
}
