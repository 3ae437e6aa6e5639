//! Tree-walking interpreter
//!
//! `Interp` executes statements of one module against a `Thread`. Function
//! calls create a fresh `Interp` over the callee's module and closure scope,
//! so the Rust stack mirrors the guest call stack and `Thread` enforces the
//! depth limit.

use std::collections::HashMap;
use std::sync::Arc;

use starbridge_parser::{Param, Pos};

use crate::builtins;
use crate::error::VmError;
use crate::thread::{CallFrame, Thread};
use crate::value::{Args, Dict, Function, Value};

mod execution;
mod frame;
mod ops;

pub use frame::{ModuleScope, Scope};
pub(crate) use frame::Declared;
pub(crate) use ops::ValueOperations;

/// How a statement completed
pub(crate) enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

pub(crate) struct Interp<'t> {
    pub(crate) thread: &'t mut Thread,
    pub(crate) module: Arc<ModuleScope>,
    /// Innermost local scope; `None` at top level
    pub(crate) scope: Option<Arc<Scope>>,
}

impl<'t> Interp<'t> {
    pub(crate) fn new(thread: &'t mut Thread, module: Arc<ModuleScope>, scope: Option<Arc<Scope>>) -> Self {
        Self { thread, module, scope }
    }

    pub(crate) fn lookup(&self, name: &str) -> Result<Value, VmError> {
        let mut scope = self.scope.as_ref();
        while let Some(s) = scope {
            if s.declares(name) {
                return s.get(name).ok_or_else(|| {
                    VmError::runtime(format!("local variable {name} referenced before assignment"))
                });
            }
            scope = s.parent.as_ref();
        }
        if let Some(v) = self.module.globals.read().get(name) {
            return Ok(v.clone());
        }
        if let Some(v) = self.module.loaded.read().get(name) {
            return Ok(v.clone());
        }
        if let Some(v) = self.module.predeclared.get(name) {
            return Ok(v.clone());
        }
        builtins::universe()
            .get(name)
            .cloned()
            .ok_or_else(|| VmError::runtime(format!("undefined: {name}")))
    }

    pub(crate) fn bind(&mut self, name: &str, value: Value) -> Result<(), VmError> {
        if let Some(scope) = &self.scope {
            scope.set(name, value);
            return Ok(());
        }
        let mut globals = self.module.globals.write();
        if !self.thread.options().allow_global_reassign && globals.contains_key(name) {
            return Err(VmError::runtime(format!("cannot reassign global {name}")));
        }
        globals.insert(name.to_string(), value);
        Ok(())
    }

    /// Build a function value, evaluating defaults in the current scope
    pub(crate) fn make_function(&mut self, def: &Arc<starbridge_parser::FunctionDef>) -> Result<Value, VmError> {
        let mut defaults = Vec::new();
        for param in &def.params {
            if let Param::Optional(_, expr) = param {
                defaults.push(self.eval(expr)?);
            }
        }
        Ok(Value::Function(Arc::new(Function {
            def: def.clone(),
            defaults,
            module: self.module.clone(),
            closure: self.scope.clone(),
        })))
    }
}

/// `object[key]`
pub fn index(object: &Value, key: &Value) -> Result<Value, VmError> {
    ValueOperations::index(object, key)
}

/// `object.name`, including bound methods of built-in types
pub fn get_attr(object: &Value, name: &str) -> Result<Value, VmError> {
    ValueOperations::get_attr(object, name)
}

/// Invoke any callable value
pub fn call(thread: &mut Thread, callee: &Value, args: Args) -> Result<Value, VmError> {
    thread.check_cancelled()?;
    match callee {
        Value::Builtin(builtin) => {
            thread.push_frame(CallFrame {
                function: builtin.name().to_string(),
                file: "<builtin>".to_string(),
                pos: Pos::default(),
                id: 0,
            })?;
            let result = builtin.call(thread, &args).map_err(|mut err| {
                if err.frames.is_empty() {
                    err.frames = thread.call_stack();
                }
                err
            });
            thread.pop_frame();
            result
        }
        Value::Function(function) => call_function(thread, function, args),
        Value::Object(object) => object.call(thread, &args),
        other => Err(VmError::runtime(format!(
            "invalid call of non-function ({})",
            other.type_name()
        ))),
    }
}

fn call_function(thread: &mut Thread, function: &Arc<Function>, args: Args) -> Result<Value, VmError> {
    let vars = bind_params(function, args)?;
    let scope = Arc::new(Scope::new(
        Declared::Function(function.def.clone()),
        vars,
        function.closure.clone(),
    ));
    thread.push_frame(CallFrame {
        function: function.name().to_string(),
        file: function.filename().to_string(),
        pos: function.position(),
        id: Arc::as_ptr(&function.def) as usize,
    })?;
    let mut interp = Interp::new(thread, function.module.clone(), Some(scope));
    let result = interp.exec_block(&function.def.body);
    interp.thread.pop_frame();
    match result? {
        Flow::Return(value) => Ok(value),
        _ => Ok(Value::None),
    }
}

/// Match call arguments to parameters
///
/// Parameters before `*args` accept positional or named arguments; those
/// after it are keyword-only. Surplus named arguments go to `**kwargs`.
fn bind_params(function: &Function, args: Args) -> Result<HashMap<String, Value>, VmError> {
    let fname = function.name();
    let params = function.params();
    let mut vars = HashMap::new();

    let star = params.iter().find_map(|p| match p {
        Param::Args(name) => Some(name.as_str()),
        _ => None,
    });
    let kwargs_name = params.iter().find_map(|p| match p {
        Param::Kwargs(name) => Some(name.as_str()),
        _ => None,
    });
    let positional_params: Vec<&Param> = params
        .iter()
        .take_while(|p| !matches!(p, Param::Args(_) | Param::Kwargs(_)))
        .collect();

    let given = args.positional.len();
    let mut positional = args.positional.into_iter();
    for param in &positional_params {
        match positional.next() {
            Some(value) => {
                vars.insert(param.name().to_string(), value);
            }
            None => break,
        }
    }
    let surplus: Vec<Value> = positional.collect();
    match star {
        Some(name) => {
            vars.insert(name.to_string(), Value::tuple(surplus));
        }
        None if !surplus.is_empty() => {
            return Err(VmError::runtime(format!(
                "{fname}: got {given} arguments, want at most {}",
                positional_params.len()
            )));
        }
        None => {}
    }

    let kwargs = Dict::new();
    for (name, value) in args.named {
        let is_param = params
            .iter()
            .any(|p| matches!(p, Param::Required(n) | Param::Optional(n, _) if *n == name));
        if is_param {
            if vars.contains_key(&name) {
                return Err(VmError::runtime(format!(
                    "{fname}: got multiple values for parameter {name}"
                )));
            }
            vars.insert(name, value);
        } else if kwargs_name.is_some() {
            let key = Value::string(&name);
            if kwargs.contains(&key)? {
                return Err(VmError::runtime(format!(
                    "{fname}: got multiple values for keyword argument {name}"
                )));
            }
            kwargs.insert(key, value)?;
        } else {
            return Err(VmError::runtime(format!(
                "{fname}: unexpected keyword argument \"{name}\""
            )));
        }
    }
    if let Some(name) = kwargs_name {
        vars.insert(name.to_string(), Value::dict(kwargs));
    }

    let mut defaults = function.defaults.iter();
    for param in params {
        match param {
            Param::Required(name) if !vars.contains_key(name) => {
                return Err(VmError::runtime(format!("{fname}: missing argument for {name}")));
            }
            Param::Optional(name, _) => {
                let default = defaults.next().cloned().unwrap_or_default();
                vars.entry(name.clone()).or_insert(default);
            }
            _ => {}
        }
    }
    Ok(vars)
}

/// Run top-level statements of a module inside a `<toplevel>` frame,
/// then evaluate `trailing` in the same frame if given
pub(crate) fn exec_module(
    thread: &mut Thread,
    module: &Arc<ModuleScope>,
    stmts: &[starbridge_parser::Stmt],
    trailing: Option<&starbridge_parser::Expr>,
) -> Result<Option<Value>, VmError> {
    thread.push_frame(CallFrame {
        function: "<toplevel>".to_string(),
        file: module.filename.clone(),
        pos: Pos::default(),
        id: 0,
    })?;
    let mut interp = Interp::new(thread, module.clone(), None);
    let result = interp
        .exec_block(stmts)
        .and_then(|_| trailing.map(|expr| interp.eval(expr)).transpose());
    interp.thread.pop_frame();
    result
}
