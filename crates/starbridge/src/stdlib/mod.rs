//! Builtin modules
//!
//! Each module is a loader producing `{name: module}`, so both preloading
//! and `load()` unwrap it to its members. `struct` is the exception: it
//! exports the `struct` builtin itself.
//!
//! The registry is process-wide and immutable.

pub mod base64;
pub mod file;
pub mod go_idiomatic;
pub mod hash;
pub mod http;
pub mod json;
pub mod math;
pub mod re;
pub mod random;
pub mod runtime;
pub mod string;
pub mod structs;
pub mod time;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use starbridge_vm::builtins::registry::BuiltinRegistry;
use starbridge_vm::{Env, Module, Value, VmError};

use crate::loader::ModuleLoader;

type ModuleFn = fn() -> Result<Env, VmError>;

static MODULES: Lazy<IndexMap<&'static str, ModuleFn>> = Lazy::new(|| {
    let modules: [(&'static str, ModuleFn); 13] = [
        (go_idiomatic::NAME, go_idiomatic::load),
        (structs::NAME, structs::load),
        (time::NAME, time::load),
        (math::NAME, math::load),
        (json::NAME, json::load),
        (hash::NAME, hash::load),
        (http::NAME, http::load),
        (re::NAME, re::load),
        (base64::NAME, base64::load),
        (random::NAME, random::load),
        (file::NAME, file::load),
        (string::NAME, string::load),
        (runtime::NAME, runtime::load),
    ];
    modules.into_iter().collect()
});

/// Loader of the builtin module `name`
pub fn loader(name: &str) -> Option<ModuleLoader> {
    MODULES.get(name).map(|&load| ModuleLoader::new(load))
}

/// Names of all builtin modules, in registration order
pub fn names() -> Vec<&'static str> {
    MODULES.keys().copied().collect()
}

/// `{name: Module(name, registry)}`
fn module_env(name: &str, registry: BuiltinRegistry) -> Result<Env, VmError> {
    let mut env = Env::new();
    env.insert(name.to_string(), Module::new(name, registry.into_env()).into_value());
    Ok(env)
}

// ============================================================================
// Argument helpers
// ============================================================================

fn str_arg<'a>(fname: &str, param: &str, value: &'a Value) -> Result<&'a str, VmError> {
    value
        .as_str()
        .ok_or_else(|| VmError::arg_type(fname, param, "string", value))
}

fn int_arg(fname: &str, param: &str, value: &Value) -> Result<i64, VmError> {
    match value {
        Value::Int(i) => Ok(*i),
        other => Err(VmError::arg_type(fname, param, "int", other)),
    }
}

/// Ints are widened
fn float_arg(fname: &str, param: &str, value: &Value) -> Result<f64, VmError> {
    match value {
        Value::Int(i) => Ok(*i as f64),
        Value::Float(f) => Ok(*f),
        other => Err(VmError::arg_type(fname, param, "float or int", other)),
    }
}

/// Optional argument: `None` means absent
fn opt_str_arg<'a>(fname: &str, param: &str, value: &'a Value) -> Result<Option<&'a str>, VmError> {
    match value {
        Value::None => Ok(None),
        other => str_arg(fname, param, other).map(Some),
    }
}
