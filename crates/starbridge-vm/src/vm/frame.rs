//! Module and local scopes

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use starbridge_parser::FunctionDef;

use crate::value::{Env, Value};

/// Top-level environment of one executing file
#[derive(Debug)]
pub struct ModuleScope {
    pub(crate) filename: String,
    /// Names bound by the file's own top-level statements
    pub(crate) globals: RwLock<Env>,
    /// Names bound by `load`; visible to the file but not exported
    pub(crate) loaded: RwLock<Env>,
    pub(crate) predeclared: Arc<Env>,
}

impl ModuleScope {
    pub fn new(filename: impl Into<String>, predeclared: Arc<Env>) -> Self {
        Self {
            filename: filename.into(),
            globals: RwLock::new(Env::new()),
            loaded: RwLock::new(Env::new()),
            predeclared,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn globals(&self) -> Env {
        self.globals.read().clone()
    }

    pub(crate) fn freeze(&self) {
        for value in self.globals.read().values() {
            value.freeze();
        }
    }
}

/// Which names a scope owns
#[derive(Debug)]
pub(crate) enum Declared {
    Function(Arc<FunctionDef>),
    Names(BTreeSet<String>),
}

/// Local variables of a function call or comprehension
#[derive(Debug)]
pub struct Scope {
    declared: Declared,
    vars: Mutex<HashMap<String, Value>>,
    pub(crate) parent: Option<Arc<Scope>>,
}

impl Scope {
    pub(crate) fn new(declared: Declared, vars: HashMap<String, Value>, parent: Option<Arc<Scope>>) -> Self {
        Self {
            declared,
            vars: Mutex::new(vars),
            parent,
        }
    }

    pub(crate) fn declares(&self, name: &str) -> bool {
        match &self.declared {
            Declared::Function(def) => def.locals.contains(name),
            Declared::Names(names) => names.contains(name),
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<Value> {
        self.vars.lock().get(name).cloned()
    }

    pub(crate) fn set(&self, name: &str, value: Value) {
        self.vars.lock().insert(name.to_string(), value);
    }
}
