//! Compiled programs
//!
//! A `Program` is a parsed and resolved file. It can be initialised any
//! number of times, each time against a fresh module scope.

use std::sync::Arc;

use starbridge_parser::{Module, StmtKind};
use tracing::debug;

use crate::error::VmError;
use crate::thread::Thread;
use crate::value::{Env, Value};
use crate::vm::{exec_module, ModuleScope};

#[derive(Debug, Clone)]
pub struct Program {
    module: Arc<Module>,
}

/// Parse and resolve `source`
pub fn compile(filename: &str, source: &str) -> Result<Program, VmError> {
    let module = starbridge_parser::parse(filename, source)?;
    debug!(filename, statements = module.stmts.len(), "compiled program");
    Ok(Program {
        module: Arc::new(module),
    })
}

impl Program {
    pub fn filename(&self) -> &str {
        &self.module.filename
    }

    /// Names bound at the top level of the file
    pub fn globals(&self) -> Vec<String> {
        starbridge_parser::resolve::module_globals(&self.module).into_iter().collect()
    }

    /// Execute the file and return its frozen top-level bindings
    pub fn init(&self, thread: &mut Thread, predeclared: &Env) -> Result<Env, VmError> {
        let (globals, result) = self.init_partial(thread, predeclared);
        result.map(|_| globals)
    }

    /// Like `init`, but also returns the bindings made before a failure
    pub fn init_partial(&self, thread: &mut Thread, predeclared: &Env) -> (Env, Result<(), VmError>) {
        let scope = Arc::new(ModuleScope::new(self.filename(), Arc::new(predeclared.clone())));
        let result = exec_module(thread, &scope, &self.module.stmts, None).map(|_| ());
        scope.freeze();
        (scope.globals(), result)
    }

    /// Execute an interactive chunk without freezing. Returns the bindings
    /// and the value of a trailing expression statement, if any.
    pub fn init_repl(&self, thread: &mut Thread, predeclared: &Env) -> Result<(Env, Option<Value>), VmError> {
        let scope = Arc::new(ModuleScope::new(self.filename(), Arc::new(predeclared.clone())));
        let stmts = &self.module.stmts;
        let (body, last) = match stmts.split_last() {
            Some((last, body)) => match &last.kind {
                StmtKind::Expr(expr) => (body, Some(expr)),
                _ => (stmts.as_slice(), None),
            },
            None => (stmts.as_slice(), None),
        };
        let value = exec_module(thread, &scope, body, last)?;
        Ok((scope.globals(), value))
    }
}
