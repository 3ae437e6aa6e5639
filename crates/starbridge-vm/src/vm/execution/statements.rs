use starbridge_parser::{BinOp, Expr, ExprKind, LoadBinding, Stmt, StmtKind};

use crate::error::VmError;
use crate::value::Value;
use crate::vm::{Flow, Interp, ValueOperations};

impl Interp<'_> {
    pub(crate) fn exec_block(&mut self, stmts: &[Stmt]) -> Result<Flow, VmError> {
        for stmt in stmts {
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    pub(crate) fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Flow, VmError> {
        self.thread
            .check_cancelled()
            .and_then(|_| self.exec_stmt_kind(stmt))
            .map_err(|err| self.thread.annotate(err, stmt.pos))
    }

    fn exec_stmt_kind(&mut self, stmt: &Stmt) -> Result<Flow, VmError> {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
            }
            StmtKind::Assign { target, op: None, value } => {
                let value = self.eval(value)?;
                self.assign(target, value)?;
            }
            StmtKind::Assign {
                target,
                op: Some(op),
                value,
            } => self.exec_augmented(target, *op, value)?,
            StmtKind::Def(def) => {
                let function = self.make_function(def)?;
                self.bind(&def.name, function)?;
            }
            StmtKind::If { cond, then, otherwise } => {
                return if self.eval(cond)?.truth() {
                    self.exec_block(then)
                } else {
                    self.exec_block(otherwise)
                };
            }
            StmtKind::For { vars, iterable, body } => {
                let items = self.eval(iterable)?.iterate()?;
                for item in items {
                    self.thread.check_cancelled()?;
                    self.assign(vars, item)?;
                    match self.exec_block(body)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
            }
            StmtKind::While { cond, body } => loop {
                self.thread.check_cancelled()?;
                if !self.eval(cond)?.truth() {
                    break;
                }
                match self.exec_block(body)? {
                    Flow::Break => break,
                    Flow::Normal | Flow::Continue => {}
                    ret @ Flow::Return(_) => return Ok(ret),
                }
            },
            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Pass => {}
            StmtKind::Load { module, bindings } => self.exec_load(module, bindings)?,
        }
        Ok(Flow::Normal)
    }

    /// `x op= y`; the target's subexpressions are evaluated once
    fn exec_augmented(&mut self, target: &Expr, op: BinOp, value: &Expr) -> Result<(), VmError> {
        match &target.kind {
            ExprKind::Ident(name) => {
                let old = self.lookup(name)?;
                let rhs = self.eval(value)?;
                let new = self.augmented_value(op, old, rhs)?;
                self.bind(name, new)
            }
            ExprKind::Index { object, index } => {
                let object = self.eval(object)?;
                let key = self.eval(index)?;
                let old = ValueOperations::index(&object, &key)?;
                let rhs = self.eval(value)?;
                let new = self.augmented_value(op, old, rhs)?;
                ValueOperations::set_index(&object, key, new)
            }
            _ => Err(VmError::runtime("can't use augmented assignment on this target")),
        }
    }

    /// `list += iterable` extends in place; everything else rebinds
    fn augmented_value(&mut self, op: BinOp, old: Value, rhs: Value) -> Result<Value, VmError> {
        if let (BinOp::Add, Value::List(list)) = (op, &old) {
            let items = rhs.to_vec()?;
            list.extend(items)?;
            return Ok(old);
        }
        ValueOperations::binary(op, &old, &rhs)
    }

    pub(crate) fn assign(&mut self, target: &Expr, value: Value) -> Result<(), VmError> {
        match &target.kind {
            ExprKind::Ident(name) => self.bind(name, value),
            ExprKind::Tuple(targets) | ExprKind::List(targets) => {
                let items = value.to_vec().map_err(|_| {
                    VmError::runtime(format!("got {} in sequence assignment", value.type_name()))
                })?;
                if items.len() > targets.len() {
                    return Err(VmError::runtime(format!(
                        "too many values to unpack (got {}, want {})",
                        items.len(),
                        targets.len()
                    )));
                }
                if items.len() < targets.len() {
                    return Err(VmError::runtime(format!(
                        "too few values to unpack (got {}, want {})",
                        items.len(),
                        targets.len()
                    )));
                }
                for (target, item) in targets.iter().zip(items) {
                    self.assign(target, item)?;
                }
                Ok(())
            }
            ExprKind::Index { object, index } => {
                let object = self.eval(object)?;
                let key = self.eval(index)?;
                ValueOperations::set_index(&object, key, value)
            }
            ExprKind::Attr { object, name } => {
                let object = self.eval(object)?;
                Err(VmError::runtime(format!(
                    "can't assign to .{name} field of {}",
                    object.type_name()
                )))
            }
            _ => Err(VmError::runtime("invalid assignment target")),
        }
    }

    fn exec_load(&mut self, module: &str, bindings: &[LoadBinding]) -> Result<(), VmError> {
        let env = self.thread.load(module).map_err(|err| {
            VmError::new(err.kind, format!("cannot load {module}: {}", err.message))
        })?;
        let mut loaded = self.module.loaded.write();
        for binding in bindings {
            let value = env.get(&binding.remote).ok_or_else(|| {
                VmError::runtime(format!(
                    "load: name {} not found in module {module}",
                    binding.remote
                ))
            })?;
            loaded.insert(binding.local.clone(), value.clone());
        }
        Ok(())
    }
}
