use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use starbridge_parser::{Arg, Clause, Expr, ExprKind};

use crate::error::VmError;
use crate::value::{Args, Dict, Value};
use crate::vm::{call, Declared, Interp, Scope, ValueOperations};

type Emit<'a, 't> = dyn FnMut(&mut Interp<'t>) -> Result<(), VmError> + 'a;

impl<'t> Interp<'t> {
    /// Evaluate an expression; errors are annotated with the innermost position
    pub(crate) fn eval(&mut self, expr: &Expr) -> Result<Value, VmError> {
        self.eval_kind(expr).map_err(|err| self.thread.annotate(err, expr.pos))
    }

    fn eval_kind(&mut self, expr: &Expr) -> Result<Value, VmError> {
        match &expr.kind {
            ExprKind::Ident(name) => self.lookup(name),
            ExprKind::Int(i) => Ok(Value::Int(*i)),
            ExprKind::Float(f) => Ok(Value::Float(*f)),
            ExprKind::Str(s) => Ok(Value::string(s)),
            ExprKind::List(items) => Ok(Value::list(self.eval_all(items)?)),
            ExprKind::Tuple(items) => Ok(Value::tuple(self.eval_all(items)?)),
            ExprKind::Dict(entries) => {
                let dict = Dict::new();
                for (k, v) in entries {
                    let key = self.eval(k)?;
                    let value = self.eval(v)?;
                    if dict.contains(&key)? {
                        return Err(VmError::runtime(format!("duplicate key: {}", key.repr())));
                    }
                    dict.insert(key, value)?;
                }
                Ok(Value::dict(dict))
            }
            ExprKind::ListComp { element, clauses } => {
                let mut out = Vec::new();
                self.eval_comprehension(clauses, &mut |interp: &mut Interp<'t>| {
                    out.push(interp.eval(element)?);
                    Ok(())
                })?;
                Ok(Value::list(out))
            }
            ExprKind::DictComp { key, value, clauses } => {
                let dict = Dict::new();
                self.eval_comprehension(clauses, &mut |interp: &mut Interp<'t>| {
                    let k = interp.eval(key)?;
                    let v = interp.eval(value)?;
                    dict.insert(k, v)
                })?;
                Ok(Value::dict(dict))
            }
            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand)?;
                ValueOperations::unary(*op, &value)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let left = self.eval(lhs)?;
                let right = self.eval(rhs)?;
                ValueOperations::binary(*op, &left, &right)
            }
            ExprKind::And(lhs, rhs) => {
                let left = self.eval(lhs)?;
                if !left.truth() {
                    return Ok(left);
                }
                self.eval(rhs)
            }
            ExprKind::Or(lhs, rhs) => {
                let left = self.eval(lhs)?;
                if left.truth() {
                    return Ok(left);
                }
                self.eval(rhs)
            }
            ExprKind::Cond { cond, then, otherwise } => {
                if self.eval(cond)?.truth() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            ExprKind::Call { func, args } => {
                let callee = self.eval(func)?;
                let args = self.eval_args(args)?;
                self.thread.set_pos(expr.pos);
                call(self.thread, &callee, args)
            }
            ExprKind::Index { object, index } => {
                let object = self.eval(object)?;
                let key = self.eval(index)?;
                ValueOperations::index(&object, &key)
            }
            ExprKind::Slice { object, lo, hi, step } => {
                let object = self.eval(object)?;
                let lo = self.eval_opt(lo.as_deref())?;
                let hi = self.eval_opt(hi.as_deref())?;
                let step = self.eval_opt(step.as_deref())?;
                ValueOperations::slice(&object, &lo, &hi, &step)
            }
            ExprKind::Attr { object, name } => {
                let object = self.eval(object)?;
                ValueOperations::get_attr(&object, name)
            }
            ExprKind::Lambda(def) => self.make_function(def),
        }
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>, VmError> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }

    fn eval_opt(&mut self, expr: Option<&Expr>) -> Result<Value, VmError> {
        match expr {
            Some(expr) => self.eval(expr),
            None => Ok(Value::None),
        }
    }

    fn eval_args(&mut self, args: &[Arg]) -> Result<Args, VmError> {
        let mut out = Args::default();
        for arg in args {
            match arg {
                Arg::Positional(expr) => out.positional.push(self.eval(expr)?),
                Arg::Named(name, expr) => {
                    let value = self.eval(expr)?;
                    out.named.push((name.clone(), value));
                }
                Arg::Star(expr) => {
                    let value = self.eval(expr)?;
                    let items = value.to_vec().map_err(|_| {
                        VmError::runtime(format!("argument after * must be iterable, not {}", value.type_name()))
                    })?;
                    out.positional.extend(items);
                }
                Arg::StarStar(expr) => {
                    let value = self.eval(expr)?;
                    let Value::Dict(dict) = &value else {
                        return Err(VmError::runtime(format!(
                            "argument after ** must be a mapping, not {}",
                            value.type_name()
                        )));
                    };
                    for (k, v) in dict.items() {
                        let Value::String(name) = k else {
                            return Err(VmError::runtime(format!("keywords must be strings, not {}", k.type_name())));
                        };
                        if out.named.iter().any(|(n, _)| n.as_str() == name.as_ref()) {
                            return Err(VmError::runtime(format!("keyword argument {name} repeated")));
                        }
                        out.named.push((name.to_string(), v));
                    }
                }
            }
        }
        Ok(out)
    }

    /// Run comprehension clauses in a fresh scope, calling `emit` for each
    /// surviving combination. The first iterable is evaluated outside it.
    fn eval_comprehension(&mut self, clauses: &[Clause], emit: &mut Emit<'_, 't>) -> Result<(), VmError> {
        let Some(Clause::For { vars, iterable }) = clauses.first() else {
            return Err(VmError::runtime("comprehension must begin with a for clause"));
        };
        let items = self.eval(iterable)?.iterate()?;

        let mut names = BTreeSet::new();
        for clause in clauses {
            if let Clause::For { vars, .. } = clause {
                starbridge_parser::resolve::collect_target(vars, &mut names);
            }
        }
        let scope = Arc::new(Scope::new(Declared::Names(names), HashMap::new(), self.scope.clone()));
        let outer = std::mem::replace(&mut self.scope, Some(scope));

        let mut result = Ok(());
        for item in items {
            result = self
                .thread
                .check_cancelled()
                .and_then(|_| self.assign(vars, item))
                .and_then(|_| self.run_clauses(&clauses[1..], emit));
            if result.is_err() {
                break;
            }
        }
        self.scope = outer;
        result
    }

    fn run_clauses(&mut self, clauses: &[Clause], emit: &mut Emit<'_, 't>) -> Result<(), VmError> {
        let Some((clause, rest)) = clauses.split_first() else {
            return emit(self);
        };
        match clause {
            Clause::If(cond) => {
                if self.eval(cond)?.truth() {
                    self.run_clauses(rest, emit)?;
                }
            }
            Clause::For { vars, iterable } => {
                for item in self.eval(iterable)?.iterate()? {
                    self.thread.check_cancelled()?;
                    self.assign(vars, item)?;
                    self.run_clauses(rest, emit)?;
                }
            }
        }
        Ok(())
    }
}
