//! Static checks run after the AST is built.
//!
//! Computes the local-name set of each function and rejects programs the
//! interpreter cannot run: misplaced `break`/`continue`/`return`/`load`,
//! invalid assignment targets, malformed parameter lists.

use std::collections::{BTreeSet, HashSet};

use crate::ast::{Arg, Clause, Expr, ExprKind, FunctionDef, Module, Param, Pos, Stmt, StmtKind};
use crate::error::SyntaxError;

/// Names bound in a function body: parameters plus every assignment,
/// `for` variable and nested `def`. Nested function bodies and
/// comprehensions have their own scopes and are not descended into.
pub fn collect_locals(params: &[Param], body: &[Stmt]) -> BTreeSet<String> {
    let mut locals: BTreeSet<String> = params.iter().map(|p| p.name().to_string()).collect();
    collect_stmts(body, &mut locals);
    locals
}

fn collect_stmts(stmts: &[Stmt], out: &mut BTreeSet<String>) {
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Assign { target, .. } => collect_target(target, out),
            StmtKind::Def(def) => {
                out.insert(def.name.clone());
            }
            StmtKind::If { then, otherwise, .. } => {
                collect_stmts(then, out);
                collect_stmts(otherwise, out);
            }
            StmtKind::For { vars, body, .. } => {
                collect_target(vars, out);
                collect_stmts(body, out);
            }
            StmtKind::While { body, .. } => collect_stmts(body, out),
            StmtKind::Load { bindings, .. } => {
                out.extend(bindings.iter().map(|b| b.local.clone()));
            }
            _ => {}
        }
    }
}

/// Names bound by an assignment or loop target
pub fn collect_target(target: &Expr, out: &mut BTreeSet<String>) {
    match &target.kind {
        ExprKind::Ident(name) => {
            out.insert(name.clone());
        }
        ExprKind::Tuple(items) | ExprKind::List(items) => {
            for item in items {
                collect_target(item, out);
            }
        }
        _ => {}
    }
}

#[derive(Clone, Copy)]
struct Context {
    in_function: bool,
    in_loop: bool,
    top_level: bool,
}

struct Checker<'a> {
    filename: &'a str,
}

impl<'a> Checker<'a> {
    fn error(&self, pos: Pos, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(self.filename, pos, message)
    }

    fn stmts(&self, stmts: &[Stmt], ctx: Context) -> Result<(), SyntaxError> {
        for stmt in stmts {
            self.stmt(stmt, ctx)?;
        }
        Ok(())
    }

    fn stmt(&self, stmt: &Stmt, ctx: Context) -> Result<(), SyntaxError> {
        let nested = Context {
            top_level: false,
            ..ctx
        };
        match &stmt.kind {
            StmtKind::Expr(expr) => self.expr(expr),
            StmtKind::Assign { target, op, value } => {
                if op.is_some() {
                    self.augmented_target(target)?;
                } else {
                    self.target(target)?;
                }
                self.expr(value)
            }
            StmtKind::Def(def) => self.function(def),
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.expr(cond)?;
                self.stmts(then, nested)?;
                self.stmts(otherwise, nested)
            }
            StmtKind::For {
                vars,
                iterable,
                body,
            } => {
                self.target(vars)?;
                self.expr(iterable)?;
                self.stmts(
                    body,
                    Context {
                        in_loop: true,
                        ..nested
                    },
                )
            }
            StmtKind::While { cond, body } => {
                self.expr(cond)?;
                self.stmts(
                    body,
                    Context {
                        in_loop: true,
                        ..nested
                    },
                )
            }
            StmtKind::Return(value) => {
                if !ctx.in_function {
                    return Err(self.error(stmt.pos, "return statement not within a function"));
                }
                match value {
                    Some(value) => self.expr(value),
                    None => Ok(()),
                }
            }
            StmtKind::Break | StmtKind::Continue => {
                if !ctx.in_loop {
                    let word = if matches!(stmt.kind, StmtKind::Break) {
                        "break"
                    } else {
                        "continue"
                    };
                    return Err(self.error(stmt.pos, format!("{word} not in a loop")));
                }
                Ok(())
            }
            StmtKind::Pass => Ok(()),
            StmtKind::Load { bindings, .. } => {
                if !ctx.top_level {
                    return Err(self.error(stmt.pos, "load statement not at top level"));
                }
                let mut seen = HashSet::new();
                for binding in bindings {
                    if binding.remote.starts_with('_') {
                        return Err(self.error(
                            stmt.pos,
                            format!("load: names with leading underscores are not exported: {}", binding.remote),
                        ));
                    }
                    if !seen.insert(binding.local.as_str()) {
                        return Err(self.error(stmt.pos, format!("load: duplicate binding of {}", binding.local)));
                    }
                }
                Ok(())
            }
        }
    }

    fn function(&self, def: &FunctionDef) -> Result<(), SyntaxError> {
        self.params(def)?;
        self.stmts(
            &def.body,
            Context {
                in_function: true,
                in_loop: false,
                top_level: false,
            },
        )
    }

    fn params(&self, def: &FunctionDef) -> Result<(), SyntaxError> {
        let mut seen = HashSet::new();
        let mut optional_seen = false;
        let mut star_seen = false;
        let mut kwargs_seen = false;
        for param in &def.params {
            if kwargs_seen {
                return Err(self.error(def.pos, "parameter may not follow **kwargs"));
            }
            if !seen.insert(param.name()) {
                return Err(self.error(def.pos, format!("duplicate parameter: {}", param.name())));
            }
            match param {
                Param::Required(_) => {
                    if optional_seen && !star_seen {
                        return Err(self.error(def.pos, "required parameter may not follow optional"));
                    }
                }
                Param::Optional(_, default) => {
                    optional_seen = true;
                    self.expr(default)?;
                }
                Param::Args(_) => {
                    if star_seen {
                        return Err(self.error(def.pos, "multiple * parameters not allowed"));
                    }
                    star_seen = true;
                }
                Param::Kwargs(_) => kwargs_seen = true,
            }
        }
        Ok(())
    }

    fn target(&self, target: &Expr) -> Result<(), SyntaxError> {
        match &target.kind {
            ExprKind::Ident(_) => Ok(()),
            ExprKind::Index { object, index } => {
                self.expr(object)?;
                self.expr(index)
            }
            ExprKind::Attr { object, .. } => self.expr(object),
            ExprKind::Tuple(items) | ExprKind::List(items) => {
                if items.is_empty() {
                    return Err(self.error(target.pos, "can't assign to empty sequence"));
                }
                items.iter().try_for_each(|item| self.target(item))
            }
            _ => Err(self.error(target.pos, format!("can't assign to {}", describe(target)))),
        }
    }

    fn augmented_target(&self, target: &Expr) -> Result<(), SyntaxError> {
        match &target.kind {
            ExprKind::Ident(_) | ExprKind::Index { .. } | ExprKind::Attr { .. } => self.target(target),
            _ => Err(self.error(
                target.pos,
                format!("can't use augmented assignment on {}", describe(target)),
            )),
        }
    }

    fn clauses(&self, clauses: &[Clause]) -> Result<(), SyntaxError> {
        for clause in clauses {
            match clause {
                Clause::For { vars, iterable } => {
                    self.target(vars)?;
                    self.expr(iterable)?;
                }
                Clause::If(cond) => self.expr(cond)?,
            }
        }
        Ok(())
    }

    fn expr(&self, expr: &Expr) -> Result<(), SyntaxError> {
        match &expr.kind {
            ExprKind::Ident(_) | ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::Str(_) => Ok(()),
            ExprKind::List(items) | ExprKind::Tuple(items) => items.iter().try_for_each(|e| self.expr(e)),
            ExprKind::Dict(entries) => entries.iter().try_for_each(|(k, v)| {
                self.expr(k)?;
                self.expr(v)
            }),
            ExprKind::ListComp { element, clauses } => {
                self.clauses(clauses)?;
                self.expr(element)
            }
            ExprKind::DictComp {
                key,
                value,
                clauses,
            } => {
                self.clauses(clauses)?;
                self.expr(key)?;
                self.expr(value)
            }
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::Binary { lhs, rhs, .. } | ExprKind::And(lhs, rhs) | ExprKind::Or(lhs, rhs) => {
                self.expr(lhs)?;
                self.expr(rhs)
            }
            ExprKind::Cond {
                cond,
                then,
                otherwise,
            } => {
                self.expr(cond)?;
                self.expr(then)?;
                self.expr(otherwise)
            }
            ExprKind::Call { func, args } => {
                self.expr(func)?;
                self.args(args)
            }
            ExprKind::Index { object, index } => {
                self.expr(object)?;
                self.expr(index)
            }
            ExprKind::Slice { object, lo, hi, step } => {
                self.expr(object)?;
                for part in [lo, hi, step].into_iter().flatten() {
                    self.expr(part)?;
                }
                Ok(())
            }
            ExprKind::Attr { object, .. } => self.expr(object),
            ExprKind::Lambda(def) => self.function(def),
        }
    }

    fn args(&self, args: &[Arg]) -> Result<(), SyntaxError> {
        let mut named = HashSet::new();
        let mut seen_named = false;
        let mut seen_kwargs = false;
        for arg in args {
            match arg {
                Arg::Positional(e) => {
                    if seen_named || seen_kwargs {
                        return Err(self.error(e.pos, "positional argument may not follow named"));
                    }
                    self.expr(e)?;
                }
                Arg::Named(name, e) => {
                    if !named.insert(name.as_str()) {
                        return Err(self.error(e.pos, format!("keyword argument {name} repeated")));
                    }
                    seen_named = true;
                    self.expr(e)?;
                }
                Arg::Star(e) => {
                    if seen_kwargs {
                        return Err(self.error(e.pos, "*args may not follow **kwargs"));
                    }
                    self.expr(e)?;
                }
                Arg::StarStar(e) => {
                    seen_kwargs = true;
                    self.expr(e)?;
                }
            }
        }
        Ok(())
    }
}

fn describe(expr: &Expr) -> &'static str {
    match &expr.kind {
        ExprKind::Call { .. } => "function call",
        ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::Str(_) => "literal",
        ExprKind::Binary { .. } | ExprKind::Unary { .. } => "operator expression",
        ExprKind::Slice { .. } => "slice",
        ExprKind::Dict(_) | ExprKind::DictComp { .. } => "dict expression",
        ExprKind::ListComp { .. } => "comprehension",
        ExprKind::Lambda(_) => "lambda",
        _ => "expression",
    }
}

/// Run all static checks over a parsed module
pub fn check_module(module: &Module) -> Result<(), SyntaxError> {
    let checker = Checker {
        filename: &module.filename,
    };
    checker.stmts(
        &module.stmts,
        Context {
            in_function: false,
            in_loop: false,
            top_level: true,
        },
    )
}

/// Names bound at the top level of a module
pub fn module_globals(module: &Module) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    collect_stmts(&module.stmts, &mut out);
    out
}
