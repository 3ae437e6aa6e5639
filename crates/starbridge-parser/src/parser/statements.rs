use std::sync::Arc;

use pest::iterators::Pair;

use crate::ast::{BinOp, Expr, ExprKind, FunctionDef, LoadBinding, Stmt, StmtKind};
use crate::error::SyntaxError;
use crate::parser::AstParser;
use crate::pest_parser::Rule;

impl<'a> AstParser<'a> {
    /// Append the statement(s) of `pair`; a simple statement line may hold several
    pub(super) fn build_statement(&mut self, pair: Pair<Rule>, out: &mut Vec<Stmt>) -> Result<(), SyntaxError> {
        match pair.as_rule() {
            Rule::def_stmt => out.push(self.build_def(pair)?),
            Rule::if_stmt => out.push(self.build_if(pair)?),
            Rule::for_stmt => out.push(self.build_for(pair)?),
            Rule::while_stmt => out.push(self.build_while(pair)?),
            Rule::simple_stmt => {
                for small in pair.into_inner() {
                    out.push(self.build_small_statement(small)?);
                }
            }
            _ => return Err(self.malformed(&pair, "statement")),
        }
        Ok(())
    }

    fn build_suite(&mut self, pair: Pair<Rule>) -> Result<Vec<Stmt>, SyntaxError> {
        let mut stmts = Vec::new();
        for inner in pair.into_inner() {
            self.build_statement(inner, &mut stmts)?;
        }
        Ok(stmts)
    }

    fn build_def(&mut self, pair: Pair<Rule>) -> Result<Stmt, SyntaxError> {
        let pos = self.pos(&pair);
        let mut name = None;
        let mut params = Vec::new();
        let mut body = Vec::new();

        // Grammar: "def" ~ ident ~ "(" ~ params? ~ ")" ~ ":" ~ suite
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::ident => name = Some(inner.as_str().to_string()),
                Rule::params => params = self.build_params(inner)?,
                Rule::suite => body = self.build_suite(inner)?,
                _ => return Err(self.malformed(&inner, "def statement")),
            }
        }

        let name = name.ok_or_else(|| SyntaxError::new(self.filename, pos, "def without a name"))?;
        let def = FunctionDef::new(name, pos, params, body);
        Ok(Stmt {
            pos,
            kind: StmtKind::Def(Arc::new(def)),
        })
    }

    fn build_if(&mut self, pair: Pair<Rule>) -> Result<Stmt, SyntaxError> {
        let pos = self.pos(&pair);
        let mut inner = pair.into_inner();
        let cond_pair = inner.next().ok_or_else(|| self.missing(pos, "if condition"))?;
        let cond = self.build_expr(cond_pair)?;
        let then_pair = inner.next().ok_or_else(|| self.missing(pos, "if body"))?;
        let then = self.build_suite(then_pair)?;

        // elif chains become nested ifs in the else branch, built back to front
        let mut branches = Vec::new();
        let mut otherwise = Vec::new();
        for clause in inner {
            match clause.as_rule() {
                Rule::elif_clause => {
                    let clause_pos = self.pos(&clause);
                    let mut parts = clause.into_inner();
                    let c = parts.next().ok_or_else(|| self.missing(clause_pos, "elif condition"))?;
                    let b = parts.next().ok_or_else(|| self.missing(clause_pos, "elif body"))?;
                    branches.push((clause_pos, self.build_expr(c)?, self.build_suite(b)?));
                }
                Rule::else_clause => {
                    let clause_pos = self.pos(&clause);
                    let b = clause
                        .into_inner()
                        .next()
                        .ok_or_else(|| self.missing(clause_pos, "else body"))?;
                    otherwise = self.build_suite(b)?;
                }
                _ => return Err(self.malformed(&clause, "if statement")),
            }
        }
        for (clause_pos, c, b) in branches.into_iter().rev() {
            otherwise = vec![Stmt {
                pos: clause_pos,
                kind: StmtKind::If {
                    cond: c,
                    then: b,
                    otherwise,
                },
            }];
        }

        Ok(Stmt {
            pos,
            kind: StmtKind::If {
                cond,
                then,
                otherwise,
            },
        })
    }

    fn build_for(&mut self, pair: Pair<Rule>) -> Result<Stmt, SyntaxError> {
        let pos = self.pos(&pair);
        let mut inner = pair.into_inner();
        let vars = inner.next().ok_or_else(|| self.missing(pos, "loop variables"))?;
        let iterable = inner.next().ok_or_else(|| self.missing(pos, "loop iterable"))?;
        let body = inner.next().ok_or_else(|| self.missing(pos, "loop body"))?;
        Ok(Stmt {
            pos,
            kind: StmtKind::For {
                vars: self.build_expr_list(vars)?,
                iterable: self.build_expr_list(iterable)?,
                body: self.build_suite(body)?,
            },
        })
    }

    fn build_while(&mut self, pair: Pair<Rule>) -> Result<Stmt, SyntaxError> {
        let pos = self.pos(&pair);
        let mut inner = pair.into_inner();
        let cond = inner.next().ok_or_else(|| self.missing(pos, "while condition"))?;
        let body = inner.next().ok_or_else(|| self.missing(pos, "while body"))?;
        Ok(Stmt {
            pos,
            kind: StmtKind::While {
                cond: self.build_expr(cond)?,
                body: self.build_suite(body)?,
            },
        })
    }

    fn build_small_statement(&mut self, pair: Pair<Rule>) -> Result<Stmt, SyntaxError> {
        let pos = self.pos(&pair);
        let kind = match pair.as_rule() {
            Rule::return_stmt => match pair.into_inner().next() {
                Some(value) => StmtKind::Return(Some(self.build_expr_list(value)?)),
                None => StmtKind::Return(None),
            },
            Rule::break_stmt => StmtKind::Break,
            Rule::continue_stmt => StmtKind::Continue,
            Rule::pass_stmt => StmtKind::Pass,
            Rule::load_stmt => self.build_load(pair)?,
            Rule::assign_stmt => self.build_assign(pair)?,
            Rule::expr_stmt => {
                let list = pair.into_inner().next().ok_or_else(|| self.missing(pos, "expression"))?;
                StmtKind::Expr(self.build_expr_list(list)?)
            }
            _ => return Err(self.malformed(&pair, "simple statement")),
        };
        Ok(Stmt { pos, kind })
    }

    fn build_load(&mut self, pair: Pair<Rule>) -> Result<StmtKind, SyntaxError> {
        let pos = self.pos(&pair);
        let mut inner = pair.into_inner();
        let module_pair = inner.next().ok_or_else(|| self.missing(pos, "module name"))?;
        let module = self.decode_string(&module_pair)?;

        let mut bindings = Vec::new();
        for binding in inner {
            let mut parts: Vec<Pair<Rule>> = binding.into_inner().collect();
            let binding = match parts.len() {
                1 => {
                    let name = self.decode_string(&parts[0])?;
                    LoadBinding {
                        local: name.clone(),
                        remote: name,
                    }
                }
                2 => {
                    let remote = parts.pop().ok_or_else(|| self.missing(pos, "load binding"))?;
                    LoadBinding {
                        local: parts[0].as_str().to_string(),
                        remote: self.decode_string(&remote)?,
                    }
                }
                _ => return Err(self.missing(pos, "load binding")),
            };
            if !is_identifier(&binding.local) {
                return Err(SyntaxError::new(
                    self.filename,
                    pos,
                    format!("load: invalid identifier {:?}", binding.local),
                ));
            }
            bindings.push(binding);
        }

        if bindings.is_empty() {
            return Err(SyntaxError::new(self.filename, pos, "load statement must import at least 1 symbol"));
        }
        Ok(StmtKind::Load { module, bindings })
    }

    fn build_assign(&mut self, pair: Pair<Rule>) -> Result<StmtKind, SyntaxError> {
        let pos = self.pos(&pair);
        let mut inner = pair.into_inner();
        let target = inner.next().ok_or_else(|| self.missing(pos, "assignment target"))?;
        let op_pair = inner.next().ok_or_else(|| self.missing(pos, "assignment operator"))?;
        let value = inner.next().ok_or_else(|| self.missing(pos, "assignment value"))?;

        let op = match op_pair.as_str() {
            "=" => None,
            "+=" => Some(BinOp::Add),
            "-=" => Some(BinOp::Sub),
            "*=" => Some(BinOp::Mul),
            "/=" => Some(BinOp::Div),
            "//=" => Some(BinOp::FloorDiv),
            "%=" => Some(BinOp::Mod),
            "&=" => Some(BinOp::BitAnd),
            "|=" => Some(BinOp::BitOr),
            "^=" => Some(BinOp::BitXor),
            "<<=" => Some(BinOp::Shl),
            ">>=" => Some(BinOp::Shr),
            other => return Err(self.error(&op_pair, format!("unknown assignment operator {other}"))),
        };

        Ok(StmtKind::Assign {
            target: self.build_expr_list(target)?,
            op,
            value: self.build_expr_list(value)?,
        })
    }

    /// `expr_list` and `loop_vars`: a bare expression, or a tuple when there
    /// is a comma
    pub(super) fn build_expr_list(&mut self, pair: Pair<Rule>) -> Result<Expr, SyntaxError> {
        let pos = self.pos(&pair);
        let mut items = Vec::new();
        let mut trailing = false;
        for inner in pair.into_inner() {
            if inner.as_rule() == Rule::trailing_comma {
                trailing = true;
            } else {
                items.push(self.build_expr(inner)?);
            }
        }
        if items.len() == 1 && !trailing {
            return items.pop().ok_or_else(|| self.missing(pos, "expression"));
        }
        Ok(Expr::new(pos, ExprKind::Tuple(items)))
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
