use std::sync::Arc;

use pest::iterators::Pair;

use crate::ast::{Arg, BinOp, Clause, Expr, ExprKind, FunctionDef, Param, Stmt, StmtKind, UnaryOp};
use crate::error::SyntaxError;
use crate::parser::AstParser;
use crate::pest_parser::Rule;

impl<'a> AstParser<'a> {
    pub(super) fn build_expr(&mut self, pair: Pair<Rule>) -> Result<Expr, SyntaxError> {
        match pair.as_rule() {
            Rule::lambda_expr => self.build_lambda(pair),
            Rule::cond_expr => self.build_cond(pair),
            Rule::or_expr => self.build_logical(pair, true),
            Rule::and_expr => self.build_logical(pair, false),
            Rule::not_expr => self.build_not(pair),
            Rule::comparison => self.build_comparison(pair),
            Rule::bitor_expr => self.build_fixed_binary(pair, BinOp::BitOr),
            Rule::bitxor_expr => self.build_fixed_binary(pair, BinOp::BitXor),
            Rule::bitand_expr => self.build_fixed_binary(pair, BinOp::BitAnd),
            Rule::shift_expr | Rule::arith_expr | Rule::term => self.build_binary(pair),
            Rule::factor => self.build_factor(pair),
            Rule::postfix_expr => self.build_postfix(pair),
            Rule::expr_list | Rule::loop_vars => self.build_expr_list(pair),
            _ => self.build_primary(pair),
        }
    }

    fn only_child<'i>(&self, pair: Pair<'i, Rule>) -> Result<Pair<'i, Rule>, SyntaxError> {
        let pos = self.pos(&pair);
        pair.into_inner().next().ok_or_else(|| self.missing(pos, "expression"))
    }

    fn build_lambda(&mut self, pair: Pair<Rule>) -> Result<Expr, SyntaxError> {
        let pos = self.pos(&pair);
        let mut params = Vec::new();
        let mut body = None;
        for inner in pair.into_inner() {
            if inner.as_rule() == Rule::params {
                params = self.build_params(inner)?;
            } else {
                body = Some(self.build_expr(inner)?);
            }
        }
        let body = body.ok_or_else(|| self.missing(pos, "lambda body"))?;
        let ret = Stmt {
            pos: body.pos,
            kind: StmtKind::Return(Some(body)),
        };
        let def = FunctionDef::new("lambda", pos, params, vec![ret]);
        Ok(Expr::new(pos, ExprKind::Lambda(Arc::new(def))))
    }

    fn build_cond(&mut self, pair: Pair<Rule>) -> Result<Expr, SyntaxError> {
        let pos = self.pos(&pair);
        let mut inner = pair.into_inner();
        let first = inner.next().ok_or_else(|| self.missing(pos, "expression"))?;
        let then = self.build_expr(first)?;
        let Some(cond) = inner.next() else {
            return Ok(then);
        };
        let otherwise = inner.next().ok_or_else(|| self.missing(pos, "else branch"))?;
        Ok(Expr::new(
            pos,
            ExprKind::Cond {
                cond: Box::new(self.build_expr(cond)?),
                then: Box::new(then),
                otherwise: Box::new(self.build_expr(otherwise)?),
            },
        ))
    }

    fn build_logical(&mut self, pair: Pair<Rule>, is_or: bool) -> Result<Expr, SyntaxError> {
        let pos = self.pos(&pair);
        let mut inner = pair.into_inner();
        let first = inner.next().ok_or_else(|| self.missing(pos, "operand"))?;
        let mut lhs = self.build_expr(first)?;
        for operand in inner {
            let rhs = self.build_expr(operand)?;
            let kind = if is_or {
                ExprKind::Or(Box::new(lhs), Box::new(rhs))
            } else {
                ExprKind::And(Box::new(lhs), Box::new(rhs))
            };
            lhs = Expr::new(pos, kind);
        }
        Ok(lhs)
    }

    fn build_not(&mut self, pair: Pair<Rule>) -> Result<Expr, SyntaxError> {
        let pos = self.pos(&pair);
        let inner = self.only_child(pair)?;
        if inner.as_rule() == Rule::not_expr {
            let operand = self.build_expr(inner)?;
            return Ok(Expr::new(
                pos,
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
            ));
        }
        self.build_expr(inner)
    }

    fn build_comparison(&mut self, pair: Pair<Rule>) -> Result<Expr, SyntaxError> {
        let pos = self.pos(&pair);
        let mut inner = pair.into_inner();
        let first = inner.next().ok_or_else(|| self.missing(pos, "operand"))?;
        let lhs = self.build_expr(first)?;
        let Some(op_pair) = inner.next() else {
            return Ok(lhs);
        };
        let op = self.comparison_op(&op_pair)?;
        let op_pos = self.pos(&op_pair);
        let rhs_pair = inner.next().ok_or_else(|| self.missing(op_pos, "operand"))?;
        let rhs = self.build_expr(rhs_pair)?;
        if let Some(extra) = inner.next() {
            return Err(self.error(&extra, "comparison operators are not associative"));
        }
        Ok(Expr::new(
            op_pos,
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        ))
    }

    fn comparison_op(&self, pair: &Pair<Rule>) -> Result<BinOp, SyntaxError> {
        if let Some(inner) = pair.clone().into_inner().next() {
            return match inner.as_rule() {
                Rule::not_in => Ok(BinOp::NotIn),
                Rule::in_op => Ok(BinOp::In),
                _ => Err(self.malformed(&inner, "comparison")),
            };
        }
        match pair.as_str() {
            "==" => Ok(BinOp::Eq),
            "!=" => Ok(BinOp::Ne),
            "<" => Ok(BinOp::Lt),
            "<=" => Ok(BinOp::Le),
            ">" => Ok(BinOp::Gt),
            ">=" => Ok(BinOp::Ge),
            other => Err(self.error(pair, format!("unknown comparison operator {other}"))),
        }
    }

    /// Levels whose operator is a bare literal (`|`, `^`, `&`)
    fn build_fixed_binary(&mut self, pair: Pair<Rule>, op: BinOp) -> Result<Expr, SyntaxError> {
        let pos = self.pos(&pair);
        let mut inner = pair.into_inner();
        let first = inner.next().ok_or_else(|| self.missing(pos, "operand"))?;
        let mut lhs = self.build_expr(first)?;
        for operand in inner {
            let rhs = self.build_expr(operand)?;
            lhs = Expr::new(
                lhs.pos,
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            );
        }
        Ok(lhs)
    }

    /// Levels with explicit operator pairs: shift, arith, term
    fn build_binary(&mut self, pair: Pair<Rule>) -> Result<Expr, SyntaxError> {
        let pos = self.pos(&pair);
        let mut inner = pair.into_inner();
        let first = inner.next().ok_or_else(|| self.missing(pos, "operand"))?;
        let mut lhs = self.build_expr(first)?;
        while let Some(op_pair) = inner.next() {
            let op = match op_pair.as_str() {
                "<<" => BinOp::Shl,
                ">>" => BinOp::Shr,
                "+" => BinOp::Add,
                "-" => BinOp::Sub,
                "*" => BinOp::Mul,
                "/" => BinOp::Div,
                "//" => BinOp::FloorDiv,
                "%" => BinOp::Mod,
                other => return Err(self.error(&op_pair, format!("unknown operator {other}"))),
            };
            let op_pos = self.pos(&op_pair);
            let rhs_pair = inner.next().ok_or_else(|| self.missing(op_pos, "operand"))?;
            let rhs = self.build_expr(rhs_pair)?;
            lhs = Expr::new(
                op_pos,
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            );
        }
        Ok(lhs)
    }

    fn build_factor(&mut self, pair: Pair<Rule>) -> Result<Expr, SyntaxError> {
        let pos = self.pos(&pair);
        let mut inner = pair.into_inner();
        let first = inner.next().ok_or_else(|| self.missing(pos, "operand"))?;
        if first.as_rule() != Rule::unary_op {
            return self.build_expr(first);
        }
        let op = match first.as_str() {
            "+" => UnaryOp::Plus,
            "-" => UnaryOp::Minus,
            _ => UnaryOp::Invert,
        };
        let operand = inner.next().ok_or_else(|| self.missing(pos, "operand"))?;
        let operand = self.build_expr(operand)?;
        Ok(Expr::new(
            pos,
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
        ))
    }

    fn build_postfix(&mut self, pair: Pair<Rule>) -> Result<Expr, SyntaxError> {
        let pos = self.pos(&pair);
        let mut inner = pair.into_inner();
        let first = inner.next().ok_or_else(|| self.missing(pos, "primary expression"))?;
        let mut expr = self.build_expr(first)?;

        for postfix in inner {
            let postfix_pos = self.pos(&postfix);
            let kind = match postfix.as_rule() {
                Rule::call => ExprKind::Call {
                    func: Box::new(expr),
                    args: self.build_args(postfix)?,
                },
                Rule::index => {
                    let list = self.only_child(postfix)?;
                    ExprKind::Index {
                        object: Box::new(expr),
                        index: Box::new(self.build_expr_list(list)?),
                    }
                }
                Rule::slice => {
                    let (mut lo, mut hi, mut step) = (None, None, None);
                    for part in postfix.into_inner() {
                        let rule = part.as_rule();
                        let value = Some(Box::new(self.build_expr(self.only_child(part)?)?));
                        match rule {
                            Rule::slice_lo => lo = value,
                            Rule::slice_hi => hi = value,
                            _ => step = value,
                        }
                    }
                    ExprKind::Slice {
                        object: Box::new(expr),
                        lo,
                        hi,
                        step,
                    }
                }
                Rule::attr => {
                    let name = self.only_child(postfix)?.as_str().to_string();
                    ExprKind::Attr {
                        object: Box::new(expr),
                        name,
                    }
                }
                _ => return Err(self.malformed(&postfix, "postfix expression")),
            };
            expr = Expr::new(postfix_pos, kind);
        }
        Ok(expr)
    }

    fn build_args(&mut self, pair: Pair<Rule>) -> Result<Vec<Arg>, SyntaxError> {
        let mut args = Vec::new();
        for arg in pair.into_inner() {
            let rule = arg.as_rule();
            let arg = match rule {
                Rule::named_arg => {
                    let pos = self.pos(&arg);
                    let mut parts = arg.into_inner();
                    let name = parts.next().ok_or_else(|| self.missing(pos, "argument name"))?;
                    let value = parts.next().ok_or_else(|| self.missing(pos, "argument value"))?;
                    Arg::Named(name.as_str().to_string(), self.build_expr(value)?)
                }
                Rule::positional_arg => Arg::Positional(self.build_expr(self.only_child(arg)?)?),
                Rule::varargs_arg => Arg::Star(self.build_expr(self.only_child(arg)?)?),
                Rule::kwargs_arg => Arg::StarStar(self.build_expr(self.only_child(arg)?)?),
                _ => return Err(self.malformed(&arg, "argument")),
            };
            args.push(arg);
        }
        Ok(args)
    }

    pub(super) fn build_params(&mut self, pair: Pair<Rule>) -> Result<Vec<Param>, SyntaxError> {
        let mut params = Vec::new();
        for param in pair.into_inner() {
            let pos = self.pos(&param);
            let rule = param.as_rule();
            let mut parts = param.into_inner();
            let name = parts
                .next()
                .ok_or_else(|| self.missing(pos, "parameter name"))?
                .as_str()
                .to_string();
            let param = match rule {
                Rule::plain_param => Param::Required(name),
                Rule::default_param => {
                    let default = parts.next().ok_or_else(|| self.missing(pos, "default value"))?;
                    Param::Optional(name, self.build_expr(default)?)
                }
                Rule::varargs_param => Param::Args(name),
                Rule::kwargs_param => Param::Kwargs(name),
                _ => return Err(SyntaxError::new(self.filename, pos, "malformed parameter")),
            };
            params.push(param);
        }
        Ok(params)
    }

    fn build_primary(&mut self, pair: Pair<Rule>) -> Result<Expr, SyntaxError> {
        let pos = self.pos(&pair);
        let kind = match pair.as_rule() {
            Rule::ident => ExprKind::Ident(pair.as_str().to_string()),
            Rule::int => ExprKind::Int(self.parse_int(&pair)?),
            Rule::float => {
                let value = pair
                    .as_str()
                    .parse::<f64>()
                    .map_err(|e| self.error(&pair, format!("invalid float literal: {e}")))?;
                ExprKind::Float(value)
            }
            Rule::string => ExprKind::Str(self.decode_string(&pair)?),
            Rule::list_lit => {
                let items = pair
                    .into_inner()
                    .map(|item| self.build_expr(item))
                    .collect::<Result<Vec<_>, _>>()?;
                ExprKind::List(items)
            }
            Rule::dict_lit => {
                let mut entries = Vec::new();
                for entry in pair.into_inner() {
                    entries.push(self.build_dict_entry(entry)?);
                }
                ExprKind::Dict(entries)
            }
            Rule::list_comp => {
                let mut inner = pair.into_inner();
                let element = inner.next().ok_or_else(|| self.missing(pos, "comprehension element"))?;
                let element = Box::new(self.build_expr(element)?);
                let clauses = self.build_clauses(inner)?;
                ExprKind::ListComp { element, clauses }
            }
            Rule::dict_comp => {
                let mut inner = pair.into_inner();
                let entry = inner.next().ok_or_else(|| self.missing(pos, "comprehension entry"))?;
                let (key, value) = self.build_dict_entry(entry)?;
                let clauses = self.build_clauses(inner)?;
                ExprKind::DictComp {
                    key: Box::new(key),
                    value: Box::new(value),
                    clauses,
                }
            }
            Rule::empty_tuple => ExprKind::Tuple(Vec::new()),
            Rule::tuple_lit => {
                let items = pair
                    .into_inner()
                    .map(|item| self.build_expr(item))
                    .collect::<Result<Vec<_>, _>>()?;
                ExprKind::Tuple(items)
            }
            Rule::paren_expr => {
                let inner = self.only_child(pair)?;
                return self.build_expr(inner);
            }
            _ => return Err(self.malformed(&pair, "expression")),
        };
        Ok(Expr::new(pos, kind))
    }

    fn build_dict_entry(&mut self, pair: Pair<Rule>) -> Result<(Expr, Expr), SyntaxError> {
        let pos = self.pos(&pair);
        let mut inner = pair.into_inner();
        let key = inner.next().ok_or_else(|| self.missing(pos, "dict key"))?;
        let value = inner.next().ok_or_else(|| self.missing(pos, "dict value"))?;
        Ok((self.build_expr(key)?, self.build_expr(value)?))
    }

    fn build_clauses(&mut self, pairs: pest::iterators::Pairs<Rule>) -> Result<Vec<Clause>, SyntaxError> {
        let mut clauses = Vec::new();
        for clause in pairs {
            let pos = self.pos(&clause);
            match clause.as_rule() {
                Rule::comp_for => {
                    let mut parts = clause.into_inner();
                    let vars = parts.next().ok_or_else(|| self.missing(pos, "loop variables"))?;
                    let iterable = parts.next().ok_or_else(|| self.missing(pos, "loop iterable"))?;
                    clauses.push(Clause::For {
                        vars: self.build_expr_list(vars)?,
                        iterable: self.build_expr(iterable)?,
                    });
                }
                Rule::comp_if => {
                    let cond = self.only_child(clause)?;
                    clauses.push(Clause::If(self.build_expr(cond)?));
                }
                _ => return Err(self.malformed(&clause, "comprehension clause")),
            }
        }
        Ok(clauses)
    }

    fn parse_int(&self, pair: &Pair<Rule>) -> Result<i64, SyntaxError> {
        let text = pair.as_str();
        let (digits, radix) = match text.get(..2) {
            Some("0x") | Some("0X") => (&text[2..], 16),
            Some("0o") | Some("0O") => (&text[2..], 8),
            Some("0b") | Some("0B") => (&text[2..], 2),
            _ => {
                if text.len() > 1 && text.starts_with('0') && text.bytes().any(|b| b != b'0') {
                    return Err(self.error(pair, "obsolete form of octal literal; use 0o..."));
                }
                (text, 10)
            }
        };
        i64::from_str_radix(digits, radix).map_err(|_| self.error(pair, format!("int literal out of range: {text}")))
    }

    /// Strip quotes and prefix from a string token and decode escapes
    pub(super) fn decode_string(&self, pair: &Pair<Rule>) -> Result<String, SyntaxError> {
        let text = pair.as_str();
        let (raw, body) = match text.strip_prefix(['r', 'R']) {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let quote_len = if body.starts_with("\"\"\"") || body.starts_with("'''") { 3 } else { 1 };
        if body.len() < quote_len * 2 {
            return Err(self.error(pair, "malformed string literal"));
        }
        let content = &body[quote_len..body.len() - quote_len];
        if raw {
            return Ok(content.to_string());
        }
        unescape(content).map_err(|message| self.error(pair, message))
    }
}

/// Decode backslash escapes. Unknown escapes keep their backslash.
fn unescape(content: &str) -> Result<String, String> {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(esc) = chars.next() else {
            out.push('\\');
            break;
        };
        match esc {
            '\n' => {}
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\u{7}'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0'..='7' => {
                let mut value = esc.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            value = value * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(value).ok_or("invalid octal escape")?);
            }
            'x' | 'u' | 'U' => {
                let width = match esc {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let hex: String = chars.by_ref().take(width).collect();
                if hex.len() != width {
                    return Err(format!("truncated \\{esc} escape"));
                }
                let code = u32::from_str_radix(&hex, 16).map_err(|_| format!("invalid \\{esc} escape: {hex}"))?;
                let ch = char::from_u32(code).ok_or_else(|| format!("invalid Unicode code point: {hex}"))?;
                out.push(ch);
            }
            '\\' | '\'' | '"' => out.push(esc),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::unescape;

    #[test]
    fn test_unescape_common() {
        assert_eq!(unescape(r"a\tb\n").unwrap(), "a\tb\n");
        assert_eq!(unescape(r#"\"q\""#).unwrap(), "\"q\"");
        assert_eq!(unescape(r"\x41é\101").unwrap(), "AéA");
    }

    #[test]
    fn test_unknown_escape_kept() {
        assert_eq!(unescape(r"\d+").unwrap(), r"\d+");
    }

    #[test]
    fn test_truncated_hex() {
        assert!(unescape(r"\x4").is_err());
    }
}
