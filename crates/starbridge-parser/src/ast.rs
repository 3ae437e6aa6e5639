//! Abstract syntax tree for the guest language
//!
//! Function bodies are held behind `Arc` so that runtime function values can
//! share them across threads without copying the tree.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// 1-based line/column position in the original source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub const fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// A parsed source file
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub filename: String,
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub pos: Pos,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Expression evaluated for its effect
    Expr(Expr),
    /// `target = value` or `target op= value`
    Assign {
        target: Expr,
        op: Option<BinOp>,
        value: Expr,
    },
    /// `def name(params): body`
    Def(Arc<FunctionDef>),
    /// `if`/`elif`/`else`; `elif` chains nest in `otherwise`
    If {
        cond: Expr,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
    },
    For {
        vars: Expr,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    Return(Option<Expr>),
    Break,
    Continue,
    Pass,
    /// `load("module", "name", alias = "name")`
    Load {
        module: String,
        bindings: Vec<LoadBinding>,
    },
}

/// One imported name: `local` is bound to the module's `remote` member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBinding {
    pub local: String,
    pub remote: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub pos: Pos,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(pos: Pos, kind: ExprKind) -> Self {
        Self { pos, kind }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    ListComp {
        element: Box<Expr>,
        clauses: Vec<Clause>,
    },
    DictComp {
        key: Box<Expr>,
        value: Box<Expr>,
        clauses: Vec<Clause>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Short-circuit `and`
    And(Box<Expr>, Box<Expr>),
    /// Short-circuit `or`
    Or(Box<Expr>, Box<Expr>),
    /// `then if cond else otherwise`
    Cond {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Arg>,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        object: Box<Expr>,
        lo: Option<Box<Expr>>,
        hi: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    Attr {
        object: Box<Expr>,
        name: String,
    },
    Lambda(Arc<FunctionDef>),
}

/// Comprehension clause
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    For { vars: Expr, iterable: Expr },
    If(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Invert,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::In => "in",
            BinOp::NotIn => "not in",
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Call-site argument
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Positional(Expr),
    Named(String, Expr),
    /// `*iterable`
    Star(Expr),
    /// `**mapping`
    StarStar(Expr),
}

/// Definition-site parameter
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Required(String),
    Optional(String, Expr),
    /// `*args`
    Args(String),
    /// `**kwargs`
    Kwargs(String),
}

impl Param {
    pub fn name(&self) -> &str {
        match self {
            Param::Required(name)
            | Param::Optional(name, _)
            | Param::Args(name)
            | Param::Kwargs(name) => name,
        }
    }
}

/// A `def` or `lambda`
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub pos: Pos,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    /// Names bound anywhere in the body (parameters included)
    pub locals: BTreeSet<String>,
}

impl FunctionDef {
    pub fn new(name: impl Into<String>, pos: Pos, params: Vec<Param>, body: Vec<Stmt>) -> Self {
        let locals = crate::resolve::collect_locals(&params, &body);
        Self {
            name: name.into(),
            pos,
            params,
            body,
            locals,
        }
    }
}
