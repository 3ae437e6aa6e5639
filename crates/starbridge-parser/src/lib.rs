pub mod ast;
pub mod error;
pub mod layout;
pub mod parser;
pub mod pest_parser;
pub mod resolve;

// Re-export commonly used items
pub use ast::{Arg, BinOp, Clause, Expr, ExprKind, FunctionDef, LoadBinding, Module, Param, Pos, Stmt, StmtKind, UnaryOp};
pub use error::SyntaxError;
pub use pest_parser::parse;
