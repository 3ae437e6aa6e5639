//! Syntax errors reported by the layout pass, the grammar and the resolver

use crate::ast::Pos;
use thiserror::Error;

/// A syntax error with the source position it was detected at
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{filename}:{}:{}: {message}", .pos.line, .pos.col)]
pub struct SyntaxError {
    pub filename: String,
    pub pos: Pos,
    pub message: String,
}

impl SyntaxError {
    pub fn new(filename: impl Into<String>, pos: Pos, message: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            pos,
            message: message.into(),
        }
    }
}
