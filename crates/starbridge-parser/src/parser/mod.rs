//! Builds the AST from pest pairs.

mod expressions;
mod statements;

use pest::iterators::Pair;

use crate::ast::{Module, Pos};
use crate::error::SyntaxError;
use crate::layout::Layout;
use crate::pest_parser::Rule;

/// AST builder over one layout-normalised file
pub struct AstParser<'a> {
    filename: &'a str,
    layout: &'a Layout,
}

impl<'a> AstParser<'a> {
    pub fn new(filename: &'a str, layout: &'a Layout) -> Self {
        Self {
            filename,
            layout,
        }
    }

    pub(crate) fn pos(&self, pair: &Pair<Rule>) -> Pos {
        self.layout.position(pair.as_span().start())
    }

    pub(crate) fn error(&self, pair: &Pair<Rule>, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(self.filename, self.pos(pair), message)
    }

    pub(crate) fn missing(&self, pos: Pos, what: &str) -> SyntaxError {
        SyntaxError::new(self.filename, pos, format!("missing {what}"))
    }

    /// Error for a pair whose shape the grammar should have ruled out
    pub(crate) fn malformed(&self, pair: &Pair<Rule>, what: &str) -> SyntaxError {
        self.error(pair, format!("malformed {what}: {:?}", pair.as_rule()))
    }

    pub fn build_module(&mut self, pair: Pair<Rule>) -> Result<Module, SyntaxError> {
        let mut stmts = Vec::new();
        for inner in pair.into_inner() {
            if inner.as_rule() == Rule::EOI {
                break;
            }
            self.build_statement(inner, &mut stmts)?;
        }
        Ok(Module {
            filename: self.filename.to_string(),
            stmts,
        })
    }
}
