use pest::error::InputLocation;
use pest::Parser;
use pest_derive::Parser;

use crate::ast::Module;
use crate::error::SyntaxError;
use crate::layout::{self, Layout, DEDENT, INDENT};
use crate::parser::AstParser;
use crate::resolve;

#[derive(Parser)]
#[grammar = "grammar.pest"]
pub struct StarParser;

/// Parse and check a source file
pub fn parse(filename: &str, source: &str) -> Result<Module, SyntaxError> {
    let layout = layout::layout(filename, source)?;
    let mut pairs =
        StarParser::parse(Rule::file, &layout.text).map_err(|e| grammar_error(filename, &layout, &e))?;
    let file = pairs
        .next()
        .ok_or_else(|| SyntaxError::new(filename, Default::default(), "empty parse tree"))?;

    let mut builder = AstParser::new(filename, &layout);
    let module = builder.build_module(file)?;
    resolve::check_module(&module)?;
    Ok(module)
}

fn grammar_error(filename: &str, layout: &Layout, err: &pest::error::Error<Rule>) -> SyntaxError {
    let offset = match err.location {
        InputLocation::Pos(pos) => pos,
        InputLocation::Span((start, _)) => start,
    };
    let rest = layout.text.get(offset..).unwrap_or("");
    let message = match rest.chars().next() {
        None => "unexpected end of file".to_string(),
        Some('\n') => "unexpected newline".to_string(),
        Some(INDENT) => "unexpected indent".to_string(),
        Some(DEDENT) => "unexpected end of block".to_string(),
        Some('"') | Some('\'') => "unexpected string".to_string(),
        Some(c) if c.is_ascii_alphanumeric() || c == '_' => {
            let word: String = rest
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                .collect();
            format!("unexpected {word:?}")
        }
        Some(c) => format!("unexpected {:?}", c.to_string()),
    };
    SyntaxError::new(filename, layout.position(offset), format!("syntax error: {message}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinOp, ExprKind, StmtKind};

    #[test]
    fn test_parse_assignment() {
        let module = parse("t.star", "x = 1 + 2 * 3\n").unwrap();
        assert_eq!(module.stmts.len(), 1);
        let StmtKind::Assign { value, op, .. } = &module.stmts[0].kind else {
            panic!("expected assignment");
        };
        assert!(op.is_none());
        let ExprKind::Binary { op, rhs, .. } = &value.kind else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinOp::Add);
        assert!(matches!(rhs.kind, ExprKind::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn test_nested_blocks_and_bracket_continuation() {
        let source = "def f(a):\n    if a:\n        return [\n            1,\n            2,\n        ]\n    return []\nx = 1\n";
        let module = parse("t.star", source).unwrap();
        assert_eq!(module.stmts.len(), 2);
        let StmtKind::Def(def) = &module.stmts[0].kind else {
            panic!("expected def");
        };
        assert_eq!(def.body.len(), 2);
        let StmtKind::If { then, otherwise, .. } = &def.body[0].kind else {
            panic!("expected if");
        };
        assert_eq!(then.len(), 1);
        assert!(otherwise.is_empty());
    }

    #[test]
    fn test_error_position() {
        let err = parse("t.star", "x = 1\ny = = 2\n").unwrap_err();
        assert_eq!(err.pos.line, 2);
        assert!(err.message.starts_with("syntax error"), "{}", err.message);
    }

    #[test]
    fn test_unexpected_eof() {
        let err = parse("t.star", "x = (1 +").unwrap_err();
        assert_eq!(err.filename, "t.star");
    }
}
