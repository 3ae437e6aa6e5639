//! Layout pass for significant indentation.
//!
//! The grammar cannot track an indentation stack, so before parsing the
//! source is normalised:
//!
//! - the first token of a line that opens a block is prefixed with `INDENT`,
//!   lines that close blocks get one `DEDENT` per closed level;
//! - newlines inside brackets become `CONTINUATION` (plain whitespace for the
//!   grammar), as do backslash line continuations;
//! - comments are blanked out.
//!
//! Every rewrite keeps byte lengths except marker insertion, and marker
//! offsets are recorded so grammar positions map back to the original source.

use crate::ast::Pos;
use crate::error::SyntaxError;

pub const INDENT: char = '\u{2}';
pub const DEDENT: char = '\u{3}';
pub const CONTINUATION: char = '\u{1}';

/// Normalised source plus the data needed to map positions back
#[derive(Debug, Clone)]
pub struct Layout {
    pub text: String,
    /// Output offsets of inserted markers, ascending
    markers: Vec<usize>,
    /// Byte offsets of line starts in the original source
    line_starts: Vec<usize>,
}

impl Layout {
    /// Map an offset in `text` back to the original source
    pub fn source_offset(&self, offset: usize) -> usize {
        let inserted = self.markers.partition_point(|&m| m < offset);
        offset - inserted
    }

    /// Line/column of an offset in `text`
    pub fn position(&self, offset: usize) -> Pos {
        position_in(&self.line_starts, self.source_offset(offset))
    }
}

fn line_starts(source: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(source.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

fn position_in(line_starts: &[usize], offset: usize) -> Pos {
    let line = line_starts.partition_point(|&s| s <= offset).max(1);
    let col = offset - line_starts[line - 1] + 1;
    Pos::new(line as u32, col as u32)
}

/// Indentation stack in the style of a Python tokenizer
#[derive(Debug)]
struct IndentStack {
    stack: Vec<usize>,
}

enum IndentChange {
    Same,
    Indent,
    Dedent(usize),
}

impl IndentStack {
    fn new() -> Self {
        Self { stack: vec![0] }
    }

    fn current(&self) -> usize {
        self.stack.last().copied().unwrap_or(0)
    }

    fn process(&mut self, width: usize) -> Result<IndentChange, &'static str> {
        let current = self.current();
        if width > current {
            self.stack.push(width);
            return Ok(IndentChange::Indent);
        }
        if width == current {
            return Ok(IndentChange::Same);
        }
        let mut closed = 0;
        while self.current() > width {
            self.stack.pop();
            closed += 1;
        }
        if self.current() != width {
            return Err("unindent does not match any outer indentation level");
        }
        Ok(IndentChange::Dedent(closed))
    }

    /// Number of levels still open (excluding the base level)
    fn open_levels(&self) -> usize {
        self.stack.len().saturating_sub(1)
    }
}

struct LayoutBuilder<'a> {
    filename: &'a str,
    source: &'a str,
    line_starts: Vec<usize>,
    out: String,
    markers: Vec<usize>,
    indents: IndentStack,
    depth: usize,
    /// Last non-whitespace char of the current logical line
    last_significant: Option<char>,
    /// Whether the previous non-blank logical line ended with `:`
    opens_block: bool,
}

impl<'a> LayoutBuilder<'a> {
    fn error(&self, offset: usize, message: &str) -> SyntaxError {
        SyntaxError::new(
            self.filename,
            position_in(&self.line_starts, offset),
            message,
        )
    }

    fn marker(&mut self, marker: char) {
        self.markers.push(self.out.len());
        self.out.push(marker);
    }

    /// Blank `len` bytes of source with spaces
    fn blank(&mut self, len: usize) {
        self.out.extend(std::iter::repeat(' ').take(len));
    }

    /// Handle the indentation of a new logical line starting at `start`.
    /// Returns the offset of the first non-indent byte.
    fn line_start(&mut self, start: usize) -> Result<usize, SyntaxError> {
        let bytes = self.source.as_bytes();
        let mut i = start;
        let mut width = 0;
        while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
            width = if bytes[i] == b'\t' { (width / 8 + 1) * 8 } else { width + 1 };
            i += 1;
        }
        self.out.push_str(&self.source[start..i]);

        // Blank and comment-only lines do not affect indentation
        if i >= bytes.len() || matches!(bytes[i], b'\n' | b'\r' | b'#') {
            return Ok(i);
        }

        match self.indents.process(width) {
            Ok(IndentChange::Indent) => {
                if !self.opens_block {
                    return Err(self.error(i, "unexpected indent"));
                }
                self.marker(INDENT);
            }
            Ok(IndentChange::Dedent(levels)) => {
                if self.opens_block {
                    return Err(self.error(i, "expected an indented block"));
                }
                for _ in 0..levels {
                    self.marker(DEDENT);
                }
            }
            Ok(IndentChange::Same) => {
                if self.opens_block {
                    return Err(self.error(i, "expected an indented block"));
                }
            }
            Err(message) => return Err(self.error(i, message)),
        }
        self.last_significant = None;
        Ok(i)
    }

    /// Copy a string literal starting at the quote at `start`.
    /// Returns the offset just past the closing quote.
    fn string_literal(&mut self, start: usize) -> Result<usize, SyntaxError> {
        let bytes = self.source.as_bytes();
        let quote = bytes[start];
        let triple = bytes.len() >= start + 3 && bytes[start + 1] == quote && bytes[start + 2] == quote;
        let mut i = if triple { start + 3 } else { start + 1 };

        loop {
            if i >= bytes.len() {
                return Err(self.error(start, "unterminated string literal"));
            }
            match bytes[i] {
                b'\\' => i += 2,
                b'\n' if !triple => {
                    return Err(self.error(start, "unterminated string literal"));
                }
                b if b == quote => {
                    if !triple {
                        i += 1;
                        break;
                    }
                    if bytes.len() >= i + 3 && bytes[i + 1] == quote && bytes[i + 2] == quote {
                        i += 3;
                        break;
                    }
                    i += 1;
                }
                _ => i += 1,
            }
        }

        let end = i.min(bytes.len());
        self.out.push_str(&self.source[start..end]);
        Ok(end)
    }

    fn end_logical_line(&mut self) {
        if self.last_significant.is_some() {
            self.opens_block = self.last_significant == Some(':');
        }
        self.last_significant = None;
    }

    fn run(mut self) -> Result<Layout, SyntaxError> {
        let bytes = self.source.as_bytes();
        let mut i = 0;
        let mut at_line_start = true;

        while i < bytes.len() {
            if at_line_start && self.depth == 0 {
                i = self.line_start(i)?;
                at_line_start = false;
                continue;
            }

            let ch = match self.source[i..].chars().next() {
                Some(ch) => ch,
                None => break,
            };
            match ch {
                '#' => {
                    let end = self.source[i..].find('\n').map_or(bytes.len(), |n| i + n);
                    self.blank(end - i);
                    i = end;
                }
                '"' | '\'' => {
                    i = self.string_literal(i)?;
                    self.last_significant = Some(ch);
                }
                '(' | '[' | '{' => {
                    self.depth += 1;
                    self.out.push(ch);
                    self.last_significant = Some(ch);
                    i += 1;
                }
                ')' | ']' | '}' => {
                    self.depth = self.depth.saturating_sub(1);
                    self.out.push(ch);
                    self.last_significant = Some(ch);
                    i += 1;
                }
                '\\' if bytes.get(i + 1) == Some(&b'\n') => {
                    self.blank(2);
                    i += 2;
                }
                '\\' if bytes.get(i + 1) == Some(&b'\r') && bytes.get(i + 2) == Some(&b'\n') => {
                    self.blank(3);
                    i += 3;
                }
                '\n' => {
                    if self.depth > 0 {
                        self.out.push(CONTINUATION);
                    } else {
                        self.out.push('\n');
                        self.end_logical_line();
                        at_line_start = true;
                    }
                    i += 1;
                }
                _ => {
                    self.out.push(ch);
                    if !ch.is_whitespace() {
                        self.last_significant = Some(ch);
                    }
                    i += ch.len_utf8();
                }
            }
        }

        if self.depth > 0 {
            return Err(self.error(bytes.len(), "unexpected end of file inside brackets"));
        }
        if self.last_significant.is_some() || !self.out.ends_with('\n') {
            self.out.push('\n');
            self.end_logical_line();
        }
        if self.opens_block {
            return Err(self.error(bytes.len(), "expected an indented block"));
        }
        for _ in 0..self.indents.open_levels() {
            self.marker(DEDENT);
        }

        Ok(Layout {
            text: self.out,
            markers: self.markers,
            line_starts: self.line_starts,
        })
    }
}

/// Normalise `source` for the grammar
pub fn layout(filename: &str, source: &str) -> Result<Layout, SyntaxError> {
    if let Some(offset) = source.find([INDENT, DEDENT, CONTINUATION]) {
        let starts = line_starts(source);
        return Err(SyntaxError::new(
            filename,
            position_in(&starts, offset),
            "invalid control character in source",
        ));
    }
    let builder = LayoutBuilder {
        filename,
        source,
        line_starts: line_starts(source),
        out: String::with_capacity(source.len() + 16),
        markers: Vec::new(),
        indents: IndentStack::new(),
        depth: 0,
        last_significant: None,
        opens_block: false,
    };
    builder.run()
}
