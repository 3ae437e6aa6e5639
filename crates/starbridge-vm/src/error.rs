//! Error types for the engine

use std::fmt;

use starbridge_parser::{Pos, SyntaxError};
use thiserror::Error;

use crate::value::Value;

/// Broad category of an engine failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Source failed to parse or resolve
    Syntax,
    /// Failure while executing guest code
    Runtime,
    /// Execution stopped by a cancellation request
    Cancelled,
    /// The guest asked to exit with this code
    Exit(u8),
}

/// One entry of a guest backtrace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub file: String,
    pub pos: Pos,
    pub function: String,
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pos.line == 0 {
            write!(f, "{}: in {}", self.file, self.function)
        } else {
            write!(f, "{}:{}: in {}", self.file, self.pos, self.function)
        }
    }
}

/// Engine error with the guest call stack captured where it was raised
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct VmError {
    pub kind: ErrorKind,
    pub message: String,
    /// Outermost frame first
    pub frames: Vec<Frame>,
}

impl VmError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            frames: Vec::new(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, message)
    }

    pub fn cancelled(reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::Cancelled,
            format!("Starlark computation cancelled: {reason}"),
        )
    }

    /// Sentinel raised by `exit(code)`
    pub fn exit(code: u8) -> Self {
        Self::new(ErrorKind::Exit(code), format!("exit code: {code}"))
    }

    /// `fname: for parameter param: got T, want want`
    pub fn arg_type(fname: &str, param: &str, want: &str, got: &Value) -> Self {
        Self::runtime(format!(
            "{fname}: for parameter {param}: got {}, want {want}",
            got.type_name()
        ))
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }

    pub fn is_exit(&self) -> bool {
        self.exit_code().is_some()
    }

    /// Code carried by the exit sentinel, whichever thread raised it
    pub fn exit_code(&self) -> Option<u8> {
        match self.kind {
            ErrorKind::Exit(code) => Some(code),
            _ => None,
        }
    }

    /// Render the guest call stack, most recent call last
    pub fn backtrace(&self) -> String {
        let mut out = String::from("Traceback (most recent call last):\n");
        for frame in &self.frames {
            out.push_str("  ");
            out.push_str(&frame.to_string());
            out.push('\n');
        }
        out.push_str("Error: ");
        out.push_str(&self.message);
        out
    }
}

impl From<SyntaxError> for VmError {
    fn from(err: SyntaxError) -> Self {
        let frame = Frame {
            file: err.filename.clone(),
            pos: err.pos,
            function: "<toplevel>".to_string(),
        };
        Self {
            kind: ErrorKind::Syntax,
            message: err.to_string(),
            frames: vec![frame],
        }
    }
}
