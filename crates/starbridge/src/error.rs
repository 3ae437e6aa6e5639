//! Error taxonomy of the embedding API
//!
//! Every failure returned to the host is an `ExecError` tagged with where
//! it came from and what the machine was doing at the time.

use std::any::Any;
use std::fmt;

use starbridge_vm::{ErrorKind, VmError};
use thiserror::Error;

/// Where a failure originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Misuse of the embedding API
    HostBridge,
    /// Parse, resolve or evaluation failure inside the engine
    Engine,
    /// Host/guest value marshalling
    Conversion,
    /// A recovered panic
    Panic,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Origin::HostBridge => "host-bridge",
            Origin::Engine => "engine",
            Origin::Conversion => "conversion",
            Origin::Panic => "panic",
        };
        f.write_str(name)
    }
}

/// Structured error returned by `Machine` operations
///
/// Renders as `origin: action: cause`, followed by the hint on its own
/// line when one is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecError {
    origin: Origin,
    action: String,
    cause: String,
    hint: Option<String>,
    kind: Option<ErrorKind>,
}

impl ExecError {
    pub fn new(origin: Origin, action: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            origin,
            action: action.into(),
            cause: cause.into(),
            hint: None,
            kind: None,
        }
    }

    pub fn bridge(action: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::new(Origin::HostBridge, action, cause)
    }

    /// Engine failure; the guest backtrace becomes the hint
    pub fn engine(action: impl Into<String>, err: VmError) -> Self {
        let hint = (!err.frames.is_empty()).then(|| err.backtrace());
        Self {
            origin: Origin::Engine,
            action: action.into(),
            cause: err.message,
            hint,
            kind: Some(err.kind),
        }
    }

    pub fn conversion(action: impl Into<String>, err: ConvertError) -> Self {
        Self::new(Origin::Conversion, action, err.to_string())
    }

    /// Recovered panic with its payload as the cause
    pub fn panic(action: impl Into<String>, payload: Box<dyn Any + Send>) -> Self {
        let cause = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        Self::new(Origin::Panic, action, cause)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn cause(&self) -> &str {
        &self.cause
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// Engine error kind, for engine-origin errors
    pub fn engine_kind(&self) -> Option<ErrorKind> {
        self.kind
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == Some(ErrorKind::Cancelled)
    }
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.origin, self.action, self.cause)?;
        if let Some(hint) = &self.hint {
            write!(f, "\n{hint}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ExecError {}

/// Host/guest marshalling failure
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("unsupported host value {value} of type {type_name}")]
    Unsupported { type_name: String, value: String },

    #[error("cannot convert guest value of type {0} to host")]
    UnknownKind(String),

    #[error("nil {0}")]
    NilWrapper(&'static str),

    #[error("integer {0} out of range")]
    IntOutOfRange(String),

    #[error("input conversion disabled: want a guest value, got {0}")]
    NotGuest(String),

    #[error("json: {0}")]
    Json(String),

    #[error("marshal {type_name}: {source}")]
    Marshal {
        type_name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Engine(#[from] VmError),
}

/// Reason a builtin module name could not be used
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown builtin module: {0}")]
pub struct UnknownModule(pub String);

impl From<UnknownModule> for ExecError {
    fn from(err: UnknownModule) -> Self {
        ExecError::bridge("load builtins", err.to_string())
    }
}
