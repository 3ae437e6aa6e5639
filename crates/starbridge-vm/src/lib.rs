//! Starbridge guest engine
//!
//! This crate executes the guest language: a small, Python-like,
//! statically scoped configuration language with `load()` for imports.
//!
//! # Architecture
//!
//! The engine is a tree-walking interpreter over the AST produced by
//! `starbridge-parser`:
//! - Values are `Send + Sync`; mutable containers carry their own lock and
//!   a frozen flag
//! - A `Thread` holds per-run state: hooks, thread-locals, the call stack
//!   and a cancellation flag that other OS threads may set
//! - A `Program` is a compiled file that can be initialised repeatedly
//!
//! # Modules
//!
//! - `value`: runtime value model and the `Object` trait for host types
//! - `thread`: execution thread, hooks and thread-locals
//! - `cancel`: host cancellation token and the engine cancel flag
//! - `vm`: the interpreter and `call`
//! - `program`: `compile` and module initialisation
//! - `builtins`: the universe and methods of built-in types
//! - `error`: engine error type with guest backtraces

#![allow(clippy::result_large_err)]

pub mod builtins;
pub mod cancel;
pub mod error;
pub mod options;
pub mod program;
pub mod thread;
pub mod value;
pub mod vm;

// Re-export main types
pub use cancel::{CancelHandle, CancelReason, CancellationToken};
pub use error::{ErrorKind, Frame, VmError};
pub use options::Options;
pub use program::{compile, Program};
pub use thread::{LoadFn, PrintFn, Thread, CONTEXT_LOCAL, EXIT_CODE_LOCAL};
pub use value::{Args, Builtin, Dict, Env, List, Module, NativeFn, NativeMethod, Object, Set, Struct, Value};
pub use vm::call;
