//! Starbridge embedding runtime
//!
//! This crate runs guest scripts inside a host program. It wraps the
//! `starbridge-vm` engine with everything a host needs around it.
//!
//! # Architecture
//!
//! - A `Machine` owns configuration and, after the first run, a guest
//!   thread plus the predeclared environment that accumulates across runs
//! - Modules come from loaders: *preloads* are injected before a script
//!   runs, *lazyloads* resolve on the first `load()` of their name
//! - A per-machine `Cache` memoizes module resolution and compiled
//!   programs, detects `load()` cycles and serializes concurrent loads
//! - `convert` bridges host values and guest values, including JSON
//! - Every host-facing failure is an `ExecError` tagged with its origin
//!
//! # Modules
//!
//! - `machine`: the `Machine` and its run/call/REPL entry points
//! - `loader`: loader lists and maps, builtin loader construction
//! - `cache`: load and compile cache
//! - `convert`: value bridge and `SharedDict`
//! - `fs`: file providers for scripts and loaded sources
//! - `stdlib`: the builtin module registry
//! - `error`: `ExecError`, `ConvertError`, `UnknownModule`

#![allow(clippy::result_large_err)]

pub mod cache;
pub mod convert;
pub mod error;
pub mod fs;
pub mod loader;
pub mod machine;
pub mod stdlib;

// Re-export main types
pub use cache::{Cache, CacheConfig};
pub use convert::{
    from_guest, is_empty_string, map_from_guest, map_to_guest, marshal_json, to_guest, unmarshal_json, HostMap,
    HostValue, HostWrapper, MarshalGuest, SharedDict, WrapperKind,
};
pub use error::{ConvertError, ExecError, Origin, UnknownModule};
pub use fs::{DirFs, FileSystem, MemFs};
pub use loader::{make_builtin_loader_list, make_builtin_loader_map, ModuleLoader, NamedLoaderList, NamedLoaderMap};
pub use machine::{Machine, Script, DEFAULT_SCRIPT_NAME};

pub use starbridge_vm::{CancelReason, CancellationToken, Env, Options, PrintFn, Value, VmError};
