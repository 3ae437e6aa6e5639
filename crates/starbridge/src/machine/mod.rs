//! The machine: a reusable guest execution environment
//!
//! A `Machine` owns its configuration (globals, preloads, lazyloads, the
//! script, the print sink and conversion toggles) and the state built on
//! the first run: the guest thread, the predeclared environment and the
//! load cache. Runs and calls are serialized by the state mutex;
//! configuration sits behind its own lock and may change between runs.
//!
//! # Example
//!
//! ```no_run
//! use starbridge::{HostMap, HostValue, Machine};
//!
//! let mut globals = HostMap::new();
//! globals.insert("x".to_string(), HostValue::Int(9));
//! let machine = Machine::with_builtins(globals, &[] as &[&str], &["math"]);
//! let out = machine
//!     .run_script("load(\"math\", \"sqrt\")\nb = sqrt(x)\n", HostMap::new())
//!     .unwrap();
//! assert_eq!(out["b"], HostValue::Float(3.0));
//! ```

mod call;
#[cfg(feature = "repl")]
mod repl;
mod run;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use starbridge_vm::{Env, Options, PrintFn, Thread, Value};
use tracing::{debug, warn};

use crate::cache::{Cache, CacheConfig};
use crate::convert::{from_guest, map_to_guest, HostMap, HostValue};
use crate::error::{ConvertError, ExecError, UnknownModule};
use crate::fs::FileSystem;
use crate::loader::{make_builtin_loader_list, make_builtin_loader_map, NamedLoaderList, NamedLoaderMap};

/// Name given to inline scripts without one
pub const DEFAULT_SCRIPT_NAME: &str = "direct.star";

/// Where the next run takes its source from
#[derive(Clone)]
pub enum Script {
    Content { name: String, source: Vec<u8> },
    File { name: String, fs: Arc<dyn FileSystem> },
}

impl Script {
    pub fn name(&self) -> &str {
        match self {
            Script::Content { name, .. } | Script::File { name, .. } => name,
        }
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Script::Content { name, source } => f
                .debug_struct("Content")
                .field("name", name)
                .field("bytes", &source.len())
                .finish(),
            Script::File { name, fs } => f.debug_struct("File").field("name", name).field("fs", fs).finish(),
        }
    }
}

#[derive(Clone)]
struct Config {
    globals: HostMap,
    preloads: NamedLoaderList,
    lazyloads: NamedLoaderMap,
    script: Option<Script>,
    print: Option<PrintFn>,
    input_conversion: bool,
    output_conversion: bool,
    options: Options,
    /// Bumped whenever globals or preloads change
    version: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            globals: HostMap::new(),
            preloads: NamedLoaderList::new(),
            lazyloads: NamedLoaderMap::new(),
            script: None,
            print: None,
            input_conversion: true,
            output_conversion: true,
            options: Options::default(),
            version: 0,
        }
    }
}

impl Config {
    fn file_system(&self) -> Option<Arc<dyn FileSystem>> {
        match &self.script {
            Some(Script::File { fs, .. }) => Some(fs.clone()),
            _ => None,
        }
    }
}

/// State created by the first run and dropped by `reset`
struct Runtime {
    thread: Thread,
    predeclared: Env,
    /// Globals and preload exports, also the environment of loaded files
    base: Env,
    cache: Arc<Cache>,
    /// Config version `base` was built from
    version: u64,
}

/// A reusable guest execution environment
pub struct Machine {
    config: RwLock<Config>,
    state: Mutex<Option<Runtime>>,
    run_count: AtomicU64,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = self.config.read();
        f.debug_struct("Machine")
            .field("globals", &config.globals.len())
            .field("preloads", &config.preloads.names())
            .field("lazyloads", &config.lazyloads.names())
            .field("script", &config.script)
            .field("run_count", &self.run_count())
            .finish()
    }
}

impl Machine {
    pub fn new() -> Self {
        Self {
            config: RwLock::new(Config::default()),
            state: Mutex::new(None),
            run_count: AtomicU64::new(0),
        }
    }

    pub fn with_globals(globals: HostMap) -> Self {
        Self::with_loaders(globals, NamedLoaderList::new(), NamedLoaderMap::new())
    }

    pub fn with_loaders(globals: HostMap, preloads: NamedLoaderList, lazyloads: NamedLoaderMap) -> Self {
        let machine = Self::new();
        {
            let mut config = machine.config.write();
            config.globals = globals;
            config.preloads = preloads;
            config.lazyloads = lazyloads;
        }
        machine
    }

    /// Machine with builtin modules picked by name
    pub fn try_with_builtins<P, L>(globals: HostMap, preloads: &[P], lazyloads: &[L]) -> Result<Self, UnknownModule>
    where
        P: AsRef<str>,
        L: AsRef<str>,
    {
        Ok(Self::with_loaders(
            globals,
            make_builtin_loader_list(preloads)?,
            make_builtin_loader_map(lazyloads)?,
        ))
    }

    /// Like `try_with_builtins`
    ///
    /// # Panics
    /// Panics if any name is not a builtin module.
    pub fn with_builtins<P, L>(globals: HostMap, preloads: &[P], lazyloads: &[L]) -> Self
    where
        P: AsRef<str>,
        L: AsRef<str>,
    {
        match Self::try_with_builtins(globals, preloads, lazyloads) {
            Ok(machine) => machine,
            Err(err) => panic!("{err}"),
        }
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    pub fn globals(&self) -> HostMap {
        self.config.read().globals.clone()
    }

    pub fn set_globals(&self, globals: HostMap) {
        let mut config = self.config.write();
        config.globals = globals;
        config.version += 1;
    }

    pub fn add_globals(&self, globals: HostMap) {
        let mut config = self.config.write();
        config.globals.extend(globals);
        config.version += 1;
    }

    pub fn preloads(&self) -> NamedLoaderList {
        self.config.read().preloads.clone()
    }

    pub fn set_preloads(&self, preloads: NamedLoaderList) {
        let mut config = self.config.write();
        config.preloads = preloads;
        config.version += 1;
    }

    pub fn add_preloads(&self, preloads: &NamedLoaderList) {
        let mut config = self.config.write();
        config.preloads.extend(preloads);
        config.version += 1;
    }

    pub fn lazyloads(&self) -> NamedLoaderMap {
        self.config.read().lazyloads.clone()
    }

    pub fn set_lazyloads(&self, lazyloads: NamedLoaderMap) {
        self.config.write().lazyloads = lazyloads;
    }

    pub fn add_lazyloads(&self, lazyloads: &NamedLoaderMap) {
        self.config.write().lazyloads.merge(lazyloads);
    }

    /// Sink for guest `print`; `None` prints to stdout
    pub fn set_print_func(&self, print: Option<PrintFn>) {
        self.config.write().print = print;
    }

    pub fn enable_input_conversion(&self) {
        self.config.write().input_conversion = true;
    }

    pub fn disable_input_conversion(&self) {
        self.config.write().input_conversion = false;
    }

    pub fn enable_output_conversion(&self) {
        self.config.write().output_conversion = true;
    }

    pub fn disable_output_conversion(&self) {
        self.config.write().output_conversion = false;
    }

    pub fn options(&self) -> Options {
        self.config.read().options.clone()
    }

    pub fn set_options(&self, options: Options) {
        self.config.write().options = options;
    }

    pub fn script(&self) -> Option<Script> {
        self.config.read().script.clone()
    }

    pub fn set_script(&self, script: Script) {
        self.config.write().script = Some(script);
    }

    pub fn set_script_content(&self, name: impl Into<String>, source: impl Into<Vec<u8>>) {
        self.set_script(Script::Content {
            name: name.into(),
            source: source.into(),
        });
    }

    pub fn set_script_file(&self, name: impl Into<String>, fs: Arc<dyn FileSystem>) {
        self.set_script(Script::File { name: name.into(), fs });
    }

    /// Number of runs that completed without error
    pub fn run_count(&self) -> u64 {
        self.run_count.load(Ordering::Relaxed)
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Current predeclared environment as host values; bindings that do
    /// not convert are skipped
    pub fn export(&self) -> HostMap {
        let state = self.state.lock();
        let Some(runtime) = state.as_ref() else {
            return HostMap::new();
        };
        let mut out = HostMap::new();
        for (name, value) in &runtime.predeclared {
            match export_value(value) {
                Ok(v) => {
                    out.insert(name.clone(), v);
                }
                Err(err) => warn!(name = %name, error = %err, "skipping binding in export"),
            }
        }
        out
    }

    /// Drop the thread, the predeclared environment and the cache; the
    /// configuration is kept
    pub fn reset(&self) {
        let mut state = self.state.lock();
        if let Some(runtime) = state.take() {
            runtime.cache.reset();
        }
        debug!("machine reset");
    }
}

// ============================================================================
// Conversion helpers
// ============================================================================

/// Guest environment for `map`; without input conversion only guest values
/// are accepted
fn guest_env(map: &HostMap, convert: bool, action: &str) -> Result<Env, ExecError> {
    if convert {
        return map_to_guest(map).map_err(|e| ExecError::conversion(action, e));
    }
    map.iter()
        .map(|(name, value)| match value {
            HostValue::Guest(v) => Ok((name.clone(), v.clone())),
            other => Err(ExecError::conversion(
                action,
                ConvertError::NotGuest(format!("{name} ({})", other.kind())),
            )),
        })
        .collect()
}

/// Callables and modules have no host form and are passed through
fn export_value(value: &Value) -> Result<HostValue, ConvertError> {
    match value {
        Value::Function(_) | Value::Builtin(_) | Value::Module(_) => Ok(HostValue::Guest(value.clone())),
        other => from_guest(other),
    }
}

/// Host form of a run's bindings
fn host_env(env: &Env, convert: bool, action: &str) -> Result<HostMap, ExecError> {
    if !convert {
        return Ok(env.iter().map(|(k, v)| (k.clone(), HostValue::Guest(v.clone()))).collect());
    }
    env.iter()
        .map(|(k, v)| Ok((k.clone(), export_value(v)?)))
        .collect::<Result<_, ConvertError>>()
        .map_err(|e| ExecError::conversion(action, e))
}

fn new_thread(config: &Config, cache: &Arc<Cache>) -> Thread {
    let mut thread = Thread::with_options("machine", config.options.clone());
    thread.set_load(Some(cache.hook()));
    thread.set_print(config.print.clone());
    thread
}

fn cache_config(config: &Config, globals: Env) -> CacheConfig {
    CacheConfig {
        lazyloads: config.lazyloads.clone(),
        fs: config.file_system(),
        globals,
        options: config.options.clone(),
    }
}
