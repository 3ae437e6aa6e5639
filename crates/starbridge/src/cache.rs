//! Load and compile cache
//!
//! Resolves `load(module)` at most once per module name. Concurrent
//! requests for a module that is being resolved wait on the entry's
//! condvar; a request that would wait on itself, directly or through other
//! waiting requests, fails with a cycle error instead.
//!
//! Every load request belongs to a chain: the top-level `load` starts a new
//! one, and modules evaluated from source inherit it through the child
//! thread's locals.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex, RwLock};
use starbridge_vm::{compile, Env, LoadFn, Options, Program, Thread, VmError};
use tracing::{debug, trace};

use crate::fs::FileSystem;
use crate::loader::NamedLoaderMap;

/// Thread-local key holding the `LoadChain` of a module being evaluated
const LOAD_CHAIN_LOCAL: &str = "load_chain";

const WAIT_TICK: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
struct LoadChain {
    id: u64,
    modules: Vec<String>,
}

#[derive(Debug)]
enum EntryState {
    InProgress,
    Ready(Env),
    Failed(VmError),
}

#[derive(Debug)]
struct Entry {
    /// Chain that is resolving this entry
    owner: u64,
    state: Mutex<EntryState>,
    done: Condvar,
}

impl Entry {
    fn finish(&self, state: EntryState) {
        *self.state.lock() = state;
        self.done.notify_all();
    }
}

#[derive(Debug, Default)]
struct Entries {
    by_name: HashMap<String, Arc<Entry>>,
    /// Chain id to the module it is waiting for
    waits_for: HashMap<u64, String>,
}

/// Resolver configuration, refreshed by the machine before every run
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    pub lazyloads: NamedLoaderMap,
    pub fs: Option<Arc<dyn FileSystem>>,
    /// Predeclared environment for modules evaluated from source
    pub globals: Env,
    pub options: Options,
}

#[derive(Debug, Default)]
pub struct Cache {
    entries: Mutex<Entries>,
    programs: Mutex<HashMap<String, Program>>,
    config: RwLock<CacheConfig>,
    next_chain: AtomicU64,
}

impl Cache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config: RwLock::new(config),
            ..Self::default()
        }
    }

    pub fn configure(&self, config: CacheConfig) {
        *self.config.write() = config;
    }

    /// Engine load hook backed by this cache
    pub fn hook(self: &Arc<Self>) -> LoadFn {
        let cache = Arc::clone(self);
        Arc::new(move |thread, module| cache.load(thread, module))
    }

    /// Drop every resolved module and compiled program
    pub fn reset(&self) {
        self.entries.lock().by_name.clear();
        self.programs.lock().clear();
        debug!("load cache reset");
    }

    /// Drop one module and its compiled program
    pub fn forget(&self, name: &str) {
        self.entries.lock().by_name.remove(name);
        self.programs.lock().remove(name);
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        let entry = self.entries.lock().by_name.get(name).cloned();
        entry.is_some_and(|e| matches!(*e.state.lock(), EntryState::Ready(_)))
    }

    // ========================================================================
    // Compiled programs
    // ========================================================================

    /// Compiled program for `name`, read from `fs` on first use
    pub fn program(&self, name: &str, fs: &dyn FileSystem) -> Result<Program, VmError> {
        if let Some(program) = self.programs.lock().get(name) {
            trace!(filename = name, "compiled program cache hit");
            return Ok(program.clone());
        }
        let bytes = fs
            .read_all(name)
            .map_err(|e| VmError::runtime(format!("cannot read {name}: {e}")))?;
        let source =
            String::from_utf8(bytes).map_err(|_| VmError::runtime(format!("{name}: source is not valid UTF-8")))?;
        let program = compile(name, &source)?;
        self.programs.lock().insert(name.to_string(), program.clone());
        Ok(program)
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Resolve `module` on behalf of `thread`
    pub fn load(&self, thread: &mut Thread, module: &str) -> Result<Env, VmError> {
        let chain = thread.local::<LoadChain>(LOAD_CHAIN_LOCAL).cloned().unwrap_or_else(|| LoadChain {
            id: self.next_chain.fetch_add(1, Ordering::Relaxed),
            modules: Vec::new(),
        });
        if chain.modules.iter().any(|m| m == module) {
            return Err(cycle_error(&chain.modules, module));
        }

        let (entry, created) = {
            let mut entries = self.entries.lock();
            match entries.by_name.get(module) {
                Some(entry) => {
                    let entry = entry.clone();
                    if matches!(*entry.state.lock(), EntryState::InProgress) {
                        if let Some(path) = find_cycle(&entries, chain.id, entry.owner) {
                            return Err(cycle_error(&path, module));
                        }
                        entries.waits_for.insert(chain.id, module.to_string());
                    }
                    (entry, false)
                }
                None => {
                    let entry = Arc::new(Entry {
                        owner: chain.id,
                        state: Mutex::new(EntryState::InProgress),
                        done: Condvar::new(),
                    });
                    entries.by_name.insert(module.to_string(), entry.clone());
                    (entry, true)
                }
            }
        };

        if created {
            return self.resolve(thread, &entry, module, chain);
        }
        let result = self.wait(thread, &entry);
        self.entries.lock().waits_for.remove(&chain.id);
        trace!(module, "load cache hit");
        result
    }

    fn wait(&self, thread: &Thread, entry: &Entry) -> Result<Env, VmError> {
        let mut state = entry.state.lock();
        loop {
            match &*state {
                EntryState::Ready(env) => return Ok(env.clone()),
                EntryState::Failed(err) => return Err(err.clone()),
                EntryState::InProgress => {
                    thread.check_cancelled()?;
                    entry.done.wait_for(&mut state, WAIT_TICK);
                }
            }
        }
    }

    fn resolve(&self, thread: &Thread, entry: &Entry, module: &str, chain: LoadChain) -> Result<Env, VmError> {
        debug!(module, chain = chain.id, "resolving module");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.resolve_uncached(thread, module, chain)))
            .unwrap_or_else(|payload| {
                Err(VmError::runtime(format!(
                    "loader panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });
        match &outcome {
            Ok(env) => entry.finish(EntryState::Ready(env.clone())),
            Err(err) => {
                // Cancelled and exited loads are retried by the next request
                if err.is_cancelled() || err.is_exit() {
                    self.entries.lock().by_name.remove(module);
                }
                debug!(module, error = %err.message, "module failed to load");
                entry.finish(EntryState::Failed(err.clone()));
            }
        }
        outcome
    }

    /// Lazyloads first, then the source file of the same name
    fn resolve_uncached(&self, thread: &Thread, module: &str, mut chain: LoadChain) -> Result<Env, VmError> {
        let config = self.config.read().clone();
        if let Some(result) = config.lazyloads.resolve(module) {
            return result;
        }
        let Some(fs) = config.fs else {
            return Err(VmError::runtime("module not found"));
        };
        let program = self.program(module, fs.as_ref())?;

        chain.modules.push(module.to_string());
        let mut child = thread.child(module);
        child.set_options(config.options);
        child.set_local(LOAD_CHAIN_LOCAL, chain);
        program.init(&mut child, &config.globals)
    }
}

/// Follow waiting chains from `owner`; a path back to `requester` is a cycle
fn find_cycle(entries: &Entries, requester: u64, owner: u64) -> Option<Vec<String>> {
    let mut path = Vec::new();
    let mut current = owner;
    loop {
        if current == requester {
            return Some(path);
        }
        let module = entries.waits_for.get(&current)?;
        path.push(module.clone());
        current = entries.by_name.get(module)?.owner;
        if path.len() > entries.by_name.len() {
            return None;
        }
    }
}

fn cycle_error(chain: &[String], module: &str) -> VmError {
    let mut names: Vec<&str> = chain.iter().map(String::as_str).collect();
    if let Some(start) = names.iter().position(|m| *m == module) {
        names.drain(..start);
    } else {
        names.insert(0, module);
    }
    names.push(module);
    VmError::runtime(format!("cycle in load graph: {}", names.join(" -> ")))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemFs;
    use crate::loader::ModuleLoader;
    use starbridge_vm::Value;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn env_of(name: &str, value: i64) -> Env {
        let mut env = Env::new();
        env.insert(name.to_string(), Value::Int(value));
        env
    }

    fn cache_with_fs(fs: MemFs) -> Arc<Cache> {
        Arc::new(Cache::new(CacheConfig {
            fs: Some(Arc::new(fs)),
            ..CacheConfig::default()
        }))
    }

    fn main_thread(cache: &Arc<Cache>) -> Thread {
        let mut thread = Thread::new("main");
        thread.set_load(Some(cache.hook()));
        thread
    }

    #[test]
    fn test_lazyload_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut lazyloads = NamedLoaderMap::new();
        lazyloads.insert(
            "m",
            ModuleLoader::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(env_of("x", 1))
            }),
        );
        let cache = Arc::new(Cache::new(CacheConfig {
            lazyloads,
            ..CacheConfig::default()
        }));
        let mut thread = main_thread(&cache);
        for _ in 0..3 {
            let env = cache.load(&mut thread, "m").unwrap();
            assert_eq!(env.get("x"), Some(&Value::Int(1)));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_loaded("m"));

        cache.forget("m");
        cache.load(&mut thread, "m").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_parallel_requests_share_one_resolution() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut lazyloads = NamedLoaderMap::new();
        lazyloads.insert(
            "slow",
            ModuleLoader::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(50));
                Ok(env_of("v", 7))
            }),
        );
        let cache = Arc::new(Cache::new(CacheConfig {
            lazyloads,
            ..CacheConfig::default()
        }));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                thread::spawn(move || {
                    let mut thread = main_thread(&cache);
                    cache.load(&mut thread, "slow").unwrap()
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap().get("v"), Some(&Value::Int(7)));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_is_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut lazyloads = NamedLoaderMap::new();
        lazyloads.insert(
            "bad",
            ModuleLoader::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(VmError::runtime("broken"))
            }),
        );
        let cache = Arc::new(Cache::new(CacheConfig {
            lazyloads,
            ..CacheConfig::default()
        }));
        let mut thread = main_thread(&cache);
        assert_eq!(cache.load(&mut thread, "bad").unwrap_err().message, "broken");
        assert_eq!(cache.load(&mut thread, "bad").unwrap_err().message, "broken");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_exited_load_is_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut lazyloads = NamedLoaderMap::new();
        lazyloads.insert(
            "quits",
            ModuleLoader::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(VmError::exit(3))
            }),
        );
        let cache = Arc::new(Cache::new(CacheConfig {
            lazyloads,
            ..CacheConfig::default()
        }));
        let mut thread = main_thread(&cache);
        for _ in 0..2 {
            let err = cache.load(&mut thread, "quits").unwrap_err();
            assert_eq!(err.exit_code(), Some(3));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!cache.is_loaded("quits"));
    }

    #[test]
    fn test_loads_source_files() {
        let fs = MemFs::new()
            .with_file("lib.star", "def double(n):\n    return n * 2\n")
            .with_file("app.star", "load(\"lib.star\", \"double\")\nanswer = double(21)\n");
        let cache = cache_with_fs(fs);
        let mut thread = main_thread(&cache);
        let env = cache.load(&mut thread, "app.star").unwrap();
        assert_eq!(env.get("answer"), Some(&Value::Int(42)));
        assert!(cache.is_loaded("lib.star"));
    }

    #[test]
    fn test_cycle_is_reported() {
        let fs = MemFs::new()
            .with_file("a.star", "load(\"b.star\", \"b\")\na = 1\n")
            .with_file("b.star", "load(\"a.star\", \"a\")\nb = 2\n");
        let cache = cache_with_fs(fs);
        let mut thread = main_thread(&cache);
        let err = cache.load(&mut thread, "a.star").unwrap_err();
        assert!(
            err.message.contains("cycle in load graph: a.star -> b.star -> a.star"),
            "{}",
            err.message
        );
    }

    #[test]
    fn test_self_load_is_a_cycle() {
        let fs = MemFs::new().with_file("self.star", "load(\"self.star\", \"x\")\nx = 1\n");
        let cache = cache_with_fs(fs);
        let mut thread = main_thread(&cache);
        let err = cache.load(&mut thread, "self.star").unwrap_err();
        assert!(err.message.contains("cycle in load graph: self.star -> self.star"));
    }

    #[test]
    fn test_missing_module() {
        let cache = cache_with_fs(MemFs::new());
        let mut thread = main_thread(&cache);
        let err = cache.load(&mut thread, "nope.star").unwrap_err();
        assert!(err.message.starts_with("cannot read nope.star"));

        let cache = Arc::new(Cache::default());
        let mut thread = main_thread(&cache);
        let err = cache.load(&mut thread, "nope").unwrap_err();
        assert_eq!(err.message, "module not found");
    }

    #[test]
    fn test_program_cache_and_reset() {
        let fs = MemFs::new().with_file("p.star", "x = 1\n");
        let cache = Cache::default();
        let first = cache.program("p.star", &fs).unwrap();
        fs.insert("p.star", "x = 2\n");
        let second = cache.program("p.star", &fs).unwrap();
        assert_eq!(first.globals(), second.globals());
        fs.remove("p.star");
        assert!(cache.program("p.star", &fs).is_ok());
        cache.reset();
        assert!(cache.program("p.star", &fs).is_err());
    }

    #[test]
    fn test_panicking_loader_fails_cleanly() {
        let mut lazyloads = NamedLoaderMap::new();
        lazyloads.insert("p", ModuleLoader::new(|| panic!("kaboom")));
        let cache = Arc::new(Cache::new(CacheConfig {
            lazyloads,
            ..CacheConfig::default()
        }));
        let mut thread = main_thread(&cache);
        let err = cache.load(&mut thread, "p").unwrap_err();
        assert_eq!(err.message, "loader panicked: kaboom");
    }
}
