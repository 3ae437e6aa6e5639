//! Module loaders
//!
//! A loader is a zero-argument function producing a name to value
//! environment. Loaders are grouped into an ordered `NamedLoaderList`
//! (preloads, merged into the predeclared environment before a run) and a
//! keyed `NamedLoaderMap` (lazyloads, answered on `load()`).

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use starbridge_vm::{Env, LoadFn, Module, Value, VmError};
use tracing::trace;

use crate::error::UnknownModule;
use crate::stdlib;

type LoaderFn = dyn Fn() -> Result<Env, VmError> + Send + Sync;

/// A zero-argument environment producer
#[derive(Clone)]
pub struct ModuleLoader(Arc<LoaderFn>);

impl ModuleLoader {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> Result<Env, VmError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// A loader that always returns a copy of `env`
    pub fn from_env(env: Env) -> Self {
        Self::new(move || Ok(env.clone()))
    }

    pub fn load(&self) -> Result<Env, VmError> {
        (self.0)()
    }
}

impl fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ModuleLoader")
    }
}

/// What a loader produced: a single module wrapper, or plain members
#[derive(Debug, Clone)]
pub enum ModuleExports {
    Module { key: String, module: Arc<Module> },
    Members(Env),
}

impl ModuleExports {
    pub fn from_env(env: Env) -> Self {
        if env.len() == 1 {
            if let Some((key, Value::Module(module))) = env.first() {
                return ModuleExports::Module {
                    key: key.clone(),
                    module: module.clone(),
                };
            }
        }
        ModuleExports::Members(env)
    }

    /// Members of the module if it is named `expected`, otherwise the
    /// environment unchanged
    pub fn unwrap(self, expected: &str) -> Env {
        match self {
            ModuleExports::Module { key, module } => {
                if module.name == expected || key == expected {
                    module.members.clone()
                } else {
                    let mut env = Env::new();
                    env.insert(key, Value::Module(module));
                    env
                }
            }
            ModuleExports::Members(env) => env,
        }
    }
}

// ============================================================================
// Preloads
// ============================================================================

/// Ordered (name, loader) pairs
#[derive(Debug, Clone, Default)]
pub struct NamedLoaderList {
    entries: Vec<(String, ModuleLoader)>,
}

impl NamedLoaderList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, loader: ModuleLoader) {
        self.entries.push((name.into(), loader));
    }

    pub fn extend(&mut self, other: &NamedLoaderList) {
        self.entries.extend(other.entries.iter().cloned());
    }

    /// A new list holding `self` followed by `other`
    pub fn concat(&self, other: &NamedLoaderList) -> Self {
        let mut out = self.clone();
        out.extend(other);
        out
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Invoke every loader in order and merge its exports into `target`
    pub fn load_all(&self, target: &mut Env) -> Result<(), VmError> {
        for (name, loader) in &self.entries {
            let env = loader
                .load()
                .map_err(|e| VmError { message: format!("{name}: {}", e.message), ..e })?;
            trace!(module = %name, bindings = env.len(), "preloaded module");
            target.extend(ModuleExports::from_env(env).unwrap(name));
        }
        Ok(())
    }
}

impl FromIterator<(String, ModuleLoader)> for NamedLoaderList {
    fn from_iter<I: IntoIterator<Item = (String, ModuleLoader)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// Lazyloads
// ============================================================================

/// Module name to loader
#[derive(Debug, Clone, Default)]
pub struct NamedLoaderMap {
    entries: IndexMap<String, ModuleLoader>,
}

impl NamedLoaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, loader: ModuleLoader) {
        self.entries.insert(name.into(), loader);
    }

    /// Copy entries of `other` in, replacing existing names
    pub fn merge(&mut self, other: &NamedLoaderMap) {
        for (name, loader) in &other.entries {
            self.entries.insert(name.clone(), loader.clone());
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModuleLoader> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run the loader for `name`, if there is one
    pub fn resolve(&self, name: &str) -> Option<Result<Env, VmError>> {
        let loader = self.entries.get(name)?;
        Some(loader.load().map(|env| ModuleExports::from_env(env).unwrap(name)))
    }

    /// Engine-facing load hook over a snapshot of this map, for hosts that
    /// drive a bare `Thread` without a `Machine`. It neither caches nor
    /// detects cycles; machines go through `Cache`.
    pub fn get_lazy_loader(&self) -> LoadFn {
        let map = self.clone();
        Arc::new(move |_thread, name| {
            map.resolve(name)
                .unwrap_or_else(|| Err(VmError::runtime("module not found")))
        })
    }
}

impl FromIterator<(String, ModuleLoader)> for NamedLoaderMap {
    fn from_iter<I: IntoIterator<Item = (String, ModuleLoader)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// Builtin modules
// ============================================================================

fn builtin_loader(name: &str) -> Result<(String, ModuleLoader), UnknownModule> {
    stdlib::loader(name)
        .map(|loader| (name.to_string(), loader))
        .ok_or_else(|| UnknownModule(name.to_string()))
}

/// Preload list of builtin modules; fails on the first unknown name
pub fn make_builtin_loader_list<S: AsRef<str>>(names: &[S]) -> Result<NamedLoaderList, UnknownModule> {
    names.iter().map(|n| builtin_loader(n.as_ref())).collect()
}

/// Lazyload map of builtin modules; fails on the first unknown name
pub fn make_builtin_loader_map<S: AsRef<str>>(names: &[S]) -> Result<NamedLoaderMap, UnknownModule> {
    names.iter().map(|n| builtin_loader(n.as_ref())).collect()
}
