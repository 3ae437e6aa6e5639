//! Built-in function registry
//!
//! Collects native functions and constants under unique names and turns
//! them into an environment of guest values. Used for the universe and by
//! host crates assembling their own modules.

use std::collections::HashMap;

use crate::value::{Env, NativeFn, Value};

/// Metadata for a single registered entry
#[derive(Clone)]
pub struct BuiltinMetadata {
    pub name: String,
    pub value: Value,
}

/// Ordered registry of named built-ins
pub struct BuiltinRegistry {
    /// Name to index mapping
    pub name_to_id: HashMap<String, usize>,
    pub entries: Vec<BuiltinMetadata>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self {
            name_to_id: HashMap::new(),
            entries: Vec::new(),
        }
    }

    /// Register a native function
    ///
    /// # Panics
    /// Panics if the name is already registered.
    pub fn register(&mut self, name: &str, func: NativeFn) {
        self.constant(name, Value::builtin(name, func));
    }

    /// Register a non-function value
    ///
    /// # Panics
    /// Panics if the name is already registered.
    pub fn constant(&mut self, name: &str, value: Value) {
        if self.name_to_id.contains_key(name) {
            panic!("Built-in '{}' already registered", name);
        }
        self.name_to_id.insert(name.to_string(), self.entries.len());
        self.entries.push(BuiltinMetadata {
            name: name.to_string(),
            value,
        });
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.name_to_id.get(name).map(|&id| &self.entries[id].value)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered entries in registration order
    pub fn into_env(self) -> Env {
        self.entries.into_iter().map(|m| (m.name, m.value)).collect()
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}
