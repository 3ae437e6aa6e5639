use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;

use crate::error::VmError;
use crate::value::{HashKey, Value};

/// Insertion-ordered, freezable dict
#[derive(Debug, Default)]
pub struct Dict {
    entries: RwLock<IndexMap<HashKey, (Value, Value)>>,
    frozen: AtomicBool,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from key/value pairs; later duplicates win
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Value, Value)>) -> Result<Self, VmError> {
        let mut entries = IndexMap::new();
        for (k, v) in pairs {
            entries.insert(k.hash_key()?, (k, v));
        }
        Ok(Self {
            entries: RwLock::new(entries),
            frozen: AtomicBool::new(false),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &Value) -> Result<Option<Value>, VmError> {
        let hk = key.hash_key()?;
        Ok(self.entries.read().get(&hk).map(|(_, v)| v.clone()))
    }

    pub fn get_str(&self, key: &str) -> Option<Value> {
        let hk = HashKey::Str(key.into());
        self.entries.read().get(&hk).map(|(_, v)| v.clone())
    }

    pub fn contains(&self, key: &Value) -> Result<bool, VmError> {
        let hk = key.hash_key()?;
        Ok(self.entries.read().contains_key(&hk))
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries.read().values().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries.read().values().map(|(_, v)| v.clone()).collect()
    }

    pub fn items(&self) -> Vec<(Value, Value)> {
        self.entries.read().values().cloned().collect()
    }

    pub fn entries_by_key(&self) -> IndexMap<HashKey, Value> {
        self.entries
            .read()
            .iter()
            .map(|(hk, (_, v))| (hk.clone(), v.clone()))
            .collect()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    pub fn freeze(&self) {
        if self.frozen.swap(true, Ordering::AcqRel) {
            return;
        }
        for (k, v) in self.entries.read().values() {
            k.freeze();
            v.freeze();
        }
    }

    pub(crate) fn check_mutable(&self, op: &str) -> Result<(), VmError> {
        if self.is_frozen() {
            return Err(VmError::runtime(format!("cannot {op} frozen dict")));
        }
        Ok(())
    }

    pub fn insert(&self, key: Value, value: Value) -> Result<(), VmError> {
        let hk = key.hash_key()?;
        self.check_mutable("insert into")?;
        self.entries.write().insert(hk, (key, value));
        Ok(())
    }

    pub fn remove(&self, key: &Value) -> Result<Option<Value>, VmError> {
        let hk = key.hash_key()?;
        self.check_mutable("delete from")?;
        Ok(self.entries.write().shift_remove(&hk).map(|(_, v)| v))
    }

    pub fn pop_first(&self) -> Result<Option<(Value, Value)>, VmError> {
        self.check_mutable("pop from")?;
        Ok(self.entries.write().shift_remove_index(0).map(|(_, kv)| kv))
    }

    pub fn clear(&self) -> Result<(), VmError> {
        self.check_mutable("clear")?;
        self.entries.write().clear();
        Ok(())
    }
}

/// Insertion-ordered, freezable set
#[derive(Debug, Default)]
pub struct Set {
    entries: RwLock<IndexMap<HashKey, Value>>,
    frozen: AtomicBool,
}

impl Set {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Result<Self, VmError> {
        let mut entries = IndexMap::new();
        for v in values {
            entries.entry(v.hash_key()?).or_insert(v);
        }
        Ok(Self {
            entries: RwLock::new(entries),
            frozen: AtomicBool::new(false),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, value: &Value) -> Result<bool, VmError> {
        let hk = value.hash_key()?;
        Ok(self.entries.read().contains_key(&hk))
    }

    pub fn keys(&self) -> IndexSet<HashKey> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries.read().values().cloned().collect()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    pub fn freeze(&self) {
        if self.frozen.swap(true, Ordering::AcqRel) {
            return;
        }
        for v in self.entries.read().values() {
            v.freeze();
        }
    }

    pub(crate) fn check_mutable(&self, op: &str) -> Result<(), VmError> {
        if self.is_frozen() {
            return Err(VmError::runtime(format!("cannot {op} frozen set")));
        }
        Ok(())
    }

    pub fn insert(&self, value: Value) -> Result<(), VmError> {
        let hk = value.hash_key()?;
        self.check_mutable("insert into")?;
        self.entries.write().entry(hk).or_insert(value);
        Ok(())
    }

    pub fn remove(&self, value: &Value) -> Result<bool, VmError> {
        let hk = value.hash_key()?;
        self.check_mutable("delete from")?;
        Ok(self.entries.write().shift_remove(&hk).is_some())
    }

    pub fn pop_first(&self) -> Result<Option<Value>, VmError> {
        self.check_mutable("pop from")?;
        Ok(self.entries.write().shift_remove_index(0).map(|(_, v)| v))
    }

    pub fn clear(&self) -> Result<(), VmError> {
        self.check_mutable("clear")?;
        self.entries.write().clear();
        Ok(())
    }
}
