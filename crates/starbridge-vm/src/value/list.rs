use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::error::VmError;
use crate::value::Value;

/// Mutable, freezable list
#[derive(Debug, Default)]
pub struct List {
    items: RwLock<Vec<Value>>,
    frozen: AtomicBool,
}

impl List {
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items: RwLock::new(items),
            frozen: AtomicBool::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<Value> {
        self.items.read().clone()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.read().get(index).cloned()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    pub fn freeze(&self) {
        if self.frozen.swap(true, Ordering::AcqRel) {
            return;
        }
        for item in self.items.read().iter() {
            item.freeze();
        }
    }

    pub(crate) fn check_mutable(&self, op: &str) -> Result<(), VmError> {
        if self.is_frozen() {
            return Err(VmError::runtime(format!("cannot {op} frozen list")));
        }
        Ok(())
    }

    /// Run `f` on the items under the write lock, after the frozen check
    pub fn mutate<R>(&self, op: &str, f: impl FnOnce(&mut Vec<Value>) -> Result<R, VmError>) -> Result<R, VmError> {
        self.check_mutable(op)?;
        let mut items = self.items.write();
        f(&mut items)
    }

    pub fn push(&self, value: Value) -> Result<(), VmError> {
        self.mutate("append to", |items| {
            items.push(value);
            Ok(())
        })
    }

    pub fn extend(&self, values: Vec<Value>) -> Result<(), VmError> {
        self.mutate("extend", |items| {
            items.extend(values);
            Ok(())
        })
    }

    pub fn set(&self, index: usize, value: Value) -> Result<(), VmError> {
        self.mutate("assign to element of", |items| match items.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(VmError::runtime(format!(
                "index {index} out of range [0:{}]",
                items.len()
            ))),
        })
    }
}
