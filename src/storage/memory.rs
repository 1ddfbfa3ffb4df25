//! In-memory record store.

use super::{RecordStore, UpdateFn};
use crate::error::Result;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;

/// Record store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    fn has(&self, key: &str) -> Result<bool> {
        Ok(self.entries.read().contains_key(key))
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }

    fn clear(&self) -> Result<()> {
        self.entries.write().clear();
        Ok(())
    }

    fn all(&self) -> Result<Vec<(String, Value)>> {
        Ok(self
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn update(&self, key: &str, f: &mut UpdateFn<'_>) -> Result<Option<Value>> {
        let mut entries = self.entries.write();
        let next = f(entries.get(key))?;
        if let Some(ref value) = next {
            entries.insert(key.to_string(), value.clone());
        }
        Ok(next)
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entries.read().len())
    }
}
