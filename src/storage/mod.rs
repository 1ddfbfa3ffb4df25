//! Key-value record storage behind the ledger.
//!
//! The ledger never talks to a concrete backend; it is handed an
//! `Arc<dyn RecordStore>` at construction. Two backends ship here:
//!
//! - [`MemoryStore`]: process-local map, nothing persisted
//! - [`JsonFileStore`]: a single flat JSON object file, rewritten atomically
//!   on every mutation and locked for exclusive use

mod json_file;
mod memory;

pub use json_file::{JsonFileStore, JsonStoreConfig};
pub use memory::MemoryStore;

use crate::error::Result;
use serde_json::Value;
use std::sync::Arc;

/// Closure run by [`RecordStore::update`] while the write lock is held.
///
/// Receives the current value (if any). Returning `Some(v)` writes `v`;
/// returning `None` leaves the key as it was.
pub type UpdateFn<'a> = dyn FnMut(Option<&Value>) -> Result<Option<Value>> + 'a;

/// Durable mapping from string keys to JSON values.
pub trait RecordStore: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Overwrite the value stored under `key`.
    fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Whether anything is stored under `key`.
    fn has(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Remove `key`. Returns whether it was present.
    fn delete(&self, key: &str) -> Result<bool>;

    /// Remove every key.
    fn clear(&self) -> Result<()>;

    /// Snapshot of every (key, value) pair, ordered by key.
    fn all(&self) -> Result<Vec<(String, Value)>>;

    /// Atomic read-modify-write of a single key.
    ///
    /// No other mutation of the store can interleave between the read handed
    /// to `f` and the write of its result. If `f` fails, nothing is written
    /// and the error is returned. Returns the value written, if any.
    fn update(&self, key: &str, f: &mut UpdateFn<'_>) -> Result<Option<Value>>;

    /// Number of stored keys.
    fn len(&self) -> Result<usize> {
        Ok(self.all()?.len())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        (**self).set(key, value)
    }

    fn has(&self, key: &str) -> Result<bool> {
        (**self).has(key)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        (**self).delete(key)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }

    fn all(&self) -> Result<Vec<(String, Value)>> {
        (**self).all()
    }

    fn update(&self, key: &str, f: &mut UpdateFn<'_>) -> Result<Option<Value>> {
        (**self).update(key, f)
    }

    fn len(&self) -> Result<usize> {
        (**self).len()
    }
}
