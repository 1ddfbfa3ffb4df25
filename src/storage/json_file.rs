//! Flat JSON file record store.
//!
//! The whole store is one JSON object on disk, keyed by record key. The
//! object is held in memory and the file is rewritten after each mutation:
//! serialized to a sibling temp file, synced, then renamed over the data file
//! so a crash never leaves a half-written store behind.

use super::{RecordStore, UpdateFn};
use crate::error::{LedgerError, Result};
use fs2::FileExt;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// JSON file store configuration.
#[derive(Clone, Debug)]
pub struct JsonStoreConfig {
    /// Path of the JSON data file.
    pub path: PathBuf,

    /// Whether to create the file if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for JsonStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./levels.json"),
            create_if_missing: true,
        }
    }
}

/// Record store persisted as a single JSON object file.
pub struct JsonFileStore {
    /// Path of the data file.
    path: PathBuf,

    /// Lock file for exclusive access.
    _lock_file: File,

    /// In-memory copy of the file contents. The mutex also serializes writers.
    data: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    /// Open an existing store file or create a new one.
    pub fn open_or_create(config: JsonStoreConfig) -> Result<Self> {
        if config.path.exists() {
            Self::open(config)
        } else if config.create_if_missing {
            Self::create(config)
        } else {
            Err(LedgerError::NotInitialized)
        }
    }

    /// Create a new, empty store file, replacing any unlocked existing file.
    pub fn create(config: JsonStoreConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock_file = Self::acquire_lock(&config.path)?;
        let data = Map::new();
        Self::persist(&config.path, &data)?;

        tracing::debug!(path = %config.path.display(), "created JSON record store");

        Ok(Self {
            path: config.path,
            _lock_file: lock_file,
            data: Mutex::new(data),
        })
    }

    /// Open an existing store file.
    pub fn open(config: JsonStoreConfig) -> Result<Self> {
        let lock_file = Self::acquire_lock(&config.path)?;

        let contents = fs::read_to_string(&config.path)?;
        let data = if contents.trim().is_empty() {
            Map::new()
        } else {
            match serde_json::from_str::<Value>(&contents)? {
                Value::Object(map) => map,
                other => {
                    return Err(LedgerError::InvalidFormat(format!(
                        "expected a JSON object at top level, found {}",
                        json_kind(&other)
                    )))
                }
            }
        };

        tracing::debug!(
            path = %config.path.display(),
            keys = data.len(),
            "opened JSON record store"
        );

        Ok(Self {
            path: config.path,
            _lock_file: lock_file,
            data: Mutex::new(data),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(Self::lock_path(path))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| LedgerError::Locked)?;

        Ok(lock_file)
    }

    /// Write `data` to `path` via temp file + rename.
    fn persist(path: &Path, data: &Map<String, Value>) -> Result<()> {
        let encoded = serde_json::to_vec_pretty(data)
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let mut file = File::create(&tmp_path)?;
        file.write_all(&encoded)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Persist `data` after `key` was changed, putting `previous` back in
    /// memory if the write fails so memory and disk never disagree.
    fn commit(
        &self,
        data: &mut Map<String, Value>,
        key: &str,
        previous: Option<Value>,
    ) -> Result<()> {
        if let Err(e) = Self::persist(&self.path, data) {
            match previous {
                Some(value) => data.insert(key.to_string(), value),
                None => data.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl RecordStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut data = self.data.lock();
        let previous = data.insert(key.to_string(), value);
        self.commit(&mut *data, key, previous)
    }

    fn has(&self, key: &str) -> Result<bool> {
        Ok(self.data.lock().contains_key(key))
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let mut data = self.data.lock();
        let Some(removed) = data.remove(key) else {
            return Ok(false);
        };
        self.commit(&mut *data, key, Some(removed))?;
        Ok(true)
    }

    fn clear(&self) -> Result<()> {
        let mut data = self.data.lock();
        let before = std::mem::take(&mut *data);
        if let Err(e) = Self::persist(&self.path, &data) {
            *data = before;
            return Err(e);
        }
        Ok(())
    }

    fn all(&self) -> Result<Vec<(String, Value)>> {
        let data = self.data.lock();
        let mut pairs: Vec<(String, Value)> =
            data.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(pairs)
    }

    fn update(&self, key: &str, f: &mut UpdateFn<'_>) -> Result<Option<Value>> {
        let mut data = self.data.lock();
        let Some(next) = f(data.get(key))? else {
            return Ok(None);
        };

        let previous = data.insert(key.to_string(), next.clone());
        self.commit(&mut *data, key, previous)?;
        Ok(Some(next))
    }

    fn len(&self) -> Result<usize> {
        Ok(self.data.lock().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> JsonStoreConfig {
        JsonStoreConfig {
            path: dir.path().join("levels.json"),
            create_if_missing: true,
        }
    }

    #[test]
    fn test_create_writes_empty_object() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::create(config(&dir)).unwrap();
        let contents = fs::read_to_string(store.path()).unwrap();
        assert_eq!(serde_json::from_str::<Value>(&contents).unwrap(), json!({}));
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = JsonFileStore::open_or_create(config(&dir)).unwrap();
            store.set("u1-g1", json!({"XP": 4, "level": 2})).unwrap();
            store.set("u2-g1", json!({"XP": 1, "level": 1})).unwrap();
            store.delete("u2-g1").unwrap();
        }

        let store = JsonFileStore::open_or_create(config(&dir)).unwrap();
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(
            store.get("u1-g1").unwrap(),
            Some(json!({"XP": 4, "level": 2}))
        );
    }

    #[test]
    fn test_missing_file_without_create() {
        let dir = TempDir::new().unwrap();
        let result = JsonFileStore::open_or_create(JsonStoreConfig {
            path: dir.path().join("absent.json"),
            create_if_missing: false,
        });
        assert!(matches!(result, Err(LedgerError::NotInitialized)));
    }

    #[test]
    fn test_second_open_is_locked() {
        let dir = TempDir::new().unwrap();
        let _first = JsonFileStore::open_or_create(config(&dir)).unwrap();
        let second = JsonFileStore::open_or_create(config(&dir));
        assert!(matches!(second, Err(LedgerError::Locked)));
    }

    #[test]
    fn test_lock_released_on_drop() {
        let dir = TempDir::new().unwrap();
        drop(JsonFileStore::open_or_create(config(&dir)).unwrap());
        assert!(JsonFileStore::open_or_create(config(&dir)).is_ok());
    }

    #[test]
    fn test_non_object_file_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("levels.json"), "[1, 2, 3]").unwrap();
        let result = JsonFileStore::open(config(&dir));
        assert!(matches!(result, Err(LedgerError::InvalidFormat(_))));
    }

    #[test]
    fn test_garbage_file_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("levels.json"), "{\"a\": ").unwrap();
        let result = JsonFileStore::open(config(&dir));
        assert!(matches!(result, Err(LedgerError::Deserialization(_))));
    }

    #[test]
    fn test_empty_file_opens_empty() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("levels.json"), "").unwrap();
        let store = JsonFileStore::open(config(&dir)).unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_update_persists() {
        let dir = TempDir::new().unwrap();
        {
            let store = JsonFileStore::create(config(&dir)).unwrap();
            for _ in 0..3 {
                store
                    .update("n", &mut |v| {
                        Ok(Some(json!(v.and_then(Value::as_u64).unwrap_or(0) + 1)))
                    })
                    .unwrap();
            }
        }
        let store = JsonFileStore::open(config(&dir)).unwrap();
        assert_eq!(store.get("n").unwrap(), Some(json!(3)));
    }

    #[test]
    fn test_clear_persists() {
        let dir = TempDir::new().unwrap();
        {
            let store = JsonFileStore::create(config(&dir)).unwrap();
            store.set("a", json!(1)).unwrap();
            store.clear().unwrap();
        }
        let store = JsonFileStore::open(config(&dir)).unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::create(JsonStoreConfig {
            path: dir.path().join("nested/deeper/levels.json"),
            create_if_missing: true,
        })
        .unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_failed_write_rolls_back_memory() {
        let dir = TempDir::new().unwrap();
        let parent = dir.path().join("data");
        let store = JsonFileStore::create(JsonStoreConfig {
            path: parent.join("levels.json"),
            create_if_missing: true,
        })
        .unwrap();
        store.set("u1-g1", json!({"XP": 4, "level": 2})).unwrap();
        store.set("u2-g1", json!({"XP": 1, "level": 1})).unwrap();

        // A file where the parent directory was makes every write fail.
        fs::remove_dir_all(&parent).unwrap();
        fs::write(&parent, "not a directory").unwrap();

        assert!(store.set("u1-g1", json!({"XP": 9, "level": 9})).is_err());
        assert!(store.set("u3-g1", json!({"XP": 1, "level": 1})).is_err());
        assert!(store.delete("u2-g1").is_err());
        assert!(store
            .update("u1-g1", &mut |_| Ok(Some(json!({"XP": 0, "level": 3}))))
            .is_err());
        assert!(store
            .update("u4-g1", &mut |_| Ok(Some(json!({"XP": 1, "level": 1}))))
            .is_err());
        assert!(store.clear().is_err());

        assert_eq!(
            store.get("u1-g1").unwrap(),
            Some(json!({"XP": 4, "level": 2}))
        );
        assert_eq!(
            store.get("u2-g1").unwrap(),
            Some(json!({"XP": 1, "level": 1}))
        );
        assert!(!store.has("u3-g1").unwrap());
        assert!(!store.has("u4-g1").unwrap());
        assert_eq!(store.len().unwrap(), 2);
    }
}
