//! Key-value persistence backends.
//!
//! The pinned-set is stored as one JSON list under one key. Backends only offer
//! whole-value get/set; there is no partial update protocol.

use crate::error::StoreError;
use anyhow::Context;
use parking_lot::{Condvar, Mutex};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A shared key-value store. Both surfaces (popup and content) hold one.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

/// Write an empty pinned list under `key` unless something is already stored.
///
/// Returns `true` when the default was written.
pub fn install_defaults(store: &dyn KeyValueStore, key: &str) -> Result<bool, StoreError> {
    if store.get(key)?.is_some() {
        return Ok(false);
    }
    store.set(key, Value::Array(Vec::new()))?;
    log::info!("Initialized empty pinned list under '{}'", key);
    Ok(true)
}

/// Process-local store, handy for tests and for hosts without durable storage.
#[derive(Debug)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
    available: AtomicBool,
    writes: AtomicUsize,
    held: Mutex<bool>,
    released: Condvar,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            writes: AtomicUsize::new(0),
            held: Mutex::new(false),
            released: Condvar::new(),
        }
    }

    /// Simulate the backing store going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make `set` block until writes are released again, like a slow disk.
    pub fn hold_writes(&self, held: bool) {
        *self.held.lock() = held;
        if !held {
            self.released.notify_all();
        }
    }

    /// Number of successful `set` calls.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store disabled".to_string()))
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.check_available()?;
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        {
            let mut held = self.held.lock();
            while *held {
                self.released.wait(&mut held);
            }
        }
        self.check_available()?;
        self.values.lock().insert(key.to_string(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// JSON object file: `{ "<key>": <value>, ... }`.
///
/// Writes are atomic (temp file then rename). A missing file reads as empty.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles from clones sharing one Arc
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Default location: `<data dir>/rowpin/storage.json`
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rowpin")
            .join("storage.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<Map<String, Value>, StoreError> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read storage from {:?}", self.path))
            .map_err(unavailable)?;
        if contents.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&contents)? {
            Value::Object(map) => Ok(map),
            _ => Err(StoreError::Unavailable(format!(
                "storage file {:?} does not contain a JSON object",
                self.path
            ))),
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create storage directory {:?}", parent))?;
        }
        let contents =
            serde_json::to_string_pretty(map).context("Failed to serialize storage")?;
        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, contents)
            .with_context(|| format!("Failed to write storage to {:?}", temp_path))?;
        std::fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Failed to move storage into place at {:?}", self.path))?;
        Ok(())
    }
}

fn unavailable(err: anyhow::Error) -> StoreError {
    StoreError::Unavailable(format!("{:#}", err))
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.read_map()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        // A corrupt file is replaced rather than blocking every future write
        let mut map = match self.read_map() {
            Ok(map) => map,
            Err(StoreError::Malformed(e)) => {
                log::warn!("Replacing malformed storage file {:?}: {}", self.path, e);
                Map::new()
            }
            Err(e) => return Err(e),
        };
        map.insert(key.to_string(), value);
        self.write_map(&map).map_err(unavailable)?;
        log::debug!("Saved '{}' to {:?}", key, self.path);
        Ok(())
    }
}
