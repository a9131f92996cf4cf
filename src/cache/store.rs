//! Durable key-value stores backing the cache.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::Mutex;
use thiserror::Error;

/// Errors raised by a [`KvStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage quota exceeded: {needed} bytes needed, {capacity} available")]
    QuotaExceeded { needed: usize, capacity: usize },

    #[error("Storage unavailable at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage file '{path}' is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Synchronous keyed store with finite capacity. Writes may fail.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory store with an optional byte quota.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    capacity: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the sum of key and value lengths to `bytes`.
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: Some(bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        if let Some(capacity) = self.capacity {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = used + key.len() + value.len();
            if needed > capacity {
                return Err(StoreError::QuotaExceeded { needed, capacity });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// JSON-file store shared between processes through an advisory lock.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.cache/clientsync/store.json` or equivalent.
    pub fn default_path() -> PathBuf {
        let cache_dir = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
        cache_dir.join("clientsync").join("store.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read_map(&self, file: &mut File) -> Result<HashMap<String, String>, StoreError> {
        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| self.io_err(e))?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Read-modify-write under an exclusive lock.
    fn update<F>(&self, mutate: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut HashMap<String, String>),
    {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;
        FileExt::lock_exclusive(&file).map_err(|e| self.io_err(e))?;

        let result = (|| {
            // A corrupt file is replaced rather than blocking every write.
            let mut map = self.read_map(&mut file).unwrap_or_default();
            mutate(&mut map);
            let serialized = serde_json::to_string(&map).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
            file.set_len(0).map_err(|e| self.io_err(e))?;
            file.seek(SeekFrom::Start(0)).map_err(|e| self.io_err(e))?;
            file.write_all(serialized.as_bytes())
                .map_err(|e| self.io_err(e))?;
            file.flush().map_err(|e| self.io_err(e))
        })();

        let _ = FileExt::unlock(&file);
        result
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_err(e)),
        };
        FileExt::lock_shared(&file).map_err(|e| self.io_err(e))?;
        let map = self.read_map(&mut file);
        let _ = FileExt::unlock(&file);
        Ok(map?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|map| {
            map.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        if !self.path.exists() {
            return Ok(());
        }
        self.update(|map| {
            map.remove(key);
        })
    }
}
