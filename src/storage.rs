//! Durable string-keyed storage shared by the task store and the color scheme.

use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage lock poisoned")]
    Poisoned,
}

/// A synchronous key-value store that outlives a single session.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
}

/// Process-local storage. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entries = entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { entries: Mutex::new(entries) }
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Reads `key`, treating a failing backend like a missing value.
pub(crate) fn read_or_absent(storage: &dyn Storage, key: &str) -> Option<String> {
    match storage.get(key) {
        Ok(value) => value,
        Err(e) => {
            log::error!("failed to read storage key '{}': {}", key, e);
            None
        }
    }
}

/// Writes `key`, logging and absorbing backend failures.
pub(crate) fn write_or_log(storage: &dyn Storage, key: &str, value: &str) {
    if let Err(e) = storage.set(key, value) {
        log::error!("failed to write storage key '{}': {}", key, e);
    }
}
