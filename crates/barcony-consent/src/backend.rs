//! Storage backends for the consent record.
//!
//! The preference store holds a ranked list of backends and tries them in
//! order. Each backend exposes the same capability interface so the store
//! never needs to know which medium it is talking to.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

/// Errors a storage backend can report.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage backend '{0}' is unavailable")]
    Unavailable(&'static str),

    #[error("Storage quota exceeded: {needed} bytes needed, {capacity} available")]
    QuotaExceeded { needed: usize, capacity: usize },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// A key-value persistence medium.
pub trait StorageBackend: Send + Sync {
    /// Backend identifier (e.g., "local", "cookie")
    fn name(&self) -> &'static str;

    /// Probe whether the backend can currently be used.
    fn test(&self) -> bool;

    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove the value stored under `key`.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

const PROBE_KEY: &str = "__barcony_storage_test__";
const PROBE_VALUE: &str = "test";

/// In-process key-value storage with the semantics of browser local storage.
///
/// The backend can be disabled (private browsing, blocked storage) and can
/// enforce a byte capacity over all keys and values.
#[derive(Debug, Default)]
pub struct KeyValueStorage {
    entries: RwLock<HashMap<String, String>>,
    disabled: AtomicBool,
    capacity: Option<usize>,
    injected_quota_errors: AtomicUsize,
}

impl KeyValueStorage {
    /// Create an enabled storage without a capacity limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an enabled storage holding at most `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Enable or disable the storage.
    pub fn set_enabled(&self, enabled: bool) {
        self.disabled.store(!enabled, Ordering::SeqCst);
    }

    /// Make the next `count` writes fail with a quota error.
    pub fn inject_quota_errors(&self, count: usize) {
        self.injected_quota_errors.store(count, Ordering::SeqCst);
    }

    /// Bytes currently in use.
    pub fn used_bytes(&self) -> usize {
        self.entries
            .read()
            .map(|entries| entries.iter().map(|(k, v)| k.len() + v.len()).sum())
            .unwrap_or(0)
    }

    fn ensure_enabled(&self) -> Result<(), StorageError> {
        if self.disabled.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(self.name()));
        }
        Ok(())
    }

    fn take_injected_error(&self) -> bool {
        self.injected_quota_errors
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl StorageBackend for KeyValueStorage {
    fn name(&self) -> &'static str {
        "local"
    }

    fn test(&self) -> bool {
        if self.set(PROBE_KEY, PROBE_VALUE).is_err() {
            return false;
        }
        let retrieved = self.get(PROBE_KEY).ok().flatten();
        let _ = self.remove(PROBE_KEY);
        retrieved.as_deref() == Some(PROBE_VALUE)
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.ensure_enabled()?;
        let entries = self
            .entries
            .read()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.ensure_enabled()?;
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let used: usize = entries.iter().map(|(k, v)| k.len() + v.len()).sum();
        let replaced = entries.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
        let needed = key.len() + value.len();

        if let Some(capacity) = self.capacity {
            let available = capacity.saturating_sub(used - replaced);
            if needed > available {
                return Err(StorageError::QuotaExceeded {
                    needed,
                    capacity: available,
                });
            }
        }

        if key != PROBE_KEY && self.take_injected_error() {
            return Err(StorageError::QuotaExceeded {
                needed,
                capacity: 0,
            });
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.ensure_enabled()?;
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }
}
