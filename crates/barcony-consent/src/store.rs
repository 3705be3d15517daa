//! Preference store: durable consent record with ranked backend fallback.

use std::sync::Arc;

use crate::backend::{KeyValueStorage, StorageBackend, StorageError};
use crate::config::ConsentConfig;
use crate::cookie::CookieStorage;
use crate::preferences::{ConsentPreferences, ConsentRecord};

/// Persists one consent record per visitor.
///
/// Backends are tried in rank order. A backend that fails its probe is
/// skipped; a write that exceeds the quota is retried once after evicting the
/// existing entry before the next backend is tried. No operation on the
/// store ever returns an error: failures are logged and degrade to defaults.
pub struct PreferenceStore {
    config: ConsentConfig,
    backends: Vec<Arc<dyn StorageBackend>>,
}

impl PreferenceStore {
    /// Create a store over the given ranked backends.
    pub fn new(config: ConsentConfig, backends: Vec<Arc<dyn StorageBackend>>) -> Self {
        Self { config, backends }
    }

    /// Create a store with key-value storage first and cookies as fallback.
    pub fn with_default_backends(config: ConsentConfig) -> Self {
        let cookies = CookieStorage::new(config.cookie_days, config.secure_transport);
        let backends: Vec<Arc<dyn StorageBackend>> =
            vec![Arc::new(KeyValueStorage::new()), Arc::new(cookies)];
        Self::new(config, backends)
    }

    /// Store configuration.
    pub fn config(&self) -> &ConsentConfig {
        &self.config
    }

    /// Persist the given preferences.
    ///
    /// Returns the name of the backend that accepted the record, or `None`
    /// when every backend failed.
    pub fn save(&self, preferences: &ConsentPreferences) -> Option<&'static str> {
        let record = ConsentRecord::new(
            &self.config.schema_version,
            *preferences,
            self.config.user_agent.clone(),
            self.config.domain.clone(),
        );

        let serialized = match serde_json::to_string(&record) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to serialize consent record: {}", e);
                return None;
            }
        };

        for backend in &self.backends {
            if !backend.test() {
                tracing::debug!("Storage backend '{}' unavailable", backend.name());
                continue;
            }

            match self.write(backend.as_ref(), &serialized) {
                Ok(()) => {
                    tracing::debug!("Saved consent preferences to '{}'", backend.name());
                    return Some(backend.name());
                }
                Err(e) => {
                    tracing::warn!("Failed to save consent to '{}': {}", backend.name(), e);
                }
            }
        }

        tracing::error!("Failed to save consent preferences: every storage backend failed");
        None
    }

    /// Write to one backend, evicting and retrying once on a quota error.
    fn write(&self, backend: &dyn StorageBackend, value: &str) -> Result<(), StorageError> {
        let key = &self.config.storage_key;
        match backend.set(key, value) {
            Err(StorageError::QuotaExceeded { .. }) => {
                backend.remove(key)?;
                backend.set(key, value)
            }
            other => other,
        }
    }

    /// Load the stored record.
    ///
    /// Invalid or unparsable records are cleared and reported as absent.
    pub fn load(&self) -> Option<ConsentRecord> {
        let raw = self.read_raw()?;

        match ConsentRecord::parse(&raw, &self.config.schema_version) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Discarding stored consent record: {}", e);
                self.clear();
                None
            }
        }
    }

    fn read_raw(&self) -> Option<String> {
        for backend in &self.backends {
            if !backend.test() {
                continue;
            }

            match backend.get(&self.config.storage_key) {
                Ok(Some(raw)) if !raw.is_empty() => return Some(raw),
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!("Failed to read consent from '{}': {}", backend.name(), e);
                }
            }
        }
        None
    }

    /// Remove the stored record from every backend.
    pub fn clear(&self) {
        for backend in &self.backends {
            if !backend.test() {
                continue;
            }
            if let Err(e) = backend.remove(&self.config.storage_key) {
                tracing::debug!("Failed to clear consent from '{}': {}", backend.name(), e);
            }
        }
    }
}
