//! Consent subsystem configuration.

use crate::preferences::SCHEMA_VERSION;

/// Storage key used for the consent record in every backend.
pub const DEFAULT_STORAGE_KEY: &str = "barcony-consent-preferences";

/// Configuration for the preference store.
#[derive(Debug, Clone)]
pub struct ConsentConfig {
    /// Key the record is stored under
    pub storage_key: String,

    /// Schema version written to and expected from records
    pub schema_version: String,

    /// Lifetime of the fallback cookie in days
    pub cookie_days: i64,

    /// Whether the page is served over HTTPS (sets the cookie `Secure` flag)
    pub secure_transport: bool,

    /// User agent recorded with each save
    pub user_agent: Option<String>,

    /// Host name recorded with each save
    pub domain: Option<String>,
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            cookie_days: 365,
            secure_transport: false,
            user_agent: None,
            domain: None,
        }
    }
}
