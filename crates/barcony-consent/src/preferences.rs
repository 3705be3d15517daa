//! Consent preferences and the persisted consent record.

use serde::{Deserialize, Serialize};

/// Current schema version of persisted consent records.
pub const SCHEMA_VERSION: &str = "1.0";

/// The four consent categories a visitor can choose from.
///
/// `necessary` cannot be switched off: every constructor, every
/// deserialization and every merge forces it to `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredFlags")]
pub struct ConsentPreferences {
    necessary: bool,
    /// Analytics cookies (page view counting, traffic sources)
    pub analytics: bool,
    /// Advertising cookies
    pub marketing: bool,
    /// Personalisation and functionality cookies
    pub preferences: bool,
}

/// Wire shape of the preferences object. All four keys are required.
#[derive(Deserialize)]
struct StoredFlags {
    #[serde(rename = "necessary")]
    _necessary: bool,
    analytics: bool,
    marketing: bool,
    preferences: bool,
}

impl From<StoredFlags> for ConsentPreferences {
    fn from(flags: StoredFlags) -> Self {
        Self::new(flags.analytics, flags.marketing, flags.preferences)
    }
}

impl ConsentPreferences {
    /// Create preferences with the given optional categories.
    pub fn new(analytics: bool, marketing: bool, preferences: bool) -> Self {
        Self {
            necessary: true,
            analytics,
            marketing,
            preferences,
        }
    }

    /// Every category granted.
    pub fn all() -> Self {
        Self::new(true, true, true)
    }

    /// Always `true`.
    pub fn necessary(&self) -> bool {
        self.necessary
    }

    /// Merge a partial update into these preferences.
    pub fn merge(self, update: PreferenceUpdate) -> Self {
        Self::new(
            update.analytics.unwrap_or(self.analytics),
            update.marketing.unwrap_or(self.marketing),
            update.preferences.unwrap_or(self.preferences),
        )
    }
}

impl Default for ConsentPreferences {
    fn default() -> Self {
        Self::new(false, false, false)
    }
}

/// A partial change to the optional categories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<bool>,
}

impl PreferenceUpdate {
    pub fn analytics(mut self, granted: bool) -> Self {
        self.analytics = Some(granted);
        self
    }

    pub fn marketing(mut self, granted: bool) -> Self {
        self.marketing = Some(granted);
        self
    }

    pub fn preferences(mut self, granted: bool) -> Self {
        self.preferences = Some(granted);
        self
    }
}

/// Versioned consent record as written to storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRecord {
    /// Schema version tag
    pub version: String,
    /// The visitor's choice
    pub preferences: ConsentPreferences,
    /// Creation time in milliseconds since the Unix epoch
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// Reasons a stored record is rejected.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Malformed consent record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Consent record version {found} does not match {expected}")]
    VersionMismatch { found: String, expected: String },
}

impl ConsentRecord {
    /// Build a record stamped with the current time.
    pub fn new(
        version: &str,
        preferences: ConsentPreferences,
        user_agent: Option<String>,
        domain: Option<String>,
    ) -> Self {
        Self {
            version: version.to_string(),
            preferences,
            timestamp: chrono::Utc::now().timestamp_millis(),
            user_agent,
            domain,
        }
    }

    /// Parse and validate a serialized record against the expected version.
    pub fn parse(raw: &str, expected_version: &str) -> Result<Self, RecordError> {
        let record: ConsentRecord = serde_json::from_str(raw)?;

        if record.version != expected_version {
            return Err(RecordError::VersionMismatch {
                found: record.version,
                expected: expected_version.to_string(),
            });
        }

        Ok(record)
    }
}
