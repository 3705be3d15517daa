//! Google Consent Mode v2 signalling.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::Value;

use crate::preferences::ConsentPreferences;

/// Jurisdictions requiring opt-in: EEA, United Kingdom and Switzerland.
pub const OPT_IN_REGIONS: [&str; 32] = [
    "AT", "BE", "BG", "HR", "CY", "CZ", "DK", "EE", "FI", "FR", "DE", "GR", "HU", "IS", "IE", "IT",
    "LV", "LI", "LT", "LU", "MT", "NL", "NO", "PL", "PT", "RO", "SK", "SI", "ES", "SE", "GB", "CH",
];

/// Milliseconds tags wait for an update before firing under the default.
pub const WAIT_FOR_UPDATE_MS: u32 = 500;

/// Grant state of a consent category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentState {
    Granted,
    Denied,
}

impl From<bool> for ConsentState {
    fn from(granted: bool) -> Self {
        if granted {
            Self::Granted
        } else {
            Self::Denied
        }
    }
}

/// Settings object of a `gtag('consent', ...)` command.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConsentModeSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_storage: Option<ConsentState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analytics_storage: Option<ConsentState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub functionality_storage: Option<ConsentState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personalization_storage: Option<ConsentState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_user_data: Option<ConsentState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_personalization: Option<ConsentState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_storage: Option<ConsentState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_for_update: Option<u32>,
}

impl ConsentModeSettings {
    /// Map preferences to the update signal.
    pub fn from_preferences(preferences: &ConsentPreferences) -> Self {
        let marketing = ConsentState::from(preferences.marketing);
        let personal = ConsentState::from(preferences.preferences);
        Self {
            ad_storage: Some(marketing),
            analytics_storage: Some(preferences.analytics.into()),
            functionality_storage: Some(personal),
            personalization_storage: Some(personal),
            ad_user_data: Some(marketing),
            ad_personalization: Some(marketing),
            security_storage: Some(ConsentState::Granted),
            ..Default::default()
        }
    }
}

/// Consent command kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentAction {
    Default,
    Update,
}

/// One `gtag('consent', action, settings)` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsentCommand {
    pub action: ConsentAction,
    pub settings: ConsentModeSettings,
}

impl ConsentCommand {
    /// The entry gtag pushes onto the data layer.
    pub fn to_data_layer_entry(&self) -> Value {
        serde_json::json!(["consent", self.action, self.settings])
    }
}

/// The two default commands issued before any interaction: deny everything
/// non-essential in opt-in regions, grant analytics elsewhere.
pub fn default_commands() -> [ConsentCommand; 2] {
    let denied = Some(ConsentState::Denied);
    let regional = ConsentModeSettings {
        region: Some(OPT_IN_REGIONS.iter().map(|r| r.to_string()).collect()),
        ad_storage: denied,
        analytics_storage: denied,
        functionality_storage: denied,
        personalization_storage: denied,
        ad_user_data: denied,
        ad_personalization: denied,
        security_storage: Some(ConsentState::Granted),
        wait_for_update: Some(WAIT_FOR_UPDATE_MS),
    };
    let global = ConsentModeSettings {
        ad_storage: denied,
        analytics_storage: Some(ConsentState::Granted),
        security_storage: Some(ConsentState::Granted),
        ..Default::default()
    };

    [
        ConsentCommand {
            action: ConsentAction::Default,
            settings: regional,
        },
        ConsentCommand {
            action: ConsentAction::Default,
            settings: global,
        },
    ]
}

/// Inline script that installs `gtag` and issues the default commands.
pub fn default_signal_script() -> String {
    let mut script = String::from(
        "window.dataLayer = window.dataLayer || [];\nfunction gtag(){dataLayer.push(arguments);}\n",
    );
    for command in default_commands() {
        let settings = serde_json::to_string(&command.settings).unwrap_or_else(|_| "{}".into());
        script.push_str(&format!("gtag('consent', 'default', {});\n", settings));
    }
    script
}

/// Receiver of consent commands (the page's `gtag`/`dataLayer`).
pub trait SignalSink: Send + Sync {
    fn push(&self, command: &ConsentCommand);
}

/// In-process data layer recording every pushed entry.
#[derive(Debug, Default)]
pub struct DataLayer {
    entries: Mutex<Vec<Value>>,
}

impl DataLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries pushed so far.
    pub fn entries(&self) -> Vec<Value> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl SignalSink for DataLayer {
    fn push(&self, command: &ConsentCommand) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(command.to_data_layer_entry());
        }
    }
}

/// Delivers consent commands to the sink, if one is attached.
#[derive(Clone, Default)]
pub struct SignalBridge {
    sink: Option<Arc<dyn SignalSink>>,
}

impl SignalBridge {
    /// Bridge delivering to `sink`.
    pub fn new(sink: Arc<dyn SignalSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// Bridge with no sink; every signal is a no-op.
    pub fn detached() -> Self {
        Self::default()
    }

    /// Issue the pre-interaction defaults.
    pub fn send_default_signal(&self) {
        let Some(sink) = &self.sink else {
            tracing::debug!("No consent signal sink, skipping defaults");
            return;
        };
        for command in default_commands() {
            sink.push(&command);
        }
    }

    /// Issue an update reflecting `preferences`.
    pub fn send_update_signal(&self, preferences: &ConsentPreferences) {
        let Some(sink) = &self.sink else {
            return;
        };
        sink.push(&ConsentCommand {
            action: ConsentAction::Update,
            settings: ConsentModeSettings::from_preferences(preferences),
        });
    }
}
