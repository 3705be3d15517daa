//! Cookie consent management for the Barcony site.
//!
//! Holds the visitor's consent choice, persists it to a ranked list of
//! storage backends and keeps Google Consent Mode informed.

pub mod analytics;
pub mod backend;
pub mod config;
pub mod cookie;
pub mod manager;
pub mod preferences;
pub mod signal;
pub mod store;
pub mod view;

pub use analytics::{AnalyticsAction, AnalyticsLoader, ResourceHint, TagHost};
pub use backend::{KeyValueStorage, StorageBackend, StorageError};
pub use config::ConsentConfig;
pub use cookie::CookieStorage;
pub use manager::{ConsentEvent, ConsentManager, ConsentSessionState};
pub use preferences::{ConsentPreferences, ConsentRecord, PreferenceUpdate, RecordError};
pub use signal::{default_signal_script, ConsentCommand, DataLayer, SignalBridge, SignalSink};
pub use store::PreferenceStore;
pub use view::{BannerPanel, BannerView};
