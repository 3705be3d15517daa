//! Consent-aware analytics loading.
//!
//! The loader polls the consent manager and decides when the GA4 tag may be
//! injected. It is edge triggered: scripts are loaded on the first poll if
//! analytics is already granted, or when the grant flips from denied to
//! granted. Revocation needs no action because Consent Mode updates stop
//! the tag from collecting.

use std::sync::Arc;
use std::time::Duration;

use crate::manager::ConsentManager;

/// Interval between consent checks.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Delay before the first page view is sent after loading the tag.
pub const PAGE_VIEW_DELAY: Duration = Duration::from_millis(500);

static ANALYTICS_ORIGINS: [&str; 2] = [
    "https://www.google-analytics.com",
    "https://www.googletagmanager.com",
];

/// A resource hint to add to the document head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHint {
    /// `preconnect` or `dns-prefetch`
    pub rel: &'static str,
    pub href: &'static str,
}

/// Work the host page must perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyticsAction {
    /// Add connection hints for the analytics origins
    Preconnect(Vec<ResourceHint>),

    /// Inject the gtag.js loader and its configuration snippet
    LoadScript { src: String, config_snippet: String },

    /// Send a page view once the script had time to load
    TrackPageView { delay: Duration },
}

/// Executes analytics actions in the host page.
pub trait TagHost: Send {
    fn apply(&mut self, action: AnalyticsAction);
}

/// Decides when analytics may load.
#[derive(Debug)]
pub struct AnalyticsLoader {
    measurement_id: String,
    previous: Option<bool>,
    script_loaded: bool,
}

impl AnalyticsLoader {
    /// Create a loader for a GA4 measurement id.
    ///
    /// Returns `None` when the id is empty, which disables tracking.
    pub fn new(measurement_id: impl Into<String>) -> Option<Self> {
        let measurement_id = measurement_id.into();
        if measurement_id.trim().is_empty() {
            tracing::warn!("GA4 ID not configured. Tracking disabled.");
            return None;
        }

        Some(Self {
            measurement_id,
            previous: None,
            script_loaded: false,
        })
    }

    pub fn measurement_id(&self) -> &str {
        &self.measurement_id
    }

    /// URL of the gtag.js loader for this measurement id.
    pub fn script_src(&self) -> String {
        format!(
            "https://www.googletagmanager.com/gtag/js?id={}",
            self.measurement_id
        )
    }

    /// Inline configuration executed after gtag.js.
    pub fn config_snippet(&self) -> String {
        format!(
            r#"window.dataLayer = window.dataLayer || [];
function gtag(){{dataLayer.push(arguments);}}
gtag('js', new Date());
gtag('config', '{}', {{
  anonymize_ip: true,
  transport_type: 'beacon',
  send_page_view: false
}});"#,
            self.measurement_id
        )
    }

    /// Preconnect and DNS prefetch hints for the analytics origins.
    pub fn resource_hints() -> Vec<ResourceHint> {
        ["preconnect", "dns-prefetch"]
            .into_iter()
            .flat_map(|rel| {
                ANALYTICS_ORIGINS
                    .iter()
                    .map(move |href| ResourceHint { rel, href: *href })
            })
            .collect()
    }

    /// Check consent and return the actions to perform.
    pub fn poll(&mut self, manager: &ConsentManager) -> Vec<AnalyticsAction> {
        let granted = manager.is_consent_given() && manager.preferences().analytics;
        let previous = self.previous.replace(granted);

        let became_granted = match previous {
            None => granted,
            Some(was) => !was && granted,
        };

        if !became_granted {
            return Vec::new();
        }

        tracing::debug!("Analytics consent granted, loading {}", self.measurement_id);

        let mut actions = vec![AnalyticsAction::Preconnect(Self::resource_hints())];
        if !self.script_loaded {
            self.script_loaded = true;
            actions.push(AnalyticsAction::LoadScript {
                src: self.script_src(),
                config_snippet: self.config_snippet(),
            });
        }
        actions.push(AnalyticsAction::TrackPageView {
            delay: PAGE_VIEW_DELAY,
        });
        actions
    }

    /// Poll the manager every `period` and hand actions to `host`.
    ///
    /// Runs until the task is aborted.
    pub async fn run<H: TagHost>(
        mut self,
        manager: Arc<ConsentManager>,
        mut host: H,
        period: Duration,
    ) {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            for action in self.poll(&manager) {
                host.apply(action);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConsentConfig;
    use crate::preferences::PreferenceUpdate;
    use crate::signal::SignalBridge;
    use crate::store::PreferenceStore;
    use std::sync::Mutex;

    fn manager() -> ConsentManager {
        let store = Arc::new(PreferenceStore::with_default_backends(
            ConsentConfig::default(),
        ));
        ConsentManager::new(store, SignalBridge::detached())
    }

    fn loads_script(actions: &[AnalyticsAction]) -> bool {
        actions
            .iter()
            .any(|a| matches!(a, AnalyticsAction::LoadScript { .. }))
    }

    #[test]
    fn empty_id_disables_tracking() {
        assert!(AnalyticsLoader::new("").is_none());
        assert!(AnalyticsLoader::new("  ").is_none());
    }

    #[test]
    fn renders_script_and_config() {
        let loader = AnalyticsLoader::new("G-TEST123").unwrap();

        assert_eq!(
            loader.script_src(),
            "https://www.googletagmanager.com/gtag/js?id=G-TEST123"
        );
        assert!(loader
            .config_snippet()
            .contains("gtag('config', 'G-TEST123', {"));
        assert!(loader.config_snippet().contains("send_page_view: false"));
        assert_eq!(AnalyticsLoader::resource_hints().len(), 4);
    }

    #[tokio::test]
    async fn loads_when_consent_already_granted() {
        let manager = manager();
        manager.accept_all();
        let mut loader = AnalyticsLoader::new("G-TEST").unwrap();

        let actions = loader.poll(&manager);

        assert!(loads_script(&actions));
        assert!(actions.contains(&AnalyticsAction::TrackPageView {
            delay: PAGE_VIEW_DELAY
        }));
        assert!(loader.poll(&manager).is_empty());
    }

    #[tokio::test]
    async fn loads_on_grant_edge_only() {
        let manager = manager();
        let mut loader = AnalyticsLoader::new("G-TEST").unwrap();

        assert!(loader.poll(&manager).is_empty());

        manager.update_preferences(PreferenceUpdate::default().analytics(true));
        assert!(loads_script(&loader.poll(&manager)));

        manager.update_preferences(PreferenceUpdate::default().analytics(false));
        assert!(loader.poll(&manager).is_empty());

        manager.update_preferences(PreferenceUpdate::default().analytics(true));
        let actions = loader.poll(&manager);
        assert!(!loads_script(&actions));
        assert!(actions.contains(&AnalyticsAction::TrackPageView {
            delay: PAGE_VIEW_DELAY
        }));
    }

    #[tokio::test]
    async fn ignores_analytics_flag_without_consent() {
        let manager = manager();
        let mut loader = AnalyticsLoader::new("G-TEST").unwrap();

        manager.reject_all();

        assert!(loader.poll(&manager).is_empty());
    }

    #[derive(Clone, Default)]
    struct RecordingHost(Arc<Mutex<Vec<AnalyticsAction>>>);

    impl TagHost for RecordingHost {
        fn apply(&mut self, action: AnalyticsAction) {
            self.0.lock().unwrap().push(action);
        }
    }

    #[tokio::test]
    async fn run_forwards_actions_to_host() {
        let manager = Arc::new(manager());
        manager.accept_all();
        let host = RecordingHost::default();
        let loader = AnalyticsLoader::new("G-TEST").unwrap();

        let task = tokio::spawn(loader.run(
            Arc::clone(&manager),
            host.clone(),
            Duration::from_millis(10),
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;
        task.abort();

        let actions = host.0.lock().unwrap().clone();
        assert_eq!(actions.len(), 3);
        assert!(loads_script(&actions));
    }
}
