//! Consent state machine.
//!
//! [`ConsentManager`] is the explicit context object owning the session's
//! consent state. The hosting application creates one per page session and
//! hands `Arc<ConsentManager>` to the banner UI and the analytics loader.
//!
//! Mutations take effect in memory immediately. Persistence is queued to a
//! single writer task so records are written in mutation order but never
//! awaited by the caller; use [`ConsentManager::flush`] when confirmed
//! durability is needed.

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{broadcast, mpsc, oneshot};

use crate::preferences::{ConsentPreferences, PreferenceUpdate};
use crate::signal::SignalBridge;
use crate::store::PreferenceStore;

/// In-memory consent state for one page session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsentSessionState {
    pub current_preferences: ConsentPreferences,
    /// The visitor made an explicit choice, now or in a stored record
    pub consent_given: bool,
    pub show_banner: bool,
    pub showing_preferences_panel: bool,
}

impl Default for ConsentSessionState {
    fn default() -> Self {
        Self {
            current_preferences: ConsentPreferences::default(),
            consent_given: false,
            show_banner: true,
            showing_preferences_panel: false,
        }
    }
}

/// Notifications published to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsentEvent {
    /// No valid stored choice exists; the banner should present itself
    BannerRequested,

    /// State changed; subscribers should re-render
    Changed(ConsentSessionState),
}

enum PersistRequest {
    Save(ConsentPreferences),
    Flush(oneshot::Sender<()>),
}

/// Owner of the consent session state.
pub struct ConsentManager {
    state: RwLock<ConsentSessionState>,
    store: Arc<PreferenceStore>,
    bridge: SignalBridge,
    events: broadcast::Sender<ConsentEvent>,
    writer: mpsc::UnboundedSender<PersistRequest>,
}

impl ConsentManager {
    /// Create a manager in the initial state.
    ///
    /// Spawns the persistence writer, so this must be called from within a
    /// Tokio runtime. Subscribe before calling [`init`](Self::init) to
    /// receive the banner request.
    pub fn new(store: Arc<PreferenceStore>, bridge: SignalBridge) -> Self {
        let (events, _) = broadcast::channel(64);
        let (writer, rx) = mpsc::unbounded_channel();

        tokio::spawn(run_writer(Arc::clone(&store), rx));

        Self {
            state: RwLock::new(ConsentSessionState::default()),
            store,
            bridge,
            events,
            writer,
        }
    }

    /// Issue the default signal and restore any stored choice.
    ///
    /// Returns `true` when a valid stored record was applied. Otherwise a
    /// [`ConsentEvent::BannerRequested`] is published.
    pub fn init(&self) -> bool {
        self.bridge.send_default_signal();

        match self.store.load() {
            Some(record) => {
                let preferences = record.preferences;
                self.mutate(|state| {
                    state.current_preferences = preferences;
                    state.consent_given = true;
                    state.show_banner = false;
                });
                self.bridge.send_update_signal(&preferences);
                tracing::debug!("Restored stored consent preferences");
                true
            }
            None => {
                let _ = self.events.send(ConsentEvent::BannerRequested);
                false
            }
        }
    }

    /// Subscribe to state change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ConsentEvent> {
        self.events.subscribe()
    }

    /// Copy of the current preferences.
    pub fn preferences(&self) -> ConsentPreferences {
        self.snapshot().current_preferences
    }

    pub fn is_consent_given(&self) -> bool {
        self.snapshot().consent_given
    }

    pub fn should_show_banner(&self) -> bool {
        self.snapshot().show_banner
    }

    pub fn is_showing_preferences(&self) -> bool {
        self.snapshot().showing_preferences_panel
    }

    /// Copy of the whole session state.
    pub fn snapshot(&self) -> ConsentSessionState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Grant every category and close the banner.
    pub fn accept_all(&self) {
        let state = self.mutate(|state| {
            state.current_preferences = ConsentPreferences::all();
            state.consent_given = true;
            state.show_banner = false;
            state.showing_preferences_panel = false;
        });
        self.commit(state);
    }

    /// Deny every optional category and close the banner.
    pub fn reject_all(&self) {
        let state = self.mutate(|state| {
            state.current_preferences = ConsentPreferences::default();
            state.consent_given = true;
            state.show_banner = false;
            state.showing_preferences_panel = false;
        });
        self.commit(state);
    }

    /// Merge a partial change. Banner visibility is left untouched.
    pub fn update_preferences(&self, update: PreferenceUpdate) {
        let state = self.mutate(|state| {
            state.current_preferences = state.current_preferences.merge(update);
            state.consent_given = true;
        });
        self.commit(state);
    }

    pub fn show_preferences(&self) {
        self.mutate(|state| state.showing_preferences_panel = true);
    }

    pub fn hide_preferences(&self) {
        self.mutate(|state| state.showing_preferences_panel = false);
    }

    /// Bring the banner back with the preferences panel open.
    pub fn reopen_consent_dialog(&self) {
        self.mutate(|state| {
            state.show_banner = true;
            state.showing_preferences_panel = true;
        });
    }

    /// Wait until every save queued so far has been applied.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.writer.send(PersistRequest::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Apply `f` to the state and publish the result.
    fn mutate(&self, f: impl FnOnce(&mut ConsentSessionState)) -> ConsentSessionState {
        let snapshot = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            f(&mut state);
            *state
        };
        let _ = self.events.send(ConsentEvent::Changed(snapshot));
        snapshot
    }

    /// Queue persistence and signal the vendor.
    fn commit(&self, state: ConsentSessionState) {
        let preferences = state.current_preferences;
        if self.writer.send(PersistRequest::Save(preferences)).is_err() {
            tracing::error!("Consent writer stopped, preferences not persisted");
        }
        self.bridge.send_update_signal(&preferences);
    }
}

async fn run_writer(store: Arc<PreferenceStore>, mut rx: mpsc::UnboundedReceiver<PersistRequest>) {
    while let Some(request) = rx.recv().await {
        match request {
            PersistRequest::Save(preferences) => {
                store.save(&preferences);
            }
            PersistRequest::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::KeyValueStorage;
    use crate::config::ConsentConfig;
    use crate::cookie::CookieStorage;
    use crate::signal::DataLayer;
    use pretty_assertions::assert_eq;

    struct Fixture {
        local: Arc<KeyValueStorage>,
        store: Arc<PreferenceStore>,
        layer: Arc<DataLayer>,
    }

    impl Fixture {
        fn new() -> Self {
            let local = Arc::new(KeyValueStorage::new());
            let cookies = Arc::new(CookieStorage::new(365, false));
            let store = Arc::new(PreferenceStore::new(
                ConsentConfig::default(),
                vec![local.clone(), cookies],
            ));
            Self {
                local,
                store,
                layer: Arc::new(DataLayer::new()),
            }
        }

        fn manager(&self) -> ConsentManager {
            ConsentManager::new(self.store.clone(), SignalBridge::new(self.layer.clone()))
        }
    }

    #[tokio::test]
    async fn fresh_session_shows_banner_with_defaults() {
        let f = Fixture::new();
        let manager = f.manager();
        let mut events = manager.subscribe();

        assert!(!manager.init());

        assert_eq!(manager.preferences(), ConsentPreferences::default());
        assert!(manager.should_show_banner());
        assert!(!manager.is_consent_given());
        assert_eq!(events.try_recv().unwrap(), ConsentEvent::BannerRequested);
        assert_eq!(f.layer.entries().len(), 2);
    }

    #[tokio::test]
    async fn restores_stored_record() {
        let f = Fixture::new();
        let stored = ConsentPreferences::new(true, false, true);
        f.store.save(&stored);

        let manager = f.manager();
        assert!(manager.init());

        assert!(manager.is_consent_given());
        assert!(!manager.should_show_banner());
        assert_eq!(manager.preferences(), stored);

        let entries = f.layer.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2][2]["analytics_storage"], "granted");
        assert_eq!(entries[2][2]["ad_storage"], "denied");
    }

    #[tokio::test]
    async fn accept_all_grants_everything_and_persists() {
        let f = Fixture::new();
        let manager = f.manager();
        manager.init();
        manager.show_preferences();

        manager.accept_all();

        assert_eq!(manager.preferences(), ConsentPreferences::all());
        assert!(!manager.should_show_banner());
        assert!(!manager.is_showing_preferences());

        manager.flush().await;
        assert_eq!(
            f.store.load().unwrap().preferences,
            ConsentPreferences::all()
        );
    }

    #[tokio::test]
    async fn reject_all_restores_defaults() {
        let f = Fixture::new();
        let manager = f.manager();
        manager.accept_all();

        manager.reject_all();

        assert_eq!(manager.preferences(), ConsentPreferences::default());
        assert!(manager.preferences().necessary());
        assert!(manager.is_consent_given());
        assert!(!manager.should_show_banner());
        assert!(!manager.is_showing_preferences());

        manager.flush().await;
        assert_eq!(
            f.store.load().unwrap().preferences,
            ConsentPreferences::default()
        );
    }

    #[tokio::test]
    async fn update_merges_and_keeps_necessary() {
        let f = Fixture::new();
        let manager = f.manager();
        manager.init();

        manager.update_preferences(PreferenceUpdate::default().analytics(true));
        manager.update_preferences(PreferenceUpdate::default().preferences(true));

        let prefs = manager.preferences();
        assert!(prefs.necessary());
        assert!(prefs.analytics);
        assert!(!prefs.marketing);
        assert!(prefs.preferences);
        assert!(manager.is_consent_given());
        assert!(manager.should_show_banner());
    }

    #[tokio::test]
    async fn update_leaves_panel_flags_alone() {
        let f = Fixture::new();
        let manager = f.manager();
        manager.show_preferences();

        manager.update_preferences(PreferenceUpdate::default().marketing(true));

        assert!(manager.should_show_banner());
        assert!(manager.is_showing_preferences());
    }

    #[tokio::test]
    async fn reopen_keeps_saved_preferences() {
        let f = Fixture::new();
        let manager = f.manager();
        manager.update_preferences(PreferenceUpdate::default().analytics(true));
        manager.reject_all();
        manager.flush().await;

        manager.reopen_consent_dialog();

        assert!(manager.should_show_banner());
        assert!(manager.is_showing_preferences());
        assert_eq!(manager.preferences(), ConsentPreferences::default());
        assert_eq!(
            f.store.load().unwrap().preferences,
            ConsentPreferences::default()
        );
    }

    #[tokio::test]
    async fn panel_toggles_do_not_persist_or_signal() {
        let f = Fixture::new();
        let manager = f.manager();

        manager.show_preferences();
        assert!(manager.is_showing_preferences());
        manager.hide_preferences();
        assert!(!manager.is_showing_preferences());

        manager.flush().await;
        assert!(f.store.load().is_none());
        assert!(f.layer.entries().is_empty());
    }

    #[tokio::test]
    async fn every_subscriber_sees_changes() {
        let f = Fixture::new();
        let manager = f.manager();
        let mut first = manager.subscribe();
        let mut second = manager.subscribe();

        manager.accept_all();

        for rx in [&mut first, &mut second] {
            match rx.try_recv().unwrap() {
                ConsentEvent::Changed(state) => {
                    assert_eq!(state.current_preferences, ConsentPreferences::all());
                    assert!(!state.show_banner);
                }
                other => panic!("Expected Changed event, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn saves_apply_in_mutation_order() {
        let f = Fixture::new();
        let manager = f.manager();

        manager.accept_all();
        manager.reject_all();
        manager.update_preferences(PreferenceUpdate::default().marketing(true));
        manager.flush().await;

        let stored = f.store.load().unwrap().preferences;
        assert_eq!(stored, ConsentPreferences::new(false, true, false));
    }

    #[tokio::test]
    async fn storage_failure_keeps_in_memory_state() {
        let f = Fixture::new();
        let manager = ConsentManager::new(
            Arc::new(PreferenceStore::new(
                ConsentConfig::default(),
                vec![f.local.clone()],
            )),
            SignalBridge::detached(),
        );
        f.local.set_enabled(false);

        manager.accept_all();
        manager.flush().await;

        assert_eq!(manager.preferences(), ConsentPreferences::all());
        assert!(!manager.should_show_banner());
    }

    #[tokio::test]
    async fn returned_preferences_are_copies() {
        let f = Fixture::new();
        let manager = f.manager();

        let mut prefs = manager.preferences();
        prefs.analytics = true;

        assert!(!manager.preferences().analytics);
    }
}
