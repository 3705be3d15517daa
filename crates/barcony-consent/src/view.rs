//! View model for the consent banner.

use crate::manager::{ConsentManager, ConsentSessionState};

/// Which part of the banner is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerPanel {
    Hidden,
    Main,
    Preferences,
}

/// What the banner renders on each refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BannerView {
    pub panel: BannerPanel,
    pub analytics: bool,
    pub marketing: bool,
    pub preferences: bool,
}

impl BannerView {
    pub fn from_state(state: &ConsentSessionState) -> Self {
        let panel = match (state.show_banner, state.showing_preferences_panel) {
            (false, _) => BannerPanel::Hidden,
            (true, false) => BannerPanel::Main,
            (true, true) => BannerPanel::Preferences,
        };
        let prefs = state.current_preferences;

        Self {
            panel,
            analytics: prefs.analytics,
            marketing: prefs.marketing,
            preferences: prefs.preferences,
        }
    }

    pub fn from_manager(manager: &ConsentManager) -> Self {
        Self::from_state(&manager.snapshot())
    }
}
