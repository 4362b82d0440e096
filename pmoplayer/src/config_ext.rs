//! Extension de pmoconfig pour le coordinateur

use crate::settings::CoordinatorSettings;

/// Trait d'extension pour pmoconfig::Config
pub trait PlayerConfigExt {
    /// Lit les réglages `player.*` du coordinateur
    fn player_settings(&self) -> CoordinatorSettings;
}

impl PlayerConfigExt for pmoconfig::Config {
    fn player_settings(&self) -> CoordinatorSettings {
        let defaults = CoordinatorSettings::default();
        CoordinatorSettings {
            preload_next: self
                .get_player_preload_next()
                .unwrap_or(defaults.preload_next),
            skip_stamps: self
                .get_player_skip_stamps()
                .unwrap_or(defaults.skip_stamps),
            event_log: self.get_player_event_log().unwrap_or(defaults.event_log),
        }
    }
}
