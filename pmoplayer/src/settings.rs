//! Runtime switches of the coordinator.

/// Behaviour toggles read once when the coordinator is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    /// Allow speculative warm-up of the next episode
    pub preload_next: bool,
    /// Fetch skip stamps when asked to
    pub skip_stamps: bool,
    /// Log every streamed candidate at debug level
    pub event_log: bool,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            preload_next: true,
            skip_stamps: true,
            event_log: false,
        }
    }
}
