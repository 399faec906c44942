//! Driver configuration.
//!
//! All timing knobs used by the player and the state subscription strategy
//! live here so embedders can tune them in one place (slower hosts need a
//! coarser poll interval, CI needs longer timeouts).

use serde::{Deserialize, Serialize};

use crate::toolkit::ToolkitVariant;

/// Default readiness deadline for a playable, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Default pause between an event playable being shifted and its first
/// readiness check.
pub const DEFAULT_EVENT_DELAY_MS: u64 = 25;

/// Tuning for the player and the fluent layer.
///
/// A timeout of `0` anywhere means "disabled".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DriverConfig {
    /// Deadline applied to playables that do not carry their own timeout.
    pub default_timeout_ms: u64,

    /// Delay before the first readiness check of an injected-event playable.
    /// Non-event playables default to no delay.
    pub event_delay_ms: u64,

    /// Re-poll interval while a playable is not ready.
    pub poll_interval_ms: u64,

    /// Settle window after a state subscription fires before the predicate
    /// is re-checked.
    pub debounce_ms: u64,

    /// Grace period before visual indicators are hidden once the queue ends.
    pub pointer_grace_ms: u64,

    /// Capture callback failures and route them through the player's error
    /// path. When disabled, callback failures propagate to the host.
    pub catch_errors: bool,

    /// Widget-library variant the state registry is built for.
    pub variant: ToolkitVariant,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            event_delay_ms: DEFAULT_EVENT_DELAY_MS,
            poll_interval_ms: 25,
            debounce_ms: 40,
            pointer_grace_ms: 250,
            catch_errors: true,
            variant: ToolkitVariant::default(),
        }
    }
}

impl DriverConfig {
    /// A configuration suited to deterministic tests: no event delay, tight
    /// polling, instant indicator teardown.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            event_delay_ms: 0,
            poll_interval_ms: 1,
            debounce_ms: 1,
            pointer_grace_ms: 0,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_json() {
        let config = DriverConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: DriverConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: DriverConfig =
            serde_json::from_str(r#"{"default-timeout-ms": 250}"#).unwrap();
        assert_eq!(config.default_timeout_ms, 250);
        assert_eq!(config.event_delay_ms, DEFAULT_EVENT_DELAY_MS);
        assert!(config.catch_errors);
    }
}
