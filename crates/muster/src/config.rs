//! Configuration values consumed by the engine.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Tunables for the gate and the scheduler. Mechanism-free: where these
/// come from (env, file, flags) is the embedder's business; [`from_env`]
/// is provided for the common case.
///
/// [`from_env`]: CoreConfig::from_env
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// How often the dispatch scheduler scans approved events.
    pub scan_interval: Duration,
    /// Upper bound of the pre-event hype window, in hours before start.
    pub hype_window_hours: i64,
    /// Calendar time an approval request stays open for a decision.
    pub approval_expiry: Duration,
    /// Time box on each chat-platform collaborator call.
    pub collaborator_timeout: Duration,
    /// Channel that receives hype reminders.
    pub announce_channel: String,
    /// Channel for operator alerts on infrastructure trouble. `None`
    /// disables alerting (errors are still logged and returned).
    pub operator_channel: Option<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(60),
            hype_window_hours: 72,
            approval_expiry: Duration::from_secs(24 * 60 * 60),
            collaborator_timeout: Duration::from_secs(30),
            announce_channel: String::new(),
            operator_channel: None,
        }
    }
}

impl CoreConfig {
    /// Load from environment variables, falling back to defaults for
    /// anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            scan_interval: env_secs("MUSTER_SCAN_INTERVAL_SECS", defaults.scan_interval),
            hype_window_hours: env_parse("MUSTER_HYPE_WINDOW_HOURS", defaults.hype_window_hours),
            approval_expiry: env_secs("MUSTER_APPROVAL_EXPIRY_SECS", defaults.approval_expiry),
            collaborator_timeout: env_secs(
                "MUSTER_COLLABORATOR_TIMEOUT_SECS",
                defaults.collaborator_timeout,
            ),
            announce_channel: env::var("MUSTER_ANNOUNCE_CHANNEL").unwrap_or_default(),
            operator_channel: env::var("MUSTER_OPERATOR_CHANNEL").ok(),
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_secs(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = CoreConfig::default();
        assert_eq!(config.scan_interval, Duration::from_secs(60));
        assert_eq!(config.hype_window_hours, 72);
        assert_eq!(config.approval_expiry, Duration::from_secs(86_400));
        assert_eq!(config.collaborator_timeout, Duration::from_secs(30));
    }
}
