//! Connection gating and reconnect backoff.

use flowcanvas_core::ExecutionId;
use serde::Deserialize;
use std::time::Duration;

/// Telemetry reconnect settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReconnectConfig {
    /// Delay before the first connection attempt of an execution.
    /// Gives the backend time to propagate the execution's access token.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// First backoff delay after an unclean close.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound on any backoff delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Reconnect attempts before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    5
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Backoff schedule derived from a [`ReconnectConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Returns the delay before reconnect attempt `attempt` (zero-based).
    ///
    /// The delay doubles with each attempt and is capped at `max_delay`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Returns true if `attempts` failed reconnects exhaust the policy.
    #[must_use]
    pub fn exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}

impl From<&ReconnectConfig> for ReconnectPolicy {
    fn from(config: &ReconnectConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_attempts: config.max_attempts,
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from(&ReconnectConfig::default())
    }
}

/// Returns true if a telemetry socket should be open.
#[must_use]
pub fn should_connect(enabled: bool, execution_id: Option<&ExecutionId>, is_historical: bool) -> bool {
    enabled && execution_id.is_some() && !is_historical
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_has_correct_defaults() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay_ms, 500);
        assert_eq!(config.base_delay_ms, 1_000);
        assert_eq!(config.max_delay_ms, 30_000);
        assert_eq!(config.max_attempts, 5);
    }

    #[test]
    fn config_fills_missing_fields() {
        let config: ReconnectConfig = serde_json::from_str(r#"{ "max_attempts": 2 }"#).unwrap();
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.base_delay_ms, 1_000);
    }

    #[test]
    fn delay_doubles_and_caps() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (0..7).map(|a| policy.delay_for(a).as_millis() as u64).collect();
        assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000, 16_000, 30_000, 30_000]);
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn exhausted_after_max_attempts() {
        let policy = ReconnectPolicy::default();
        assert!(!policy.exhausted(4));
        assert!(policy.exhausted(5));
    }

    #[test]
    fn gate_requires_live_enabled_execution() {
        let id = ExecutionId::new("exec_1");
        assert!(should_connect(true, Some(&id), false));
        assert!(!should_connect(false, Some(&id), false));
        assert!(!should_connect(true, None, false));
        assert!(!should_connect(true, Some(&id), true));
    }
}
