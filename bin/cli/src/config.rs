//! CLI configuration.
//!
//! Loaded via the `config` crate from `FLOWCANVAS_`-prefixed environment
//! variables. Nested sections use `__`, e.g.
//! `FLOWCANVAS_RECONNECT__MAX_ATTEMPTS=3`.

use flowcanvas_execution::ReconnectConfig;
use serde::Deserialize;
use std::path::PathBuf;

/// Configuration shared by every subcommand.
#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    /// Base URL of the workflow HTTP API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Base URL of the telemetry WebSocket endpoint.
    #[serde(default = "default_telemetry_url")]
    pub telemetry_url: String,

    /// Bearer token for the API and telemetry endpoints.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Directory holding the preference file.
    #[serde(default = "default_preferences_dir")]
    pub preferences_dir: PathBuf,

    /// Telemetry reconnect settings.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

fn default_api_base_url() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_telemetry_url() -> String {
    "ws://localhost:3000/ws".to_string()
}

fn default_preferences_dir() -> PathBuf {
    PathBuf::from(".flowcanvas")
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            telemetry_url: default_telemetry_url(),
            api_token: None,
            preferences_dir: default_preferences_dir(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl CliConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::with_prefix("FLOWCANVAS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_config_has_correct_defaults() {
        let config = CliConfig::default();
        assert_eq!(config.api_base_url, "http://localhost:3000/api");
        assert_eq!(config.telemetry_url, "ws://localhost:3000/ws");
        assert!(config.api_token.is_none());
        assert_eq!(config.reconnect.max_attempts, 5);
    }

    #[test]
    fn empty_source_deserializes_to_defaults() {
        let config: CliConfig = config::Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.preferences_dir, PathBuf::from(".flowcanvas"));
        assert_eq!(config.reconnect.initial_delay_ms, 500);
    }
}
