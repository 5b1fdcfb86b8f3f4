//! Configuration types for Sentinel

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where alarm trigger notifications go besides the log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyChannel {
    /// Structured log line only
    #[default]
    Log,
    /// Log line plus an alarm event broadcast to bus observers
    EventBus,
}

/// Settings for the text-completion oracle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OracleConfig {
    /// Chat-completions endpoint; unset means offline
    pub endpoint: Option<String>,

    pub model: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: "gpt-3.5-turbo".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
        }
    }
}

/// Runtime configuration (sentinel.yaml / sentinel.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreConfig {
    pub monitoring_interval_seconds: u64,

    /// Bound on how long `Stop` waits for the worker
    pub monitor_stop_timeout_ms: u64,

    pub alarm_notify_channel: NotifyChannel,

    pub event_bus_history_limit: usize,

    /// Presentation-only pause after each bus record
    pub event_bus_broadcast_delay_ms: u64,

    /// Append-only interaction log; unset disables it
    pub history_log_path: Option<PathBuf>,

    /// SQLite file; unset means in-memory
    pub database_path: Option<PathBuf>,

    pub default_coin: String,

    pub oracle: OracleConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            monitoring_interval_seconds: 300,
            monitor_stop_timeout_ms: 1000,
            alarm_notify_channel: NotifyChannel::Log,
            event_bus_history_limit: 100,
            event_bus_broadcast_delay_ms: 0,
            history_log_path: None,
            database_path: None,
            default_coin: "ETH".to_string(),
            oracle: OracleConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Load configuration from a YAML or JSON file, chosen by extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Resolve the oracle API key from the configured environment variable
    pub fn with_env(mut self) -> Self {
        self.oracle.api_key = std::env::var(&self.oracle.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.monitoring_interval_seconds == 0 {
            return Err(CoreError::Config(
                "monitoringIntervalSeconds must be positive".to_string(),
            ));
        }
        if self.event_bus_history_limit == 0 {
            return Err(CoreError::Config(
                "eventBusHistoryLimit must be positive".to_string(),
            ));
        }
        if self.default_coin.trim().is_empty() {
            return Err(CoreError::Config("defaultCoin must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn monitoring_interval(&self) -> Duration {
        Duration::from_secs(self.monitoring_interval_seconds)
    }

    pub fn monitor_stop_timeout(&self) -> Duration {
        Duration::from_millis(self.monitor_stop_timeout_ms)
    }

    pub fn broadcast_delay(&self) -> Duration {
        Duration::from_millis(self.event_bus_broadcast_delay_ms)
    }
}
