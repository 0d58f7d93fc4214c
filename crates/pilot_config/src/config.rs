use std::path::PathBuf;

use derive_setters::Setters;
use serde::{Deserialize, Serialize};

use crate::{NarrationConfig, QuotaConfig, WatchdogConfig};

/// Runtime configuration of the controller and the `pilot` binary.
#[derive(Debug, Clone, Serialize, Deserialize, Setters, PartialEq)]
#[serde(rename_all = "snake_case")]
#[setters(into)]
pub struct PilotConfig {
    /// Directory for rolling log files. Logs go to stderr when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Workspace that owns newly created conversations
    pub workspace_id: String,
    /// Maximum characters of a title derived from the first instruction
    pub title_max_chars: usize,
    pub narration: NarrationConfig,
    pub quota: QuotaConfig,
    pub watchdog: WatchdogConfig,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            workspace_id: "default".to_string(),
            title_max_chars: 60,
            narration: NarrationConfig::default(),
            quota: QuotaConfig::default(),
            watchdog: WatchdogConfig::default(),
        }
    }
}

impl PilotConfig {
    /// Loads configuration from the embedded `env.json` defaults, overridden
    /// by environment variables prefixed with `PILOT_`. Nested keys use a
    /// double underscore:
    ///
    /// - `PILOT_LOG_DIR` -> `log_dir`
    /// - `PILOT_QUOTA__DAILY_ACTION_LIMIT` -> `quota.daily_action_limit`
    /// - `PILOT_WATCHDOG__IDLE_TIMEOUT_SECS` -> `watchdog.idle_timeout_secs`
    ///
    /// # Errors
    /// Returns an error if a value cannot be parsed into its field type
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_environment(Self::environment())
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix("PILOT")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn from_environment(environment: config::Environment) -> Result<Self, config::ConfigError> {
        const DEFAULT_CONFIG: &str = include_str!("../env.json");

        let config = config::Config::builder()
            .add_source(config::File::from_str(
                DEFAULT_CONFIG,
                config::FileFormat::Json,
            ))
            .add_source(environment)
            .build()?;

        let loaded: Self = config.try_deserialize()?;
        tracing::debug!(
            workspace_id = %loaded.workspace_id,
            daily_action_limit = ?loaded.quota.daily_action_limit,
            "Loaded configuration"
        );
        Ok(loaded)
    }
}
