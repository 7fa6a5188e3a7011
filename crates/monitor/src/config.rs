//! Monitor configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! TOML file, then `FATIGUE_MONITOR__*` environment variables
//! (e.g. `FATIGUE_MONITOR__SESSION__USERNAME=driver7`).

use config::{Config, ConfigError, Environment, File};
use poll_scheduler::SchedulerConfig;
use reset_coordinator::{DetectionType, RestartGate, SessionContext, DEFAULT_USERNAME};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Config file read when `FATIGUE_MONITOR_CONFIG` is not set
pub const DEFAULT_CONFIG_FILE: &str = "fatigue-monitor.toml";

/// Environment variable naming an alternative config file
pub const CONFIG_PATH_ENV: &str = "FATIGUE_MONITOR_CONFIG";

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "FATIGUE_MONITOR";

/// Detector backend connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    /// Timeout for control requests (reset, stop, models)
    pub request_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5001".to_string(),
            request_timeout_ms: 5000,
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Initial session context
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub username: String,
    /// Empty means "ask the backend for its current model"
    pub model: String,
    pub detection_type: Option<DetectionType>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            username: DEFAULT_USERNAME.to_string(),
            model: String::new(),
            detection_type: Some(DetectionType::Camera),
        }
    }
}

impl SessionConfig {
    pub fn context(&self) -> SessionContext {
        SessionContext::new(&self.username, &self.model, self.detection_type)
    }
}

/// Logging output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete monitor configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub backend: BackendConfig,
    pub session: SessionConfig,
    pub polling: SchedulerConfig,
    pub restart: RestartGate,
    pub logging: LoggingConfig,
}

impl MonitorConfig {
    /// Load from the default file location and the environment
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(&path)
    }

    /// Load from `path` (may be missing) and the environment
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the timers cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.polling.validate().map_err(ConfigError::Message)?;
        if self.backend.request_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "backend.request_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
