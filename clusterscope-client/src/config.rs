//! Configuration loading for the clusterscope client.
//!
//! All fields are required unless explicitly marked optional. No defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the leading master, e.g. `http://master.local:5050`.
    pub master_url: String,
    pub log_format: LogFormat,
    /// Optional HTTP basic credentials.
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    pub backoff: BackoffConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    pub principal: String,
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackoffConfig {
    pub initial_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
    pub countdown_tick_ms: u64,
    pub restart_grace_ms: u64,
}

impl BackoffConfig {
    pub fn initial(&self) -> Duration {
        Duration::from_millis(self.initial_ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    pub fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms)
    }

    pub fn restart_grace(&self) -> Duration {
        Duration::from_millis(self.restart_grace_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or CLUSTERSCOPE_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ClientConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.master_url.trim();
        if url.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "master_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                field: "master_url",
                reason: "must start with http:// or https://".to_string(),
            });
        }
        if let Some(auth) = &self.auth {
            if auth.principal.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "auth.principal",
                    reason: "must not be empty".to_string(),
                });
            }
        }
        if self.backoff.initial_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "backoff.initial_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.backoff.max_ms < self.backoff.initial_ms {
            return Err(ConfigError::InvalidValue {
                field: "backoff.max_ms",
                reason: "must be >= initial_ms".to_string(),
            });
        }
        if !self.backoff.multiplier.is_finite() || self.backoff.multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "backoff.multiplier",
                reason: "must be a finite number >= 1.0".to_string(),
            });
        }
        if self.backoff.countdown_tick_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "backoff.countdown_tick_ms",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }

    /// Master URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.master_url.trim().trim_end_matches('/')
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("CLUSTERSCOPE_CONFIG").ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
