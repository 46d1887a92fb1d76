//! Run configuration: which models to evaluate and how hard to push the
//! provider. Loaded from YAML by embedding applications; argv parsing is the
//! caller's business.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

fn default_max_workers() -> usize {
    8
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_base_ms() -> u64 {
    1_000
}

fn default_cap_ms() -> u64 {
    30_000
}

/// Backoff curve between transient-failure attempts. The curve is a tunable,
/// not a correctness knob.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BackoffConfig {
    #[serde(default = "default_base_ms")]
    pub base_ms: u64,
    #[serde(default = "default_cap_ms")]
    pub cap_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: default_base_ms(),
            cap_ms: default_cap_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Model identifiers; the job list is the cross-product with the cases.
    pub models: Vec<String>,
    /// Upper bound on concurrently in-flight inference jobs.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Total attempts per job, including the first.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Per-attempt timeout for the provider call.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            models: Vec::new(),
            max_workers: default_max_workers(),
            max_retries: default_max_retries(),
            timeout_seconds: default_timeout_seconds(),
            backoff: BackoffConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.is_empty() {
            return Err(ConfigError::Invalid("config has no models".into()));
        }
        if self.max_workers == 0 {
            return Err(ConfigError::Invalid("max_workers must be at least 1".into()));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid("max_retries must be at least 1".into()));
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "timeout_seconds must be at least 1".into(),
            ));
        }
        if self.backoff.cap_ms < self.backoff.base_ms {
            return Err(ConfigError::Invalid(
                "backoff cap_ms must be >= base_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: RunConfig = serde_yaml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

pub fn load_config(path: &Path) -> Result<RunConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    RunConfig::from_yaml_str(&raw)
}
