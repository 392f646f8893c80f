//! Tuning knobs for latching and snapshot I/O
//!
//! Every struct has a `Default` that is good for a single machine; a full
//! [`GraphConfig`] can also be read from YAML or JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Retry budget of an element latch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatchConfig {
    /// Attempts that back off with CPU pause hints
    pub spin_attempts: u32,
    /// Further attempts that yield the thread before giving up
    pub yield_attempts: u32,
}

impl LatchConfig {
    /// Total number of acquisition attempts, never zero
    pub fn total_attempts(&self) -> u32 {
        self.spin_attempts.saturating_add(self.yield_attempts).max(1)
    }
}

impl Default for LatchConfig {
    fn default() -> Self {
        Self {
            spin_attempts: 32,
            yield_attempts: 16,
        }
    }
}

/// What the loader does with references that do not resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DanglingPolicy {
    /// Fail the load, listing every dangling reference
    #[default]
    Strict,
    /// Drop the offending edge or adjacency entry and report it
    Prune,
}

/// Snapshot save/load configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Number of table slots per partition file
    pub partition_size: usize,
    /// Worker threads for the save/load pool (0 = one per core)
    pub worker_threads: usize,
    /// Reference resolution policy on load
    pub dangling_policy: DanglingPolicy,
    /// fsync partition, index and manifest files before publishing
    pub sync_files: bool,
}

impl PersistenceConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.partition_size == 0 {
            return Err(ConfigError::Invalid(
                "partition_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            partition_size: 65_536,
            worker_threads: 0,
            dangling_policy: DanglingPolicy::Strict,
            sync_files: true,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub latch: LatchConfig,
    pub persistence: PersistenceConfig,
}

impl GraphConfig {
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: GraphConfig = serde_yaml::from_str(yaml)?;
        config.persistence.validate()?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: GraphConfig = serde_json::from_str(json)?;
        config.persistence.validate()?;
        Ok(config)
    }

    /// Load from a `.json` file, anything else is parsed as YAML
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_yaml_str(&text),
        }
    }
}
