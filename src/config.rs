//! ShoalFS cluster configuration
//!
//! One TOML file describes the whole cluster to every participant: the
//! metadata authority endpoint, the ordered shard endpoints (position in the
//! list IS the shard index), and the placement strategy clients apply.

use serde::{Deserialize, Serialize};

/// Default configuration constants
pub mod defaults {

    /// Default block size: 4KB
    pub const BLOCK_SIZE: usize = crate::metadata::BLOCK_SIZE;

    /// Default metadata authority endpoint
    pub const fn default_metadata_addr() -> &'static str {
        "127.0.0.1:6000"
    }

    /// Default log level
    pub const fn default_log_level() -> &'static str {
        "info"
    }
}

/// Placement strategy selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlacementMode {
    /// Digest modulo shard count
    #[default]
    Deterministic,

    /// Probe all shards per block, pick the lowest round trip
    LatencyProbe,
}

/// ShoalFS cluster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Metadata authority endpoint (host:port)
    #[serde(default = "default_metadata_addr")]
    pub metadata_addr: String,

    /// Ordered shard endpoints; the position in this list is the shard index
    /// referenced by every hashlist
    pub shards: Vec<String>,

    /// Placement strategy applied by clients
    #[serde(default)]
    pub placement: PlacementMode,

    /// Block size in bytes (default: 4KB)
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_metadata_addr() -> String {
    defaults::default_metadata_addr().to_string()
}

fn default_block_size() -> usize {
    defaults::BLOCK_SIZE
}

fn default_log_level() -> String {
    defaults::default_log_level().to_string()
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            metadata_addr: default_metadata_addr(),
            shards: vec![
                "127.0.0.1:5001".to_string(),
                "127.0.0.1:5002".to_string(),
            ],
            placement: PlacementMode::default(),
            block_size: default_block_size(),
            log_level: default_log_level(),
        }
    }
}

impl ClusterConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("Failed to read config file: {}", e)))?;

        let config: ClusterConfig = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self).map_err(|e| {
            ConfigError::SerializeError(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, contents)
            .map_err(|e| ConfigError::WriteError(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Number of shards (B)
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.metadata_addr.is_empty() {
            return Err(ConfigError::ValidationError(
                "Metadata authority address cannot be empty".to_string(),
            ));
        }

        if self.shards.is_empty() {
            return Err(ConfigError::ValidationError(
                "At least one shard endpoint is required".to_string(),
            ));
        }

        if self.shards.iter().any(|addr| addr.is_empty()) {
            return Err(ConfigError::ValidationError(
                "Shard endpoints cannot be empty".to_string(),
            ));
        }

        if self.block_size == 0 {
            return Err(ConfigError::ValidationError(
                "Block size must be greater than zero".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {}",
                    self.log_level
                )));
            }
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Failed to serialize config: {0}")]
    SerializeError(String),

    #[error("Failed to write config: {0}")]
    WriteError(String),

    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}
