//! Service configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// vizdiff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root directory for captured and diff artifacts
    pub output_dir: PathBuf,

    /// Per-navigation timeout in seconds
    pub navigation_timeout_secs: u64,

    /// Delay after the load event to let late network activity settle
    pub network_settle_ms: u64,

    /// Maximum batches processed at the same time
    pub max_concurrent_batches: usize,

    /// Maximum finished jobs retained in the job table
    pub max_retained_jobs: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("artifacts"),
            navigation_timeout_secs: 60,
            network_settle_ms: 500,
            max_concurrent_batches: 2,
            max_retained_jobs: 256,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)
            .map_err(|e| crate::error::Error::InvalidConfig(e.to_string()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_bounded() {
        let config = Config::default();
        assert_eq!(config.navigation_timeout_secs, 60);
        assert!(config.max_concurrent_batches >= 1);
        assert!(config.max_retained_jobs >= 1);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: Config = toml::from_str("output_dir = \"/tmp/shots\"").unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/tmp/shots"));
        assert_eq!(config.navigation_timeout_secs, 60);
    }
}
