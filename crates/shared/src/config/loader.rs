//! Configuration loader
//!
//! This module provides the ConfigLoader which is responsible for loading
//! configuration from .env files and environment variables.

use std::path::{Path, PathBuf};

use super::dto::{AdderConfig, TotalizerConfig};
use super::error::{ConfigError, Result};

/// Configuration loader
///
/// Handles loading configuration from:
/// 1. .env file (optional, loaded first so its values win)
/// 2. Environment variables
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Optional path to .env file
    env_file_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new ConfigLoader
    ///
    /// # Arguments
    ///
    /// * `env_file_path` - Optional path to .env file. If provided, the file
    ///   is loaded before reading environment variables.
    pub fn new(env_file_path: Option<PathBuf>) -> Self {
        Self { env_file_path }
    }

    /// Load the adder service configuration
    pub fn load_adder_config(&self) -> Result<AdderConfig> {
        self.load_env_file()?;
        AdderConfig::from_env()
    }

    /// Load the totalizer service configuration
    pub fn load_totalizer_config(&self) -> Result<TotalizerConfig> {
        self.load_env_file()?;
        TotalizerConfig::from_env()
    }

    fn load_env_file(&self) -> Result<()> {
        if let Some(path) = &self.env_file_path {
            Self::load_file(path)?;
        } else {
            // Best-effort load of a local .env, ignored when absent
            dotenv::dotenv().ok();
        }
        Ok(())
    }

    fn load_file(path: &Path) -> Result<()> {
        dotenv::from_path(path).map_err(|source| ConfigError::EnvFileLoad {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_env_file_is_an_error() {
        let loader = ConfigLoader::new(Some(PathBuf::from("/nonexistent/.env")));
        let result = loader.load_adder_config();
        assert!(matches!(result, Err(ConfigError::EnvFileLoad { .. })));
    }
}
