//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Current directory: ./exco.toml or ./.exco/config.toml
//! 2. User config: ~/.exco/config.toml
//! 3. System config: /etc/exco/config.toml
//! 4. Built-in defaults

use super::simulate::SimulationConfig;
use crate::{env, task::TaskManagerConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env as std_env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Complete configuration file contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub task_manager: TaskManagerConfig,
    pub simulation: SimulationConfig,
}

impl CoordinatorConfig {
    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::from_toml_str(&content).with_context(|| format!("Invalid config file {:?}", path))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save to TOML file, creating parent directories
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
        fs::write(path, self.to_toml_string()?)
            .with_context(|| format!("Failed to write config file {:?}", path))?;
        Ok(())
    }
}

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Discover and load configuration using the hierarchy
    pub fn discover_config() -> Result<CoordinatorConfig> {
        if let Some(config_path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", config_path);
            return CoordinatorConfig::from_toml_file(config_path);
        }

        info!("No configuration file found, using defaults");
        Ok(CoordinatorConfig::default())
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        Self::get_config_candidates()
            .into_iter()
            .inspect(|candidate| debug!("Checking for config file: {:?}", candidate))
            .find(|candidate| candidate.is_file())
    }

    /// Get list of configuration file candidates in priority order
    fn get_config_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Ok(current_dir) = std_env::current_dir() {
            candidates.extend(env::local_config_file_paths(&current_dir));
        }

        if let Some(home_dir) = Self::get_home_dir() {
            candidates.push(env::user_config_file_path(&home_dir));
        }

        #[cfg(unix)]
        candidates.push(PathBuf::from("/etc/exco/config.toml"));

        #[cfg(windows)]
        if let Ok(program_data) = std_env::var("PROGRAMDATA") {
            candidates.push(PathBuf::from(program_data).join("exco").join("config.toml"));
        }

        candidates
    }

    fn get_home_dir() -> Option<PathBuf> {
        std_env::var("HOME")
            .ok()
            .or_else(|| std_env::var("USERPROFILE").ok())
            .map(PathBuf::from)
    }

    /// Show configuration discovery information for debugging
    pub fn show_discovery_info() {
        println!("Configuration Discovery Hierarchy:");
        println!();

        for (i, candidate) in Self::get_config_candidates().iter().enumerate() {
            let status = if candidate.is_file() {
                "✓ EXISTS"
            } else if candidate.exists() {
                "✗ NOT A FILE"
            } else {
                "✗ NOT FOUND"
            };
            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        println!();
        match Self::find_config_file() {
            Some(found) => println!("Active configuration: {:?}", found),
            None => println!("Active configuration: Built-in defaults"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::StorageFormat;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = CoordinatorConfig::default();

        assert_eq!(
            config.task_manager.inactive_timeout_secs,
            env::DEFAULT_TASK_INACTIVE_TIMEOUT_SECS
        );
        assert_eq!(config.task_manager.storage_format, StorageFormat::Sqlite);
        assert!(config.simulation.validate().is_ok());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = CoordinatorConfig::from_toml_str(
            r#"
            [task_manager]
            inactive_timeout_secs = 30
            storage_format = "redis"
            "#,
        )
        .unwrap();

        assert_eq!(config.task_manager.inactive_timeout_secs, 30);
        assert_eq!(config.task_manager.storage_format, StorageFormat::Redis);
        assert!(!config.task_manager.enable_task_profiling);
        assert_eq!(config.simulation, SimulationConfig::default());
    }

    #[test]
    fn test_invalid_storage_format_is_rejected() {
        let result = CoordinatorConfig::from_toml_str(
            r#"
            [task_manager]
            storage_format = "parquet"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_config_file_operations() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("exco.toml");

        let mut original = CoordinatorConfig::default();
        original.simulation.seed = Some(7);
        original.simulation.workers = 2;

        original.to_toml_file(&config_path).unwrap();
        assert!(config_path.exists());

        let loaded = CoordinatorConfig::from_toml_file(&config_path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_missing_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = CoordinatorConfig::from_toml_file(temp_dir.path().join("absent.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_candidates() {
        let candidates = ConfigDiscovery::get_config_candidates();

        assert!(!candidates.is_empty());
        assert_eq!(candidates[0].file_name().unwrap(), "exco.toml");
    }
}
