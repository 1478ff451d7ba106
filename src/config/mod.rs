//! Configuration module for colony
//!
//! Engine-wide settings: where persisted node values live, the default
//! worker pool shape, and logging.
//!
//! # Config Location
//!
//! Without an explicit path the config is read from the platform config
//! directory:
//! - **Linux**: `~/.config/colony/colony.toml`
//! - **macOS**: `~/Library/Application Support/colony/colony.toml`
//! - **Windows**: `%APPDATA%\colony\colony.toml`
//!
//! Files ending in `.json` are parsed as JSON, everything else as TOML.
//!
//! # Example
//!
//! ```toml
//! [persistence]
//! folder = "/var/lib/colony"
//!
//! [workers]
//! pool_size = 4
//! kind = "process"
//!
//! [logging]
//! filter = "info,colony=trace"
//! directory = "/var/log/colony"
//! ```

use crate::error::{ColonyError, Result};
use crate::worker::{ExecutorKind, WorkerStrategy, DEFAULT_POOL_SIZE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application directory name under the platform config directory
pub const APP_DIR: &str = "colony";

/// Config filename
pub const CONFIG_FILE: &str = "colony.toml";

/// Default log filter when neither `RUST_LOG` nor the config sets one
pub const DEFAULT_LOG_FILTER: &str = "info,colony=debug";

// ==================== Config Directory ====================

/// Get the default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_DIR).join(CONFIG_FILE))
}

// ==================== Sections ====================

/// Where persisted node values are stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Folder holding one file per persisted variable
    #[serde(default = "default_persistence_folder")]
    pub folder: PathBuf,
}

/// Folder used for persisted values when none is configured
pub fn default_persistence_folder() -> PathBuf {
    std::env::temp_dir()
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            folder: default_persistence_folder(),
        }
    }
}

/// Default shape of concurrent worker pools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    #[serde(default)]
    pub kind: ExecutorKind,
}

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            kind: ExecutorKind::default(),
        }
    }
}

impl WorkerConfig {
    /// Pool strategy described by this section
    pub fn strategy(&self) -> WorkerStrategy {
        WorkerStrategy::Pool {
            kind: self.kind,
            size: self.pool_size,
        }
    }
}

/// Logging settings for the binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// When set, logs are also written to a daily-rolling file here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            directory: None,
        }
    }
}

// ==================== Engine Config ====================

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub persistence: PersistenceConfig,

    #[serde(default)]
    pub workers: WorkerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

impl EngineConfig {
    /// Load config from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ColonyError::Config(format!("Failed to read config: {}", e)))?;

        let config = if is_json(path) {
            Self::from_json(&content)?
        } else {
            Self::from_toml(&content)?
        };
        config.validate()?;

        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load from `path`, or the default location when `None`, returning
    /// defaults on any error
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
            Some(path) => path,
            None => return Self::default(),
        };
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save config to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ColonyError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = if is_json(path) {
            serde_json::to_string_pretty(self)
                .map_err(|e| ColonyError::Config(format!("Failed to serialize config: {}", e)))?
        } else {
            self.to_toml()?
        };

        std::fs::write(path, content)
            .map_err(|e| ColonyError::Config(format!("Failed to write config: {}", e)))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ColonyError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ColonyError::Config(format!("Failed to serialize config: {}", e)))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| ColonyError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.workers.pool_size == 0 {
            return Err(ColonyError::Config(
                "workers.pool_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.workers.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(config.workers.kind, ExecutorKind::Thread);
        assert_eq!(config.persistence.folder, std::env::temp_dir());
        assert_eq!(config.logging.filter, DEFAULT_LOG_FILTER);
        assert!(config.logging.directory.is_none());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            [workers]
            kind = "process"
            "#,
        )
        .unwrap();
        assert_eq!(config.workers.kind, ExecutorKind::Process);
        assert_eq!(config.workers.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(
            config.workers.strategy(),
            WorkerStrategy::process_pool(DEFAULT_POOL_SIZE)
        );
    }

    #[test]
    fn test_save_and_load_toml_and_json() {
        let dir = TempDir::new().unwrap();
        let mut config = EngineConfig::default();
        config.persistence.folder = dir.path().join("state");
        config.workers.pool_size = 3;
        config.logging.directory = Some(dir.path().join("logs"));

        for file in ["colony.toml", "colony.json"] {
            let path = dir.path().join(file);
            config.save(&path).unwrap();
            assert_eq!(EngineConfig::load(&path).unwrap(), config);
        }
    }

    #[test]
    fn test_zero_pool_size_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[workers]\npool_size = 0\n").unwrap();

        assert!(EngineConfig::load(&path).is_err());
        assert_eq!(
            EngineConfig::load_or_default(Some(&path)),
            EngineConfig::default()
        );
    }

    #[test]
    fn test_malformed_falls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "workers = [").unwrap();
        assert_eq!(
            EngineConfig::load_or_default(Some(&path)),
            EngineConfig::default()
        );
    }
}
