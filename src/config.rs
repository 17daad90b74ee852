//! Application Configuration
//!
//! This module provides configuration management for the application,
//! supporting YAML configuration files with sensible defaults and a couple of
//! environment overrides for the storage location.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use log::{info, warn};

/// Environment variable naming an alternative config file
pub const CONFIG_ENV: &str = "CSV_VAULT_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Storage backend types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Blobs and ledger on the local filesystem
    #[default]
    Local,
    /// Everything in memory; nothing survives a restart
    Mock,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "localfs" | "fs" => Ok(StorageBackend::Local),
            "mock" | "memory" => Ok(StorageBackend::Mock),
            _ => Err(format!("Unknown storage backend: {}", s)),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Number of worker threads
    pub workers: usize,
    /// Maximum upload size in bytes
    pub max_payload_size: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            workers: 4,
            max_payload_size: 100 * 1024 * 1024, // 100MB
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory holding blobs, sidecars and the ledger
    pub base_path: String,
    /// Ledger file name, relative to `base_path`
    pub ledger_file: String,
    /// Length of generated file names
    pub name_length: usize,
    /// Attempts at a fresh name before giving up
    pub max_name_attempts: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            base_path: "./uploaded_files".to_string(),
            ledger_file: "user_files.json".to_string(),
            name_length: 12,
            max_name_attempts: 8,
        }
    }
}

impl StorageConfig {
    pub fn ledger_path(&self) -> PathBuf {
        Path::new(&self.base_path).join(&self.ledger_file)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Path to log4rs configuration file
    pub config_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            config_file: "server_log.yaml".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file, use defaults if not found, then apply environment overrides
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from(config_path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = config_path.as_ref();
        if config_path.exists() {
            let content = fs::read_to_string(config_path)?;
            let config: AppConfig = serde_yaml::from_str(&content)?;
            info!("Loaded configuration from {}", config_path.display());
            Ok(config)
        } else {
            warn!("Config file {} not found, using defaults", config_path.display());
            Ok(Self::default())
        }
    }

    /// `STORAGE_BACKEND` and `STORAGE_DIRECTORY` take precedence over the file
    pub fn apply_env_overrides(&mut self) {
        if let Ok(backend_str) = env::var("STORAGE_BACKEND") {
            match backend_str.parse::<StorageBackend>() {
                Ok(backend) => {
                    info!("Using storage backend from environment: {:?}", backend);
                    self.storage.backend = backend;
                }
                Err(e) => warn!("Invalid storage backend in environment: {}. Keeping {:?}.", e, self.storage.backend),
            }
        }
        if let Ok(dir) = env::var("STORAGE_DIRECTORY") {
            if !dir.trim().is_empty() {
                info!("Using storage directory from environment: {}", dir);
                self.storage.base_path = dir;
            }
        }
    }
}
