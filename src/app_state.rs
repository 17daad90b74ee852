//! Application State Management
//!
//! This module provides the application state that contains all services
//! and their dependencies, following the dependency injection pattern.

use std::sync::Arc;
use log::info;

use crate::config::{AppConfig, StorageBackend};
use crate::ledger::{json_store::JsonLedger, mock_store::MockLedger, Ledger};
use crate::service::file_service::FileService;
use crate::storage::{local_store::LocalBlobStore, mock_store::MockBlobStore, BlobStore, NameGenerator};

/// Application state containing all services and their dependencies
#[derive(Clone)]
pub struct AppState {
    pub file_service: Arc<FileService>,
    pub config: AppConfig,
}

impl AppState {
    /// Create application state from configuration
    pub fn from_config(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Initializing application state with configuration");

        let names = NameGenerator::new(config.storage.name_length, config.storage.max_name_attempts);
        let (store, ledger): (Arc<dyn BlobStore>, Arc<dyn Ledger>) = match config.storage.backend {
            StorageBackend::Local => {
                let ledger_path = config.storage.ledger_path();
                info!(
                    "Using local storage backend with base_path: {}, ledger: {}",
                    config.storage.base_path,
                    ledger_path.display()
                );
                (
                    Arc::new(LocalBlobStore::new(&config.storage.base_path, names)?),
                    Arc::new(JsonLedger::open(ledger_path)?),
                )
            }
            StorageBackend::Mock => {
                info!("Using mock storage backend");
                (Arc::new(MockBlobStore::with_names(names)), Arc::new(MockLedger::new()))
            }
        };

        info!("Application state initialized successfully");
        Ok(Self {
            file_service: Arc::new(FileService::new(store, ledger)),
            config,
        })
    }

    /// Create application state for testing with mock backends
    pub fn new_for_testing() -> Self {
        let config = AppConfig::default();
        let store: Arc<dyn BlobStore> = Arc::new(MockBlobStore::new());
        let ledger: Arc<dyn Ledger> = Arc::new(MockLedger::new());

        Self {
            file_service: Arc::new(FileService::new(store, ledger)),
            config,
        }
    }
}
