//! Mock implementation of BlobStore for testing

use crate::storage::{BlobStore, NameGenerator, OpaqueName, StorageError, StoredFileMeta};
use log::info;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

/// In-memory blob store: name -> (bytes, sidecar)
pub struct MockBlobStore {
    data: Arc<Mutex<HashMap<OpaqueName, (Vec<u8>, StoredFileMeta)>>>,
    names: NameGenerator,
}

impl MockBlobStore {
    pub fn new() -> Self {
        Self::with_names(NameGenerator::default())
    }

    pub fn with_names(names: NameGenerator) -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
            names,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<OpaqueName, (Vec<u8>, StoredFileMeta)>> {
        // The map is never left half-updated, so a poisoned lock is still usable.
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get the number of stored blobs
    pub fn object_count(&self) -> usize {
        self.entries().len()
    }

    /// Drop a blob without touching anything else, for simulating lost files
    pub fn forget(&self, name: &str) {
        self.entries().remove(name);
    }
}

impl Default for MockBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore for MockBlobStore {
    fn put(&self, data: &[u8], original_name: &str, owner_token: &str) -> Result<OpaqueName, StorageError> {
        let mut entries = self.entries();
        let (name, ()) = self
            .names
            .claim(|candidate| Ok(if entries.contains_key(candidate) { None } else { Some(()) }))?;
        entries.insert(name.clone(), (data.to_vec(), StoredFileMeta::new(owner_token, original_name, data)));
        info!("Mock: stored {} ({} bytes)", name, data.len());
        Ok(name)
    }

    fn exists(&self, name: &str) -> bool {
        self.entries().contains_key(name)
    }

    fn delete(&self, name: &str) -> Result<(), StorageError> {
        self.entries().remove(name);
        Ok(())
    }

    fn resolve_path(&self, name: &str) -> PathBuf {
        PathBuf::from("mock").join(name)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        self.entries()
            .get(name)
            .map(|(data, _)| data.clone())
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    fn read_meta(&self, name: &str) -> Result<StoredFileMeta, StorageError> {
        self.entries()
            .get(name)
            .map(|(_, meta)| meta.clone())
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }
}
