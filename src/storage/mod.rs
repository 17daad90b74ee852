//! Blob Storage Layer Abstraction
//!
//! This module provides an abstraction over blob storage backends. Uploaded
//! files are kept under server-generated opaque names together with a small
//! JSON sidecar recording who uploaded them and under which original name.

pub mod local_store;
pub mod mock_store;


use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Opaque file name type
pub type OpaqueName = String;

/// Errors raised by blob storage backends
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O failure for {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("No stored file named {0}")]
    NotFound(String),
    #[error("Invalid metadata for {name}: {source}")]
    Metadata {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Could not generate a unique file name after {0} attempts")]
    NamesExhausted(usize),
}

impl StorageError {
    pub(crate) fn io(name: &str, source: std::io::Error) -> Self {
        StorageError::Io { name: name.to_string(), source }
    }
}

/// Sidecar metadata stored next to every blob
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredFileMeta {
    pub owner_token: String,
    pub original_name: String,
    /// Size of the blob in bytes
    #[serde(default)]
    pub size: u64,
    /// Lowercase hex MD5 of the blob
    #[serde(default)]
    pub checksum: String,
    #[serde(default)]
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl StoredFileMeta {
    /// Build the sidecar record for freshly uploaded bytes
    pub fn new(owner_token: &str, original_name: &str, data: &[u8]) -> Self {
        Self {
            owner_token: owner_token.to_string(),
            original_name: original_name.to_string(),
            size: data.len() as u64,
            checksum: checksum(data),
            uploaded_at: Some(Utc::now()),
        }
    }
}

/// Calculate MD5 checksum for data
pub fn checksum(data: &[u8]) -> String {
    hex::encode(md5::compute(data).0)
}

/// Trait defining the blob storage interface
pub trait BlobStore: Send + Sync {
    /// Store bytes under a fresh opaque name and write the sidecar
    fn put(&self, data: &[u8], original_name: &str, owner_token: &str) -> Result<OpaqueName, StorageError>;

    /// Check whether a blob exists
    fn exists(&self, name: &str) -> bool;

    /// Remove blob and sidecar. Missing files are not an error.
    fn delete(&self, name: &str) -> Result<(), StorageError>;

    /// Map an opaque name to its blob location without touching the disk
    fn resolve_path(&self, name: &str) -> PathBuf;

    /// Read the blob contents
    fn read(&self, name: &str) -> Result<Vec<u8>, StorageError>;

    /// Read the sidecar metadata
    fn read_meta(&self, name: &str) -> Result<StoredFileMeta, StorageError>;

    /// Verify blob integrity against the checksum recorded at upload
    fn verify(&self, name: &str) -> Result<bool, StorageError> {
        let meta = self.read_meta(name)?;
        let data = self.read(name)?;
        Ok(checksum(&data) == meta.checksum)
    }
}

/// Generates random alphanumeric names and retries on collision
#[derive(Debug, Clone)]
pub struct NameGenerator {
    length: usize,
    max_attempts: usize,
}

impl Default for NameGenerator {
    fn default() -> Self {
        Self::new(12, 8)
    }
}

impl NameGenerator {
    pub fn new(length: usize, max_attempts: usize) -> Self {
        Self {
            length: length.max(1),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Produce one random candidate name
    pub fn generate(&self) -> OpaqueName {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect()
    }

    /// Keep generating names until `try_claim` accepts one.
    ///
    /// `try_claim` returns `Ok(None)` when the candidate is already taken, which
    /// triggers another attempt. Errors abort immediately.
    pub fn claim<T, F>(&self, mut try_claim: F) -> Result<(OpaqueName, T), StorageError>
    where
        F: FnMut(&str) -> Result<Option<T>, StorageError>,
    {
        for attempt in 1..=self.max_attempts {
            let name = self.generate();
            match try_claim(&name)? {
                Some(claimed) => return Ok((name, claimed)),
                None => log::warn!("Generated name {} collided (attempt {}), regenerating", name, attempt),
            }
        }
        Err(StorageError::NamesExhausted(self.max_attempts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_names_are_alphanumeric() {
        let names = NameGenerator::default();
        for _ in 0..50 {
            let name = names.generate();
            assert_eq!(name.len(), 12);
            assert!(name.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_claim_regenerates_on_collision() {
        let names = NameGenerator::new(8, 5);
        let mut calls = 0;
        let (name, attempts) = names
            .claim(|_| {
                calls += 1;
                Ok(if calls < 3 { None } else { Some(calls) })
            })
            .unwrap();
        assert_eq!(attempts, 3);
        assert_eq!(name.len(), 8);
    }

    #[test]
    fn test_claim_gives_up() {
        let names = NameGenerator::new(8, 4);
        let mut calls = 0;
        let result: Result<(String, ()), _> = names.claim(|_| {
            calls += 1;
            Ok(None)
        });
        assert!(matches!(result, Err(StorageError::NamesExhausted(4))));
        assert_eq!(calls, 4);
    }

    #[test]
    fn test_meta_checksum() {
        let meta = StoredFileMeta::new("abc", "data.csv", b"a,b\n1,2\n");
        assert_eq!(meta.size, 8);
        assert_eq!(meta.checksum, checksum(b"a,b\n1,2\n"));
        assert_eq!(meta.checksum.len(), 32);
        assert!(meta.uploaded_at.is_some());
    }

    #[test]
    fn test_meta_accepts_minimal_sidecar() {
        let meta: StoredFileMeta =
            serde_json::from_str(r#"{"owner_token": "abc", "original_name": "x.csv"}"#).unwrap();
        assert_eq!(meta.owner_token, "abc");
        assert_eq!(meta.size, 0);
        assert!(meta.uploaded_at.is_none());
    }
}
