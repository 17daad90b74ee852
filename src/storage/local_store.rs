//! Local filesystem blob storage implementation

use crate::storage::{BlobStore, NameGenerator, OpaqueName, StorageError, StoredFileMeta};
use log::{debug, info, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Stores each blob as `<root>/<name>` with its sidecar at `<root>/<name>.meta.json`
pub struct LocalBlobStore {
    root: PathBuf,
    names: NameGenerator,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, names: NameGenerator) -> Result<Self, StorageError> {
        let root = root.into();
        if !root.exists() {
            fs::create_dir_all(&root).map_err(|e| StorageError::io(&root.display().to_string(), e))?;
        }
        info!("Using local blob storage directory: {}", root.display());
        Ok(Self { root, names })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn meta_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.meta.json", name))
    }

    /// Open a brand new file, reporting `None` if something already sits at `path`
    fn create_exclusive(name: &str, path: &Path) -> Result<Option<File>, StorageError> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(StorageError::io(name, e)),
        }
    }

    fn write_contents(&self, name: &str, mut blob: File, data: &[u8], meta: &StoredFileMeta) -> Result<(), StorageError> {
        blob.write_all(data).map_err(|e| StorageError::io(name, e))?;
        blob.sync_all().map_err(|e| StorageError::io(name, e))?;

        let sidecar = serde_json::to_vec_pretty(meta)
            .map_err(|e| StorageError::Metadata { name: name.to_string(), source: e })?;
        let mut meta_file = Self::create_exclusive(name, &self.meta_path(name))?
            .ok_or_else(|| StorageError::io(name, io::Error::new(io::ErrorKind::AlreadyExists, "sidecar already exists")))?;
        meta_file.write_all(&sidecar).map_err(|e| StorageError::io(name, e))?;
        meta_file.sync_all().map_err(|e| StorageError::io(name, e))?;
        Ok(())
    }

    fn remove_if_present(name: &str, path: &Path) -> Result<bool, StorageError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io(name, e)),
        }
    }
}

impl BlobStore for LocalBlobStore {
    fn put(&self, data: &[u8], original_name: &str, owner_token: &str) -> Result<OpaqueName, StorageError> {
        let (name, blob) = self.names.claim(|candidate| {
            if self.meta_path(candidate).exists() {
                return Ok(None);
            }
            Self::create_exclusive(candidate, &self.resolve_path(candidate))
        })?;

        let meta = StoredFileMeta::new(owner_token, original_name, data);
        if let Err(e) = self.write_contents(&name, blob, data, &meta) {
            warn!("Failed to store {}, removing partial write: {}", name, e);
            if let Err(cleanup) = self.delete(&name) {
                warn!("Cleanup of {} failed: {}", name, cleanup);
            }
            return Err(e);
        }

        info!("Stored {} ({} bytes, original name {})", name, data.len(), original_name);
        Ok(name)
    }

    fn exists(&self, name: &str) -> bool {
        self.resolve_path(name).is_file()
    }

    fn delete(&self, name: &str) -> Result<(), StorageError> {
        let blob_removed = Self::remove_if_present(name, &self.resolve_path(name))?;
        let meta_removed = Self::remove_if_present(name, &self.meta_path(name))?;
        debug!("Deleted {}: blob={}, sidecar={}", name, blob_removed, meta_removed);
        Ok(())
    }

    fn resolve_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        fs::read(self.resolve_path(name)).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(name.to_string()),
            _ => StorageError::io(name, e),
        })
    }

    fn read_meta(&self, name: &str) -> Result<StoredFileMeta, StorageError> {
        let raw = fs::read(self.meta_path(name)).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(name.to_string()),
            _ => StorageError::io(name, e),
        })?;
        serde_json::from_slice(&raw).map_err(|e| StorageError::Metadata { name: name.to_string(), source: e })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, LocalBlobStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path().join("blobs"), NameGenerator::default()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_local_blob_store_basic_operations() {
        let (_dir, store) = store();
        let data = b"a,b\n1,2\n";

        let name = store.put(data, "numbers.csv", "abc").unwrap();
        assert_eq!(name.len(), 12);
        assert!(store.exists(&name));
        assert_eq!(store.resolve_path(&name), store.root().join(&name));
        assert_eq!(store.read(&name).unwrap(), data);

        let meta = store.read_meta(&name).unwrap();
        assert_eq!(meta.owner_token, "abc");
        assert_eq!(meta.original_name, "numbers.csv");
        assert_eq!(meta.size, data.len() as u64);
        assert!(store.verify(&name).unwrap());

        store.delete(&name).unwrap();
        assert!(!store.exists(&name));
        assert!(!store.root().join(format!("{}.meta.json", name)).exists());
    }

    #[test]
    fn test_sidecar_layout_on_disk() {
        let (_dir, store) = store();
        let name = store.put(b"x\n1\n", "x.csv", "tok").unwrap();

        let raw = fs::read_to_string(store.root().join(format!("{}.meta.json", name))).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["owner_token"], "tok");
        assert_eq!(value["original_name"], "x.csv");
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (_dir, store) = store();
        store.delete("doesNotExist").unwrap();

        let name = store.put(b"x\n1\n", "x.csv", "tok").unwrap();
        store.delete(&name).unwrap();
        store.delete(&name).unwrap();
    }

    #[test]
    fn test_verify_detects_tampering() {
        let (_dir, store) = store();
        let name = store.put(b"x\n1\n", "x.csv", "tok").unwrap();
        fs::write(store.resolve_path(&name), b"x\n2\n").unwrap();
        assert!(!store.verify(&name).unwrap());
    }

    #[test]
    fn test_missing_blob_errors() {
        let (_dir, store) = store();
        assert!(matches!(store.read("nothingHere1"), Err(StorageError::NotFound(_))));
        assert!(matches!(store.read_meta("nothingHere1"), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_names_are_unique() {
        let (_dir, store) = store();
        let mut names = std::collections::HashSet::new();
        for i in 0..20 {
            let name = store.put(format!("v\n{}\n", i).as_bytes(), "v.csv", "tok").unwrap();
            assert!(names.insert(name));
        }
    }
}
