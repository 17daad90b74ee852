//! JSON document implementation of the Ledger trait
//!
//! The whole document is parsed on every call and rewritten on every
//! mutation. Writes go to a temporary file in the same directory which is
//! then renamed over the original, so readers only ever see a complete
//! document. All read-modify-write cycles against one path are serialized
//! by a process-wide lock.

use crate::ledger::{apply_grant, apply_revoke, Ledger, LedgerDocument, LedgerError};
use lazy_static::lazy_static;
use log::{debug, info};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tempfile::NamedTempFile;

lazy_static! {
    // One lock per ledger file, shared by every JsonLedger opened on it
    static ref LEDGER_LOCKS: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>> = Mutex::new(HashMap::new());
}

fn lock_for(path: &Path) -> Arc<Mutex<()>> {
    let mut locks = LEDGER_LOCKS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    Arc::clone(locks.entry(path.to_path_buf()).or_default())
}

/// Ledger persisted as a single JSON object on disk
pub struct JsonLedger {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl JsonLedger {
    /// Open the ledger at `path`, creating an empty document if none exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let io_err = |source| LedgerError::Io { path: path.to_path_buf(), source };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(io_err)?;

        let dir = dir.canonicalize().map_err(io_err)?;
        let file_name = path.file_name().ok_or_else(|| {
            io_err(std::io::Error::new(std::io::ErrorKind::InvalidInput, "ledger path has no file name"))
        })?;
        let path = dir.join(file_name);

        let ledger = Self { lock: lock_for(&path), path };
        {
            let _guard = ledger.guard();
            if !ledger.path.exists() {
                info!("Creating empty ledger at {}", ledger.path.display());
                ledger.write_document(&LedgerDocument::new())?;
            }
        }
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // The lock guards no in-memory data; the file itself is always whole.
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_document(&self) -> Result<LedgerDocument, LedgerError> {
        let raw = fs::read(&self.path).map_err(|source| LedgerError::Io { path: self.path.clone(), source })?;
        serde_json::from_slice(&raw).map_err(|source| LedgerError::Corrupt { path: self.path.clone(), source })
    }

    fn write_document(&self, doc: &LedgerDocument) -> Result<(), LedgerError> {
        let io_err = |source| LedgerError::Io { path: self.path.clone(), source };
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));

        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        let body = serde_json::to_vec_pretty(doc)
            .map_err(|source| LedgerError::Corrupt { path: self.path.clone(), source })?;
        tmp.write_all(&body).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }

    /// Run one locked read-modify-write cycle, persisting only if `mutate` reports a change
    fn update<T>(
        &self,
        mutate: impl FnOnce(&mut LedgerDocument) -> Result<(T, bool), LedgerError>,
    ) -> Result<T, LedgerError> {
        let _guard = self.guard();
        let mut doc = self.read_document()?;
        let (result, changed) = mutate(&mut doc)?;
        if changed {
            self.write_document(&doc)?;
        }
        Ok(result)
    }

    /// Snapshot of the full document
    pub fn document(&self) -> Result<LedgerDocument, LedgerError> {
        let _guard = self.guard();
        self.read_document()
    }
}

impl Ledger for JsonLedger {
    fn list_owned(&self, token: &str) -> Result<Vec<String>, LedgerError> {
        Ok(self.document()?.remove(token).unwrap_or_default())
    }

    fn grant(&self, token: &str, name: &str) -> Result<(), LedgerError> {
        self.update(|doc| {
            let changed = apply_grant(doc, token, name)?;
            Ok(((), changed))
        })?;
        debug!("Granted {} to token", name);
        Ok(())
    }

    fn revoke(&self, token: &str, name: &str) -> Result<bool, LedgerError> {
        let removed = self.update(|doc| {
            let removed = apply_revoke(doc, token, name);
            Ok((removed, removed))
        })?;
        debug!("Revoke of {}: removed={}", name, removed);
        Ok(removed)
    }

    fn tokens(&self) -> Result<Vec<String>, LedgerError> {
        Ok(self.document()?.into_keys().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_empty_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("user_files.json");
        let ledger = JsonLedger::open(&path).unwrap();

        assert!(path.exists());
        assert!(ledger.document().unwrap().is_empty());
        assert!(ledger.list_owned("anyone").unwrap().is_empty());
    }

    #[test]
    fn test_grant_and_revoke_persist() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("user_files.json");
        let ledger = JsonLedger::open(&path).unwrap();

        ledger.grant("abc", "AAAAAAAAAAAA").unwrap();
        ledger.grant("abc", "BBBBBBBBBBBB").unwrap();

        let reopened = JsonLedger::open(&path).unwrap();
        assert_eq!(reopened.list_owned("abc").unwrap(), vec!["AAAAAAAAAAAA", "BBBBBBBBBBBB"]);
        assert!(reopened.owns("abc", "AAAAAAAAAAAA").unwrap());

        assert!(reopened.revoke("abc", "AAAAAAAAAAAA").unwrap());
        assert!(ledger.revoke("abc", "BBBBBBBBBBBB").unwrap());
        assert!(ledger.tokens().unwrap().is_empty());

        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({}));
    }

    #[test]
    fn test_existing_document_is_loaded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("user_files.json");
        fs::write(&path, r#"{"abc": ["one", "two"], "xyz": ["three"]}"#).unwrap();

        let ledger = JsonLedger::open(&path).unwrap();
        assert_eq!(ledger.list_owned("abc").unwrap(), vec!["one", "two"]);
        assert_eq!(ledger.tokens().unwrap(), vec!["abc", "xyz"]);
    }

    #[test]
    fn test_corrupt_document_is_reported_not_reset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("user_files.json");
        fs::write(&path, "{ not json").unwrap();

        let ledger = JsonLedger::open(&path).unwrap();
        assert!(matches!(ledger.list_owned("abc"), Err(LedgerError::Corrupt { .. })));
        assert!(matches!(ledger.grant("abc", "one"), Err(LedgerError::Corrupt { .. })));
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn test_rewrite_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("user_files.json");
        let ledger = JsonLedger::open(&path).unwrap();
        for i in 0..5 {
            ledger.grant("abc", &format!("file{}", i)).unwrap();
        }

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_same_path_shares_lock() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("user_files.json");
        let first = JsonLedger::open(&path).unwrap();
        let second = JsonLedger::open(dir.path().join(".").join("user_files.json")).unwrap();
        assert!(Arc::ptr_eq(&first.lock, &second.lock));
    }
}
