//! File service: the ledger-aware operations on stored files

use crate::error::AppError;
use crate::gate::{AccessGate, ResolvedFile};
use crate::ledger::Ledger;
use crate::service::request::UploadRequest;
use crate::storage::{BlobStore, OpaqueName, StoredFileMeta};
use crate::tabular::DataFrame;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UploadReceipt {
    pub message: String,
    pub random_name: OpaqueName,
    pub original_name: String,
}

/// One entry of a token's file listing
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FileSummary {
    pub random_name: OpaqueName,
    pub original_name: String,
    pub size: u64,
    pub uploaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FileInfo {
    pub random_name: OpaqueName,
    #[serde(flatten)]
    pub meta: StoredFileMeta,
    /// Blob still matches the checksum recorded at upload
    pub verified: bool,
}

pub struct FileService {
    store: Arc<dyn BlobStore>,
    ledger: Arc<dyn Ledger>,
    gate: AccessGate,
}

impl FileService {
    pub fn new(store: Arc<dyn BlobStore>, ledger: Arc<dyn Ledger>) -> Self {
        let gate = AccessGate::new(Arc::clone(&ledger), Arc::clone(&store));
        Self { store, ledger, gate }
    }

    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    /// Store the bytes, then record ownership. A failed grant removes the blob again.
    pub fn upload(&self, request: &UploadRequest) -> Result<UploadReceipt, AppError> {
        let name = self.store.put(&request.data, &request.original_name, &request.token)?;
        debug!("Stored {} bytes as {}", request.data.len(), name);

        if let Err(e) = self.ledger.grant(&request.token, &name) {
            error!("Failed to record ownership of {}: {}", name, e);
            if let Err(cleanup) = self.store.delete(&name) {
                error!("Failed to roll back blob {}: {}", name, cleanup);
            }
            return Err(e.into());
        }

        info!("Uploaded {} as {}", request.original_name, name);
        Ok(UploadReceipt {
            message: "File uploaded successfully".to_string(),
            random_name: name,
            original_name: request.original_name.clone(),
        })
    }

    /// Ownership check, delete, then revoke
    pub fn remove(&self, token: &str, name: &str) -> Result<(), AppError> {
        self.gate.authorize_owner(token, name)?;
        self.store.delete(name)?;
        if !self.ledger.revoke(token, name)? {
            warn!("Ledger entry for {} vanished during removal", name);
        }
        info!("Removed {}", name);
        Ok(())
    }

    /// Files owned by `token`, in upload order
    pub fn list(&self, token: &str) -> Result<Vec<FileSummary>, AppError> {
        let mut files = Vec::new();
        for name in self.ledger.list_owned(token)? {
            match self.store.read_meta(&name) {
                Ok(meta) => files.push(FileSummary {
                    random_name: name,
                    original_name: meta.original_name,
                    size: meta.size,
                    uploaded_at: meta.uploaded_at,
                }),
                Err(e) => error!("Ledger lists {} but its metadata is unreadable: {}", name, e),
            }
        }
        Ok(files)
    }

    pub fn info(&self, token: &str, name: &str) -> Result<FileInfo, AppError> {
        let ResolvedFile { name, .. } = self.gate.authorize(token, name)?;
        let meta = self.store.read_meta(&name)?;
        let verified = self.store.verify(&name)?;
        if !verified {
            warn!("Checksum mismatch for {}", name);
        }
        Ok(FileInfo { random_name: name, meta, verified })
    }

    /// Authorize, read and parse a stored CSV
    pub fn load_frame(&self, token: &str, name: &str) -> Result<DataFrame, AppError> {
        let resolved = self.gate.authorize(token, name)?;
        let data = self.store.read(&resolved.name)?;
        let frame = DataFrame::from_csv_bytes(&data)?;
        debug!("Loaded {} with shape {:?}", resolved.name, frame.shape());
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::mock_store::MockLedger;
    use crate::ledger::LedgerError;
    use crate::storage::mock_store::MockBlobStore;
    use bytes::Bytes;

    fn upload_request(token: &str, data: &'static [u8]) -> UploadRequest {
        UploadRequest {
            token: token.to_string(),
            original_name: "data.csv".to_string(),
            data: Bytes::from_static(data),
        }
    }

    fn service() -> (Arc<MockBlobStore>, Arc<MockLedger>, FileService) {
        let store = Arc::new(MockBlobStore::new());
        let ledger = Arc::new(MockLedger::new());
        let service = FileService::new(store.clone(), ledger.clone());
        (store, ledger, service)
    }

    /// Ledger whose grants always fail
    struct RefusingLedger;

    impl Ledger for RefusingLedger {
        fn list_owned(&self, _token: &str) -> Result<Vec<String>, LedgerError> {
            Ok(Vec::new())
        }
        fn grant(&self, _token: &str, name: &str) -> Result<(), LedgerError> {
            Err(LedgerError::OwnershipConflict { name: name.to_string() })
        }
        fn revoke(&self, _token: &str, _name: &str) -> Result<bool, LedgerError> {
            Ok(false)
        }
        fn tokens(&self) -> Result<Vec<String>, LedgerError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_upload_grants_ownership() {
        let (store, ledger, service) = service();
        let receipt = service.upload(&upload_request("abc", b"a,b\n1,2\n")).unwrap();

        assert_eq!(receipt.original_name, "data.csv");
        assert_eq!(receipt.random_name.len(), 12);
        assert!(store.exists(&receipt.random_name));
        assert_eq!(ledger.list_owned("abc").unwrap(), vec![receipt.random_name]);
    }

    #[test]
    fn test_failed_grant_rolls_back_blob() {
        let store = Arc::new(MockBlobStore::new());
        let service = FileService::new(store.clone(), Arc::new(RefusingLedger));

        let err = service.upload(&upload_request("abc", b"a\n1\n")).unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(store.object_count(), 0);
    }

    #[test]
    fn test_remove_requires_ownership() {
        let (store, _ledger, service) = service();
        let name = service.upload(&upload_request("abc", b"a\n1\n")).unwrap().random_name;

        let err = service.remove("xyz", &name).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        assert!(store.exists(&name));

        service.remove("abc", &name).unwrap();
        assert!(!store.exists(&name));
        assert!(matches!(service.remove("abc", &name), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_remove_succeeds_when_blob_already_gone() {
        let (store, ledger, service) = service();
        let name = service.upload(&upload_request("abc", b"a\n1\n")).unwrap().random_name;
        store.forget(&name);

        service.remove("abc", &name).unwrap();
        assert!(ledger.list_owned("abc").unwrap().is_empty());
    }

    #[test]
    fn test_list_and_info() {
        let (_store, _ledger, service) = service();
        let first = service.upload(&upload_request("abc", b"a\n1\n")).unwrap().random_name;
        let second = service.upload(&upload_request("abc", b"a\n2\n")).unwrap().random_name;
        service.upload(&upload_request("xyz", b"a\n3\n")).unwrap();

        let listed: Vec<String> = service.list("abc").unwrap().into_iter().map(|f| f.random_name).collect();
        assert_eq!(listed, vec![first.clone(), second]);
        assert!(service.list("nobody").unwrap().is_empty());

        let info = service.info("abc", &first).unwrap();
        assert!(info.verified);
        assert_eq!(info.meta.owner_token, "abc");
        assert_eq!(info.meta.size, 4);
        assert!(matches!(service.info("xyz", &first), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_load_frame() {
        let (store, _ledger, service) = service();
        let name = service.upload(&upload_request("abc", b"a,b\n1,2\n3,4\n")).unwrap().random_name;
        assert_eq!(service.load_frame("abc", &name).unwrap().shape(), (2, 2));

        store.forget(&name);
        assert!(matches!(service.load_frame("abc", &name), Err(AppError::NotFound(_))));
    }
}
