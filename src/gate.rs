//! Access Gate
//!
//! Every operation that touches a stored file asks the gate first. The gate
//! consults the ledger for ownership and the blob store for existence, and
//! deliberately answers "not yours" and "no such file" the same way.

use crate::ledger::{Ledger, LedgerError};
use crate::storage::BlobStore;
use log::error;
use std::path::PathBuf;
use std::sync::Arc;

/// Why a request for a file was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("File not found or unauthorized access")]
    NotFoundOrUnauthorized,
    /// The ledger lists the file but the blob is gone
    #[error("File does not exist")]
    FileMissing,
}

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error(transparent)]
    Rejected(#[from] Rejection),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// A file the caller is allowed to use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub name: String,
    pub path: PathBuf,
}

pub struct AccessGate {
    ledger: Arc<dyn Ledger>,
    store: Arc<dyn BlobStore>,
}

impl AccessGate {
    pub fn new(ledger: Arc<dyn Ledger>, store: Arc<dyn BlobStore>) -> Self {
        Self { ledger, store }
    }

    /// Ownership check only. Used by removal, which must work even when the blob is already gone.
    pub fn authorize_owner(&self, token: &str, name: &str) -> Result<(), GateError> {
        if self.ledger.owns(token, name)? {
            Ok(())
        } else {
            Err(Rejection::NotFoundOrUnauthorized.into())
        }
    }

    /// Full check: ownership, then blob existence
    pub fn authorize(&self, token: &str, name: &str) -> Result<ResolvedFile, GateError> {
        self.authorize_owner(token, name)?;

        if !self.store.exists(name) {
            error!("Ledger lists {} but its blob is missing", name);
            return Err(Rejection::FileMissing.into());
        }

        Ok(ResolvedFile {
            name: name.to_string(),
            path: self.store.resolve_path(name),
        })
    }
}
