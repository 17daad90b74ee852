//! Ownership Ledger
//!
//! The ledger maps each token to the ordered list of opaque file names it
//! owns and is the single authority for "does token T own file F". A file
//! belongs to at most one token, and tokens without files are dropped from
//! the document entirely.

pub mod json_store;
pub mod mock_store;

#[cfg(test)]
mod comprehensive_test;

use std::collections::BTreeMap;
use std::path::PathBuf;

/// The whole ledger as it is persisted: token -> owned names
pub type LedgerDocument = BTreeMap<String, Vec<String>>;

/// Errors raised by ledger backends
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Ledger I/O failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Ledger document {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("File {name} is already owned by another token")]
    OwnershipConflict { name: String },
}

/// Trait defining the ownership ledger interface
pub trait Ledger: Send + Sync {
    /// Names owned by `token`, in grant order. Unknown tokens own nothing.
    fn list_owned(&self, token: &str) -> Result<Vec<String>, LedgerError>;

    /// Check whether `token` owns `name`
    fn owns(&self, token: &str, name: &str) -> Result<bool, LedgerError> {
        Ok(self.list_owned(token)?.iter().any(|owned| owned == name))
    }

    /// Record `token` as the owner of `name`
    fn grant(&self, token: &str, name: &str) -> Result<(), LedgerError>;

    /// Forget that `token` owns `name`; returns whether anything was removed
    fn revoke(&self, token: &str, name: &str) -> Result<bool, LedgerError>;

    /// Tokens currently owning at least one file
    fn tokens(&self) -> Result<Vec<String>, LedgerError>;
}

/// Apply a grant to an in-memory document.
///
/// Returns `Ok(false)` when the token already owned the name.
pub fn apply_grant(doc: &mut LedgerDocument, token: &str, name: &str) -> Result<bool, LedgerError> {
    let foreign_owner = doc
        .iter()
        .any(|(owner, names)| owner != token && names.iter().any(|n| n == name));
    if foreign_owner {
        return Err(LedgerError::OwnershipConflict { name: name.to_string() });
    }

    let names = doc.entry(token.to_string()).or_default();
    if names.iter().any(|n| n == name) {
        return Ok(false);
    }
    names.push(name.to_string());
    Ok(true)
}

/// Apply a revoke to an in-memory document, dropping the token if it ends up empty
pub fn apply_revoke(doc: &mut LedgerDocument, token: &str, name: &str) -> bool {
    let Some(names) = doc.get_mut(token) else {
        return false;
    };
    let before = names.len();
    names.retain(|n| n != name);
    let removed = names.len() != before;
    if names.is_empty() {
        doc.remove(token);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_grant_appends_in_order() {
        let mut doc = LedgerDocument::new();
        assert!(apply_grant(&mut doc, "abc", "first").unwrap());
        assert!(apply_grant(&mut doc, "abc", "second").unwrap());
        assert_eq!(doc["abc"], vec!["first", "second"]);
    }

    #[test]
    fn test_apply_grant_is_idempotent() {
        let mut doc = LedgerDocument::new();
        apply_grant(&mut doc, "abc", "file").unwrap();
        assert!(!apply_grant(&mut doc, "abc", "file").unwrap());
        assert_eq!(doc["abc"], vec!["file"]);
    }

    #[test]
    fn test_apply_grant_rejects_foreign_owner() {
        let mut doc = LedgerDocument::new();
        apply_grant(&mut doc, "abc", "file").unwrap();
        let err = apply_grant(&mut doc, "xyz", "file").unwrap_err();
        assert!(matches!(err, LedgerError::OwnershipConflict { .. }));
        assert!(!doc.contains_key("xyz"));
    }

    #[test]
    fn test_apply_revoke_compacts_empty_tokens() {
        let mut doc = LedgerDocument::new();
        apply_grant(&mut doc, "abc", "one").unwrap();
        apply_grant(&mut doc, "abc", "two").unwrap();

        assert!(apply_revoke(&mut doc, "abc", "one"));
        assert_eq!(doc["abc"], vec!["two"]);

        assert!(apply_revoke(&mut doc, "abc", "two"));
        assert!(!doc.contains_key("abc"));
    }

    #[test]
    fn test_apply_revoke_missing_is_noop() {
        let mut doc = LedgerDocument::new();
        assert!(!apply_revoke(&mut doc, "nobody", "file"));
        apply_grant(&mut doc, "abc", "one").unwrap();
        assert!(!apply_revoke(&mut doc, "abc", "other"));
        assert_eq!(doc["abc"], vec!["one"]);
    }
}
