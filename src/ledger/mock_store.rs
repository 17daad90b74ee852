//! Mock implementation of Ledger for testing

use crate::ledger::{apply_grant, apply_revoke, Ledger, LedgerDocument, LedgerError};
use std::sync::{Mutex, MutexGuard};

/// In-memory ledger with the same semantics as the JSON document
#[derive(Default)]
pub struct MockLedger {
    doc: Mutex<LedgerDocument>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn doc(&self) -> MutexGuard<'_, LedgerDocument> {
        self.doc.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of the full document
    pub fn document(&self) -> LedgerDocument {
        self.doc().clone()
    }
}

impl Ledger for MockLedger {
    fn list_owned(&self, token: &str) -> Result<Vec<String>, LedgerError> {
        Ok(self.doc().get(token).cloned().unwrap_or_default())
    }

    fn grant(&self, token: &str, name: &str) -> Result<(), LedgerError> {
        apply_grant(&mut self.doc(), token, name).map(|_| ())
    }

    fn revoke(&self, token: &str, name: &str) -> Result<bool, LedgerError> {
        Ok(apply_revoke(&mut self.doc(), token, name))
    }

    fn tokens(&self) -> Result<Vec<String>, LedgerError> {
        Ok(self.doc().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_ledger_basic_operations() {
        let ledger = MockLedger::new();
        assert!(ledger.list_owned("abc").unwrap().is_empty());

        ledger.grant("abc", "one").unwrap();
        assert!(ledger.owns("abc", "one").unwrap());
        assert!(!ledger.owns("xyz", "one").unwrap());

        assert!(ledger.revoke("abc", "one").unwrap());
        assert!(ledger.document().is_empty());
        assert!(!ledger.revoke("abc", "one").unwrap());
    }
}
