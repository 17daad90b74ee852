//! Comprehensive tests for the ledger backends

#[cfg(test)]
mod integration_tests {
    use crate::ledger::json_store::JsonLedger;
    use crate::ledger::mock_store::MockLedger;
    use crate::ledger::{Ledger, LedgerError};
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn backends(dir: &TempDir) -> Vec<(&'static str, Arc<dyn Ledger>)> {
        vec![
            ("mock", Arc::new(MockLedger::new())),
            ("json", Arc::new(JsonLedger::open(dir.path().join("user_files.json")).unwrap())),
        ]
    }

    #[test]
    fn test_ownership_is_exclusive() {
        let dir = TempDir::new().unwrap();
        for (backend, ledger) in backends(&dir) {
            ledger.grant("t1", "shared").unwrap();
            let err = ledger.grant("t2", "shared").unwrap_err();
            assert!(matches!(err, LedgerError::OwnershipConflict { .. }), "{}", backend);

            assert!(ledger.owns("t1", "shared").unwrap(), "{}", backend);
            assert!(!ledger.owns("t2", "shared").unwrap(), "{}", backend);
            assert!(!ledger.tokens().unwrap().contains(&"t2".to_string()), "{}", backend);
        }
    }

    #[test]
    fn test_grant_revoke_round_trip() {
        let dir = TempDir::new().unwrap();
        for (backend, ledger) in backends(&dir) {
            ledger.grant("abc", "keep").unwrap();
            ledger.grant("abc", "drop").unwrap();
            ledger.revoke("abc", "drop").unwrap();
            assert_eq!(ledger.list_owned("abc").unwrap(), vec!["keep"], "{}", backend);

            ledger.revoke("abc", "keep").unwrap();
            assert!(ledger.list_owned("abc").unwrap().is_empty(), "{}", backend);
            assert!(!ledger.tokens().unwrap().contains(&"abc".to_string()), "{}", backend);
        }
    }

    #[test]
    fn test_revoke_twice_is_safe() {
        let dir = TempDir::new().unwrap();
        for (backend, ledger) in backends(&dir) {
            ledger.grant("abc", "file").unwrap();
            assert!(ledger.revoke("abc", "file").unwrap(), "{}", backend);
            assert!(!ledger.revoke("abc", "file").unwrap(), "{}", backend);
            assert!(!ledger.revoke("ghost", "file").unwrap(), "{}", backend);
        }
    }

    #[test]
    fn test_concurrent_grants_lose_nothing() {
        let dir = TempDir::new().unwrap();
        for (backend, ledger) in backends(&dir) {
            let handles: Vec<_> = (0..16)
                .map(|i| {
                    let ledger = Arc::clone(&ledger);
                    thread::spawn(move || {
                        ledger.grant(&format!("token_{}", i), &format!("file_{}", i)).unwrap();
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(ledger.tokens().unwrap().len(), 16, "{}: every grant must survive", backend);
            for i in 0..16 {
                assert_eq!(
                    ledger.list_owned(&format!("token_{}", i)).unwrap(),
                    vec![format!("file_{}", i)],
                    "{}",
                    backend
                );
            }
        }
    }

    #[test]
    fn test_separate_handles_on_one_file_are_serialized() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("user_files.json");

        let handles: Vec<_> = (0..12)
            .map(|i| {
                let path = path.clone();
                thread::spawn(move || {
                    let ledger = JsonLedger::open(&path).unwrap();
                    for j in 0..5 {
                        ledger.grant("shared_token", &format!("file_{}_{}", i, j)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let ledger = JsonLedger::open(&path).unwrap();
        assert_eq!(ledger.list_owned("shared_token").unwrap().len(), 60);
    }
}
