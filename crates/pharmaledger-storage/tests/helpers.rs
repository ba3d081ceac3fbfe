#![allow(dead_code)]

use std::fs;

use pharmaledger_core::{Block, Ledger, LedgerConfig};
use pharmaledger_storage::sled_store::SledStore;
use serde_json::json;
use tempfile::{tempdir, TempDir};

pub fn create_temp_dir() -> (TempDir, std::path::PathBuf) {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let db_path = temp_dir.path().to_path_buf();
    (temp_dir, db_path)
}

pub fn create_temp_store() -> (TempDir, SledStore) {
    let (temp_dir, db_path) = create_temp_dir();
    let store = SledStore::open(&db_path).expect("Failed to open SledStore");
    (temp_dir, store)
}

pub fn teardown_store(temp_dir: TempDir, store: SledStore) {
    let db_path = temp_dir.path().to_path_buf();
    store.clear().expect("Failed to clear the store");
    drop(store);
    temp_dir.close().expect("Failed to delete temp dir");
    let _ = fs::remove_dir_all(&db_path);
    assert!(!db_path.exists(), "Database directory should be removed");
}

pub fn test_config() -> LedgerConfig {
    LedgerConfig::default()
        .with_difficulty(4)
        .with_facility("cold-store-test")
}

/// `n` mined blocks on top of genesis, each holding `txs_per_block` readings.
pub fn mined_chain(n: usize, txs_per_block: usize) -> Vec<Block> {
    let ledger = Ledger::new(test_config()).expect("ledger");
    for b in 0..n {
        for t in 0..txs_per_block {
            ledger
                .submit("sensor-reading", json!({"block": b, "reading": t}))
                .expect("submit");
        }
        ledger.mine_block(None, None).expect("mine");
    }
    ledger.get_chain()
}
