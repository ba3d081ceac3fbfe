mod helpers;

use std::fs;
use std::sync::Arc;

use helpers::{create_temp_dir, create_temp_store, mined_chain, teardown_store, test_config};
use pharmaledger_core::chain::InvalidReason;
use pharmaledger_core::{Block, ChainStatus, ChainStore, Ledger};
use pharmaledger_storage::sled_store::SledStore;
use rand::Rng;
use serde_json::json;

#[tokio::test]
async fn test_storage_integration() -> anyhow::Result<()> {
    let (temp_dir, store) = create_temp_store();
    let blocks = mined_chain(20, 3);
    for block in &blocks {
        store.put_block(block)?;
    }
    for (i, original) in blocks.iter().enumerate() {
        let retrieved = store.get_block(i as u64)?.expect("Block should exist");
        assert_eq!(&retrieved, original);
        assert!(retrieved.seal_is_valid());
    }
    assert_eq!(store.tip_height()?, Some(20));
    assert_eq!(store.tip_hash()?, Some(blocks[20].current_hash));
    teardown_store(temp_dir, store);
    Ok(())
}

#[tokio::test]
async fn test_storage_persistence() -> anyhow::Result<()> {
    let (temp_dir, db_path) = create_temp_dir();
    let blocks = mined_chain(2, 2);
    {
        let store = SledStore::open(&db_path)?;
        for block in &blocks {
            store.put_block(block)?;
        }
        store.close()?;
    }
    {
        let store = SledStore::open(&db_path)?;
        assert_eq!(store.load_chain()?, blocks);
        assert_eq!(store.tip_height()?, Some(2));
    }
    temp_dir.close()?;
    let _ = fs::remove_dir_all(db_path);
    Ok(())
}

#[tokio::test]
async fn test_storage_empty_database() -> anyhow::Result<()> {
    let (temp_dir, store) = create_temp_store();
    assert_eq!(store.tip_height()?, None);
    assert!(store.tip_hash()?.is_none(), "Tip hash should be None for empty database");
    assert!(store.get_block(0)?.is_none(), "No blocks should exist in an empty database");
    assert!(store.load_chain()?.is_empty());
    assert!(store.is_empty());
    teardown_store(temp_dir, store);
    Ok(())
}

#[tokio::test]
async fn test_storage_non_existent_block() -> anyhow::Result<()> {
    let (temp_dir, store) = create_temp_store();
    assert!(store.get_block(9999)?.is_none(), "Block should not exist");
    teardown_store(temp_dir, store);
    Ok(())
}

#[tokio::test]
async fn test_storage_tip_only_moves_forward() -> anyhow::Result<()> {
    let (temp_dir, store) = create_temp_store();
    let blocks = mined_chain(4, 1);
    for block in blocks.iter().rev() {
        store.put_block(block)?;
    }
    assert_eq!(store.tip_height()?, Some(4));
    assert_eq!(store.tip_hash()?, Some(blocks[4].current_hash));
    assert_eq!(store.len(), 5);
    teardown_store(temp_dir, store);
    Ok(())
}

#[tokio::test]
async fn test_storage_large_payloads() -> anyhow::Result<()> {
    let (temp_dir, store) = create_temp_store();
    let ledger = Ledger::open(test_config(), Arc::new(store.clone()))?;
    for i in 0..200 {
        let notes = "x".repeat(1000) + &i.to_string();
        ledger.submit("audit", json!({"auditor": format!("qa-{i}"), "notes": notes}))?;
    }
    let block = ledger.mine_block(None, None)?;
    let retrieved = store.get_block(1)?.expect("Large block should exist");
    assert_eq!(retrieved.transactions.len(), 200);
    assert_eq!(retrieved, block);
    drop(ledger);
    teardown_store(temp_dir, store);
    Ok(())
}

#[tokio::test]
async fn test_storage_concurrent_readers() -> anyhow::Result<()> {
    let (temp_dir, store) = create_temp_store();
    let blocks = mined_chain(10, 1);
    for block in &blocks {
        store.put_block(block)?;
    }
    let store = Arc::new(store);
    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        handles.push(tokio::task::spawn_blocking(move || {
            let mut rng = rand::thread_rng();
            for _ in 0..50 {
                let n = rng.gen_range(0..=10u64);
                let block = store.get_block(n).unwrap().unwrap();
                assert_eq!(block.number(), n);
            }
        }));
    }
    for handle in handles {
        handle.await?;
    }
    let store = Arc::try_unwrap(store).ok().expect("sole owner");
    teardown_store(temp_dir, store);
    Ok(())
}

#[tokio::test]
async fn test_storage_corrupt_bytes_fail_gracefully() -> anyhow::Result<()> {
    let (temp_dir, db_path) = create_temp_dir();
    {
        let store = SledStore::open(&db_path)?;
        for block in mined_chain(1, 1) {
            store.put_block(&block)?;
        }
        store.close()?;
    }
    {
        let sled_db = sled::open(&db_path)?;
        let blocks = sled_db.open_tree("blocks")?;
        let previous = blocks.insert(1u64.to_be_bytes(), vec![0u8; 10])?;
        assert!(previous.is_some(), "Expected to overwrite the stored block");
        sled_db.flush()?;
    }
    let store = SledStore::open(&db_path)?;
    assert!(store.get_block(0)?.is_some());
    assert!(store.get_block(1).is_err(), "Corrupt bytes should surface as an error");
    assert!(Ledger::open(test_config(), Arc::new(store)).is_err());
    temp_dir.close()?;
    let _ = fs::remove_dir_all(db_path);
    Ok(())
}

#[tokio::test]
async fn test_reloaded_ledger_detects_on_disk_tampering() -> anyhow::Result<()> {
    let (temp_dir, db_path) = create_temp_dir();
    let victim = {
        let store = SledStore::open(&db_path)?;
        let ledger = Ledger::open(test_config(), Arc::new(store))?;
        let victim = ledger.submit("deviation", json!({"temp_dc": 97}))?;
        ledger.mine_block(None, None)?;
        ledger.submit("corrective-action", json!({"action": "quarantine"}))?;
        ledger.mine_block(None, None)?;
        victim
    };
    {
        let store = SledStore::open(&db_path)?;
        let mut block: Block = store.get_block(1)?.expect("block 1");
        block.transactions[0].payload = json!({"temp_dc": 45});
        store.put_block(&block)?;
    }

    let ledger = Ledger::open(test_config(), Arc::new(SledStore::open(&db_path)?))?;
    assert_eq!(ledger.chain_status(), ChainStatus::Unknown);
    let report = ledger.validate_chain();
    assert!(!report.is_valid);
    assert_eq!(report.invalid_blocks[0].block_number, 1);
    assert_eq!(report.invalid_blocks[0].reason, InvalidReason::MerkleRootMismatch);
    assert!(!ledger.verify_transaction(&victim.id).verified);
    assert_eq!(ledger.chain_summary().chain_status, ChainStatus::Invalid);
    drop(ledger);

    temp_dir.close()?;
    let _ = fs::remove_dir_all(db_path);
    Ok(())
}

#[tokio::test]
async fn test_float_payloads_revalidate_after_reload() -> anyhow::Result<()> {
    let (temp_dir, db_path) = create_temp_dir();
    let readings: Vec<f64> = (1..=50).map(|i| 0.1 * i as f64 / 7.0).collect();
    let before = {
        let ledger = Ledger::open(test_config(), Arc::new(SledStore::open(&db_path)?))?;
        ledger.submit("sensor-reading", json!({"temp_c": 0.1 / 7.0}))?;
        for chunk in readings.chunks(10) {
            for temp in chunk {
                ledger.submit("sensor-reading", json!({"temp_c": temp, "humidity": temp * 3.3}))?;
            }
            ledger.mine_block(None, None)?;
        }
        assert!(ledger.validate_chain().is_valid);
        ledger.get_chain()
    };

    let ledger = Ledger::open(test_config(), Arc::new(SledStore::open(&db_path)?))?;
    assert_eq!(ledger.get_chain(), before);
    let report = ledger.validate_chain();
    assert!(report.invalid_blocks.is_empty(), "{:?}", report.invalid_blocks);
    let reloaded = ledger.get_block(1).expect("block 1");
    let first = &reloaded.transactions[0];
    assert_eq!(first.payload["temp_c"].as_f64(), Some(0.1 / 7.0));
    assert!(ledger.verify_transaction(&first.id).verified);
    drop(ledger);

    temp_dir.close()?;
    let _ = fs::remove_dir_all(db_path);
    Ok(())
}

#[tokio::test]
async fn test_storage_repeated_open_close() -> anyhow::Result<()> {
    let (temp_dir, db_path) = create_temp_dir();
    for round in 0..5 {
        {
            let ledger = Ledger::open(test_config(), Arc::new(SledStore::open(&db_path)?))?;
            ledger.submit("sensor-reading", json!({"round": round}))?;
            ledger.mine_block(None, None)?;
        }
        {
            let store = SledStore::open(&db_path)?;
            assert_eq!(store.tip_height()?, Some(round + 1));
        }
    }
    let ledger = Ledger::open(test_config(), Arc::new(SledStore::open(&db_path)?))?;
    assert!(ledger.validate_chain().is_valid);
    assert_eq!(ledger.chain_summary().total_transactions, 5);
    drop(ledger);
    temp_dir.close()?;
    let _ = fs::remove_dir_all(db_path);
    Ok(())
}

#[tokio::test]
async fn test_storage_trait_compliance() -> anyhow::Result<()> {
    fn assert_store_trait<T: ChainStore>() {}
    assert_store_trait::<SledStore>();
    Ok(())
}
