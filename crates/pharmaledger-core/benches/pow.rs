use criterion::{criterion_group, criterion_main, Criterion};
use pharmaledger_core::miner::MiningRequest;
use pharmaledger_core::{merkle::MerkleTree, CancelToken, Miner, Transaction};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::json;

fn batch() -> Vec<Transaction> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..10)
        .map(|i| {
            Transaction::with_id(
                format!("bench-{i}"),
                "sensor-reading",
                1_700_000_000_000 + i,
                json!({"sensor": format!("fridge-{i}"), "temp_dc": rng.gen_range(20..80)}),
            )
        })
        .collect()
}

fn bench_pow(c: &mut Criterion) {
    let miner = Miner::new("bench");
    let genesis = miner
        .mine_genesis([0u8; 32], 8, &CancelToken::new())
        .expect("genesis");
    let txs = batch();

    c.bench_function("mine_block_target_16", |b| {
        b.iter(|| {
            let _mined = miner
                .mine_at(
                    txs.clone(),
                    &genesis,
                    16,
                    MiningRequest::default(),
                    1_700_000_000_000,
                    &CancelToken::new(),
                )
                .expect("mined");
        });
    });

    c.bench_function("merkle_root_1000", |b| {
        let big: Vec<Transaction> = (0..100).flat_map(|_| batch()).collect();
        b.iter(|| MerkleTree::build(&big).expect("tree").root());
    });
}

criterion_group!(benches, bench_pow);
criterion_main!(benches);
