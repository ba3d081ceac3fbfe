//! Append-only, tamper-evident ledger for pharmaceutical-storage compliance
//! events: a transaction pool, Merkle commitments, proof-of-work sealed
//! blocks and a hash-linked chain that can be re-validated at any time.

pub mod block;
pub mod chain;
pub mod config;
pub mod constants;
pub mod error;
pub mod health;
pub mod ledger;
pub mod merkle;
pub mod miner;
pub mod pool;
pub mod store;
pub mod transaction;

use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

pub use block::{Block, BlockHeader, BlockType, ComplianceCheck};
pub use chain::{Chain, ChainStatus, ChainSummary, TransactionLocation, ValidationReport};
pub use config::LedgerConfig;
pub use error::{LedgerError, Result};
pub use health::{HealthMonitor, HealthSnapshot, HealthStatus};
pub use ledger::Ledger;
pub use merkle::{MerkleProof, MerkleTree, ProofVerification};
pub use miner::{CancelToken, Miner, MiningRequest};
pub use pool::TransactionPool;
pub use store::ChainStore;
pub use transaction::{Transaction, TransactionType};

pub type Hash = [u8; 32];

pub fn sha256(bytes: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..]);
    out
}

/// Parent node of two Merkle children.
pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..]);
    out
}

/// Unix time in milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

pub mod pow {
    use super::Hash;
    use crate::block::BlockHeader;
    use crate::miner::CancelToken;
    use rayon::prelude::*;

    pub fn count_leading_zero_bits(hash: &Hash) -> u32 {
        let mut total = 0u32;
        for b in hash {
            if *b == 0 {
                total += 8;
            } else {
                total += b.leading_zeros();
                break;
            }
        }
        total
    }

    pub fn meets_difficulty(hash: &Hash, difficulty: u32) -> bool {
        count_leading_zero_bits(hash) >= difficulty
    }

    /// Searches for the smallest nonce whose header hash has at least
    /// `header.difficulty` leading zero bits.
    ///
    /// The nonce space is scanned in ascending windows of `window` nonces and
    /// each window is split across the rayon pool with `find_first`, so the
    /// result is the same nonce a sequential scan from 0 would find.
    /// Returns `None` if `cancel` fires or the nonce space is exhausted.
    pub fn search_nonce(header: &BlockHeader, window: u64, cancel: &CancelToken) -> Option<u64> {
        let window = window.max(1);
        let base = *header;
        let mut start = 0u64;
        loop {
            let end = start.saturating_add(window);
            let found = (start..end).into_par_iter().find_first(|nonce| {
                if cancel.is_cancelled() {
                    return true;
                }
                meets_difficulty(&base.with_nonce(*nonce).hash(), base.difficulty)
            });
            if cancel.is_cancelled() {
                return None;
            }
            if found.is_some() {
                return found;
            }
            if end == u64::MAX {
                return None;
            }
            start = end;
        }
    }
}

/// Serde adapter rendering a `Hash` as lowercase hex.
pub mod hex_hash {
    use super::Hash;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &Hash, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(hash))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Hash, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(D::Error::custom)
    }

    pub fn parse(s: &str) -> Result<Hash, String> {
        let bytes = hex::decode(s).map_err(|e| e.to_string())?;
        if bytes.len() != 32 {
            return Err(format!("expected 32-byte hash, got {} bytes", bytes.len()));
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(out)
    }
}
