use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::time::Instant;
use tracing::{info, warn};

use crate::merkle::{verify_inclusion, MerkleTree};
use crate::{now_millis, Block, Hash, LedgerError, Result, Transaction};

/// Why a block failed validation. The first failing check wins per block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidReason {
    #[serde(rename = "genesis mismatch")]
    GenesisMismatch,
    #[serde(rename = "block number gap")]
    BlockNumberGap,
    #[serde(rename = "previous hash mismatch")]
    PreviousHashMismatch,
    #[serde(rename = "merkle root mismatch")]
    MerkleRootMismatch,
    #[serde(rename = "hash mismatch")]
    HashMismatch,
    #[serde(rename = "insufficient proof of work")]
    InsufficientWork,
    #[serde(rename = "duplicate transaction")]
    DuplicateTransaction,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InvalidReason::GenesisMismatch => "genesis mismatch",
            InvalidReason::BlockNumberGap => "block number gap",
            InvalidReason::PreviousHashMismatch => "previous hash mismatch",
            InvalidReason::MerkleRootMismatch => "merkle root mismatch",
            InvalidReason::HashMismatch => "hash mismatch",
            InvalidReason::InsufficientWork => "insufficient proof of work",
            InvalidReason::DuplicateTransaction => "duplicate transaction",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidBlock {
    pub block_number: u64,
    pub reason: InvalidReason,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub total_blocks: usize,
    pub validated_blocks: usize,
    pub invalid_blocks: Vec<InvalidBlock>,
    pub validation_time_ms: u64,
    pub validated_at: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainStatus {
    #[default]
    Unknown,
    Valid,
    Invalid,
}

/// A transaction together with the block that holds it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionLocation {
    pub transaction: Transaction,
    pub block_number: u64,
    pub block_hash: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationFailure {
    #[serde(rename = "not found")]
    NotFound,
    #[serde(rename = "inclusion proof failed")]
    InclusionProofFailed,
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationFailure::NotFound => f.write_str("not found"),
            VerificationFailure::InclusionProofFailed => f.write_str("inclusion proof failed"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionVerification {
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<VerificationFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<usize>,
}

impl TransactionVerification {
    fn verified(block_number: u64) -> Self {
        Self {
            verified: true,
            block_number: Some(block_number),
            reason: None,
            failed_step: None,
        }
    }

    fn not_found() -> Self {
        Self {
            verified: false,
            block_number: None,
            reason: Some(VerificationFailure::NotFound),
            failed_step: None,
        }
    }

    fn proof_failed(block_number: u64, step: usize) -> Self {
        Self {
            verified: false,
            block_number: Some(block_number),
            reason: Some(VerificationFailure::InclusionProofFailed),
            failed_step: Some(step),
        }
    }

    /// Turns a failed verification into the matching `LedgerError`.
    pub fn into_result(self, tx_id: &str) -> Result<u64> {
        match (self.verified, self.reason, self.block_number) {
            (true, _, Some(n)) => Ok(n),
            (_, Some(VerificationFailure::InclusionProofFailed), _) => {
                Err(LedgerError::MerkleVerificationFailed {
                    step: self.failed_step.unwrap_or_default(),
                })
            }
            _ => Err(LedgerError::TransactionNotFound(tx_id.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSummary {
    pub chain_length: usize,
    pub total_transactions: usize,
    pub transaction_types: BTreeMap<String, usize>,
    pub difficulty: u32,
    pub facility_id: String,
    pub created_at: u64,
    pub last_updated: u64,
    pub chain_status: ChainStatus,
}

/// Ordered, append-only sequence of blocks plus a transaction index.
#[derive(Clone, Debug)]
pub struct Chain {
    blocks: Vec<Block>,
    tx_index: HashMap<String, (usize, usize)>,
    genesis_sentinel: Hash,
    created_at: u64,
    last_updated: u64,
}

impl Chain {
    /// Starts a chain from a mined genesis block.
    pub fn with_genesis(genesis: Block, genesis_sentinel: Hash) -> Self {
        let created_at = genesis.header.timestamp;
        Self {
            blocks: vec![genesis],
            tx_index: HashMap::new(),
            genesis_sentinel,
            created_at,
            last_updated: created_at,
        }
    }

    /// Rebuilds a chain from stored blocks without checking them.
    /// Run `validate` afterwards; nothing here repairs a tampered chain.
    pub fn from_blocks(blocks: Vec<Block>, genesis_sentinel: Hash) -> Result<Self> {
        let first = blocks.first().ok_or(LedgerError::BlockNotFound(0))?;
        let created_at = first.header.timestamp;
        let last_updated = blocks.last().map_or(created_at, |b| b.header.timestamp);
        let mut tx_index = HashMap::new();
        for (bi, block) in blocks.iter().enumerate() {
            for (ti, tx) in block.transactions.iter().enumerate() {
                tx_index.entry(tx.id.clone()).or_insert((bi, ti));
            }
        }
        Ok(Self {
            blocks,
            tx_index,
            genesis_sentinel,
            created_at,
            last_updated,
        })
    }

    pub fn tip(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn contains_transaction(&self, id: &str) -> bool {
        self.tx_index.contains_key(id)
    }

    pub fn total_transactions(&self) -> usize {
        self.blocks.iter().map(|b| b.transactions.len()).sum()
    }

    /// Appends `block` as the new tip.
    ///
    /// Linkage is checked first (`ChainLinkMismatch` means the caller mined
    /// against a stale tip), then the block's own seal and Merkle root, then
    /// transaction id uniqueness across the chain.
    pub fn append(&mut self, block: Block) -> Result<()> {
        self.check_append(&block)?;
        self.push_unchecked(block);
        Ok(())
    }

    /// The checks `append` runs, without mutating anything.
    pub fn check_append(&self, block: &Block) -> Result<()> {
        let tip = self.tip();
        let expected_number = tip.number() + 1;
        if block.number() != expected_number || block.header.previous_hash != tip.current_hash {
            return Err(LedgerError::ChainLinkMismatch {
                expected_number,
                got_number: block.number(),
            });
        }
        if let Some(reason) = seal_problem(block) {
            return Err(LedgerError::ChainIntegrityViolation {
                block_number: block.number(),
                reason,
            });
        }
        let mut ids = HashSet::new();
        for tx in &block.transactions {
            if self.tx_index.contains_key(&tx.id) || !ids.insert(tx.id.as_str()) {
                return Err(LedgerError::DuplicateTransaction(tx.id.clone()));
            }
        }
        Ok(())
    }

    pub(crate) fn push_unchecked(&mut self, block: Block) {
        let bi = self.blocks.len();
        for (ti, tx) in block.transactions.iter().enumerate() {
            self.tx_index.insert(tx.id.clone(), (bi, ti));
        }
        info!(
            block = block.number(),
            txs = block.transactions.len(),
            hash = %block.hash_hex(),
            "block appended"
        );
        self.last_updated = block.header.timestamp;
        self.blocks.push(block);
    }

    pub fn get_block(&self, number: u64) -> Option<&Block> {
        usize::try_from(number).ok().and_then(|i| self.blocks.get(i))
    }

    pub fn get_transaction(&self, id: &str) -> Option<TransactionLocation> {
        let (bi, ti) = *self.tx_index.get(id)?;
        let block = &self.blocks[bi];
        Some(TransactionLocation {
            transaction: block.transactions[ti].clone(),
            block_number: block.number(),
            block_hash: block.hash_hex(),
        })
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Re-checks every block. Keeps going past failures so independent
    /// corruptions all show up in one report.
    pub fn validate(&self) -> ValidationReport {
        let started = Instant::now();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut invalid_blocks = Vec::new();

        for (i, block) in self.blocks.iter().enumerate() {
            let mut duplicate = false;
            for tx in &block.transactions {
                if !seen.insert(tx.id.as_str()) {
                    duplicate = true;
                }
            }
            let previous = i.checked_sub(1).map(|p| &self.blocks[p]);
            let reason = self
                .link_problem(i, block, previous)
                .or_else(|| seal_problem(block))
                .or(duplicate.then_some(InvalidReason::DuplicateTransaction));
            if let Some(reason) = reason {
                invalid_blocks.push(InvalidBlock {
                    block_number: block.number(),
                    reason,
                });
            }
        }

        let total_blocks = self.blocks.len();
        let report = ValidationReport {
            is_valid: invalid_blocks.is_empty(),
            total_blocks,
            validated_blocks: total_blocks - invalid_blocks.len(),
            invalid_blocks,
            validation_time_ms: started.elapsed().as_millis() as u64,
            validated_at: now_millis(),
        };
        if report.is_valid {
            info!(blocks = total_blocks, ms = report.validation_time_ms, "chain valid");
        } else {
            warn!(
                blocks = total_blocks,
                invalid = report.invalid_blocks.len(),
                "chain integrity violation"
            );
        }
        report
    }

    fn link_problem(&self, i: usize, block: &Block, previous: Option<&Block>) -> Option<InvalidReason> {
        match previous {
            None if block.number() != 0 || block.header.previous_hash != self.genesis_sentinel => {
                Some(InvalidReason::GenesisMismatch)
            }
            None => None,
            Some(_) if block.number() != i as u64 => Some(InvalidReason::BlockNumberGap),
            Some(prev) if block.header.previous_hash != prev.current_hash => {
                Some(InvalidReason::PreviousHashMismatch)
            }
            Some(_) => None,
        }
    }

    /// Rebuilds the block's Merkle proof for `id` and checks it against the
    /// stored root.
    pub fn verify_transaction(&self, id: &str) -> TransactionVerification {
        let Some(&(bi, ti)) = self.tx_index.get(id) else {
            return TransactionVerification::not_found();
        };
        let block = &self.blocks[bi];
        let number = block.number();

        let proved = MerkleTree::build(&block.transactions).ok().and_then(|tree| {
            let proof = tree.prove_index(ti)?;
            let leaf = block.transactions[ti].leaf_hash().ok()?;
            Some(verify_inclusion(&leaf, &proof, &block.header.merkle_root))
        });
        match proved {
            Some(outcome) if outcome.valid => TransactionVerification::verified(number),
            Some(outcome) => {
                warn!(tx = id, block = number, "merkle inclusion proof failed");
                TransactionVerification::proof_failed(number, outcome.failed_step.unwrap_or_default())
            }
            None => TransactionVerification::proof_failed(number, 0),
        }
    }

    pub fn summary(&self, facility_id: &str, chain_status: ChainStatus) -> ChainSummary {
        let mut transaction_types = BTreeMap::new();
        for tx in self.blocks.iter().flat_map(|b| b.transactions.iter()) {
            *transaction_types.entry(tx.tx_type.to_string()).or_insert(0) += 1;
        }
        ChainSummary {
            chain_length: self.blocks.len(),
            total_transactions: self.total_transactions(),
            transaction_types,
            difficulty: self.tip().header.difficulty,
            facility_id: facility_id.to_string(),
            created_at: self.created_at,
            last_updated: self.last_updated,
            chain_status,
        }
    }
}

/// Merkle root, header hash and proof-of-work, in that order.
fn seal_problem(block: &Block) -> Option<InvalidReason> {
    let root_ok = MerkleTree::build(&block.transactions)
        .map(|t| t.root() == block.header.merkle_root)
        .unwrap_or(false);
    if !root_ok {
        return Some(InvalidReason::MerkleRootMismatch);
    }
    if !block.seal_is_valid() {
        return Some(InvalidReason::HashMismatch);
    }
    if !block.meets_difficulty() {
        return Some(InvalidReason::InsufficientWork);
    }
    None
}
