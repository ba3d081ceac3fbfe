use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::constants::{MAX_DIFFICULTY, NONCE_WINDOW};
use crate::merkle::MerkleTree;
use crate::{
    now_millis, pow, Block, BlockHeader, BlockType, ComplianceCheck, Hash, LedgerError, Result,
    Transaction,
};

/// Shared flag used to abandon an in-progress nonce search.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Everything a block needs besides its transactions and parent.
#[derive(Clone, Debug, Default)]
pub struct MiningRequest {
    pub block_type: BlockType,
    pub compliance_checks: Vec<ComplianceCheck>,
}

/// Seals blocks by proof-of-work.
#[derive(Clone, Debug)]
pub struct Miner {
    miner_id: String,
    nonce_window: u64,
    allow_empty: bool,
}

impl Miner {
    pub fn new(miner_id: impl Into<String>) -> Self {
        Self {
            miner_id: miner_id.into(),
            nonce_window: NONCE_WINDOW,
            allow_empty: false,
        }
    }

    pub fn with_nonce_window(mut self, window: u64) -> Self {
        self.nonce_window = window.max(1);
        self
    }

    pub fn allow_empty_blocks(mut self, allow: bool) -> Self {
        self.allow_empty = allow;
        self
    }

    pub fn miner_id(&self) -> &str {
        &self.miner_id
    }

    /// Seals `txs` on top of `previous` with the current time as block timestamp.
    pub fn mine(
        &self,
        txs: Vec<Transaction>,
        previous: &Block,
        difficulty: u32,
        request: MiningRequest,
        cancel: &CancelToken,
    ) -> Result<Block> {
        self.mine_at(txs, previous, difficulty, request, now_millis(), cancel)
    }

    /// Like `mine` but with an explicit timestamp. Identical inputs always
    /// produce the same nonce and hash.
    pub fn mine_at(
        &self,
        txs: Vec<Transaction>,
        previous: &Block,
        difficulty: u32,
        request: MiningRequest,
        timestamp: u64,
        cancel: &CancelToken,
    ) -> Result<Block> {
        if txs.is_empty() && !self.allow_empty {
            return Err(LedgerError::NothingToMine);
        }
        self.seal(
            previous.number() + 1,
            previous.current_hash,
            txs,
            difficulty,
            request,
            timestamp,
            cancel,
        )
    }

    /// Seals block 0 on top of `sentinel`.
    pub fn mine_genesis(&self, sentinel: Hash, difficulty: u32, cancel: &CancelToken) -> Result<Block> {
        let request = MiningRequest {
            block_type: BlockType::Genesis,
            compliance_checks: Vec::new(),
        };
        self.seal(0, sentinel, Vec::new(), difficulty, request, now_millis(), cancel)
    }

    #[allow(clippy::too_many_arguments)]
    fn seal(
        &self,
        block_number: u64,
        previous_hash: Hash,
        txs: Vec<Transaction>,
        difficulty: u32,
        request: MiningRequest,
        timestamp: u64,
        cancel: &CancelToken,
    ) -> Result<Block> {
        if difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::InvalidDifficulty(difficulty));
        }
        let merkle_root = MerkleTree::build(&txs)?.root();
        let template = BlockHeader::new(block_number, previous_hash, merkle_root, timestamp, difficulty);

        let nonce = pow::search_nonce(&template, self.nonce_window, cancel)
            .ok_or(LedgerError::MiningCancelled)?;
        let header = template.with_nonce(nonce);
        let current_hash = header.hash();

        info!(
            block = block_number,
            nonce,
            difficulty,
            txs = txs.len(),
            hash = %hex::encode(current_hash),
            "mined block"
        );

        Ok(Block {
            header,
            current_hash,
            transactions: txs,
            mined_by: self.miner_id.clone(),
            block_type: request.block_type,
            compliance_checks: request.compliance_checks,
        })
    }
}
