use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

use crate::chain::{TransactionVerification, ValidationReport};
use crate::miner::MiningRequest;
use crate::{
    Block, BlockType, CancelToken, Chain, ChainStatus, ChainStore, ChainSummary, ComplianceCheck,
    LedgerConfig, LedgerError, Miner, Result, Transaction, TransactionLocation, TransactionPool,
    TransactionType,
};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One authoritative ledger instance: pool, miner and chain behind the
/// locks that keep "drain, mine, append" a single serialized operation.
///
/// Locks are always taken chain first, then pool. Readers share the chain
/// lock and see the chain strictly before or after an append. The pool lock
/// is never held across the proof-of-work search, so producers can keep
/// enqueueing while a block is being mined.
pub struct Ledger {
    config: LedgerConfig,
    miner: Miner,
    chain: RwLock<Chain>,
    pool: Mutex<TransactionPool>,
    mining: Mutex<()>,
    active_job: Mutex<Option<CancelToken>>,
    last_validation: RwLock<Option<ValidationReport>>,
    store: Option<Arc<dyn ChainStore>>,
}

impl Ledger {
    /// In-memory ledger seeded with a freshly mined genesis block.
    pub fn new(config: LedgerConfig) -> Result<Self> {
        let miner = miner_for(&config);
        let genesis = miner.mine_genesis(config.genesis_sentinel, config.difficulty, &CancelToken::new())?;
        let chain = Chain::with_genesis(genesis, config.genesis_sentinel);
        Ok(Self::assemble(config, miner, chain, None))
    }

    /// Ledger backed by `store`. Existing blocks are loaded as-is and stay
    /// untrusted (`ChainStatus::Unknown`) until `validate_chain` runs; an
    /// empty store gets a new genesis block.
    pub fn open(config: LedgerConfig, store: Arc<dyn ChainStore>) -> Result<Self> {
        let miner = miner_for(&config);
        let blocks = store.load_chain()?;
        let chain = if blocks.is_empty() {
            let genesis = miner.mine_genesis(config.genesis_sentinel, config.difficulty, &CancelToken::new())?;
            store.put_block(&genesis)?;
            info!(facility = %config.facility_id, "seeded genesis block");
            Chain::with_genesis(genesis, config.genesis_sentinel)
        } else {
            info!(blocks = blocks.len(), "loaded chain from store");
            Chain::from_blocks(blocks, config.genesis_sentinel)?
        };
        Ok(Self::assemble(config, miner, chain, Some(store)))
    }

    fn assemble(config: LedgerConfig, miner: Miner, chain: Chain, store: Option<Arc<dyn ChainStore>>) -> Self {
        Self {
            config,
            miner,
            chain: RwLock::new(chain),
            pool: Mutex::new(TransactionPool::new()),
            mining: Mutex::new(()),
            active_job: Mutex::new(None),
            last_validation: RwLock::new(None),
            store,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Producer entry point: builds the transaction and pools it.
    pub fn submit(&self, tx_type: impl Into<TransactionType>, payload: serde_json::Value) -> Result<Transaction> {
        let tx = Transaction::new(tx_type, payload);
        self.enqueue(tx.clone())?;
        Ok(tx)
    }

    /// Pools `tx` unless its id is already pending, being mined, or in the chain.
    pub fn enqueue(&self, tx: Transaction) -> Result<()> {
        let chain = read(&self.chain);
        if chain.contains_transaction(&tx.id) {
            warn!(id = %tx.id, "rejected transaction already in chain");
            return Err(LedgerError::DuplicateTransaction(tx.id));
        }
        let mut pool = lock(&self.pool);
        pool.enqueue(tx).inspect_err(|e| warn!("rejected transaction: {e}"))
    }

    pub fn pending_transactions(&self) -> Vec<Transaction> {
        lock(&self.pool).peek_all()
    }

    pub fn pending_transaction(&self, id: &str) -> Option<Transaction> {
        lock(&self.pool).get(id).cloned()
    }

    /// Drains the pool and seals its contents into the next block.
    pub fn mine_block(
        &self,
        block_type: Option<BlockType>,
        compliance_checks: Option<Vec<ComplianceCheck>>,
    ) -> Result<Block> {
        let request = MiningRequest {
            block_type: block_type.unwrap_or_default(),
            compliance_checks: compliance_checks.unwrap_or_default(),
        };
        self.mine_with(request, CancelToken::new())
    }

    /// `mine_block` with a caller-held cancellation token. `cancel_mining`
    /// fires the same token.
    pub fn mine_with(&self, request: MiningRequest, cancel: CancelToken) -> Result<Block> {
        let _serial = lock(&self.mining);
        *lock(&self.active_job) = Some(cancel.clone());
        let result = self.drain_mine_append(request, &cancel);
        *lock(&self.active_job) = None;
        result
    }

    /// Abandons the in-progress search, if any. Pooled transactions stay pooled.
    pub fn cancel_mining(&self) -> bool {
        match lock(&self.active_job).as_ref() {
            Some(token) => {
                token.cancel();
                info!("mining cancellation requested");
                true
            }
            None => false,
        }
    }

    pub fn is_mining(&self) -> bool {
        lock(&self.active_job).is_some()
    }

    fn drain_mine_append(&self, request: MiningRequest, cancel: &CancelToken) -> Result<Block> {
        let mut batch = lock(&self.pool).drain();
        if batch.is_empty() && !self.config.allow_empty_blocks {
            return Err(LedgerError::NothingToMine);
        }

        let mut attempt = 1;
        loop {
            let previous = read(&self.chain).tip().clone();
            let mined = self.miner.mine(
                batch.clone(),
                &previous,
                self.config.difficulty,
                request.clone(),
                cancel,
            );
            let outcome = mined.and_then(|block| self.append_block(block.clone()).map(|_| block));
            match outcome {
                Ok(block) => {
                    lock(&self.pool).settle(&batch);
                    return Ok(block);
                }
                Err(LedgerError::ChainLinkMismatch { expected_number, .. })
                    if attempt < self.config.max_mine_attempts =>
                {
                    warn!(attempt, expected_number, "tip moved during mining, re-mining");
                    batch = self.release_chained(batch);
                    attempt += 1;
                }
                Err(e) => {
                    let batch = self.release_chained(batch);
                    warn!(txs = batch.len(), "mining failed, restoring batch: {e}");
                    lock(&self.pool).restore(batch);
                    return Err(e);
                }
            }
        }
    }

    /// Settles batch members another block already sealed and returns the rest.
    fn release_chained(&self, batch: Vec<Transaction>) -> Vec<Transaction> {
        let chain = read(&self.chain);
        let (sealed, rest): (Vec<_>, Vec<_>) =
            batch.into_iter().partition(|tx| chain.contains_transaction(&tx.id));
        if !sealed.is_empty() {
            lock(&self.pool).settle(&sealed);
        }
        rest
    }

    /// Appends a block sealed elsewhere, e.g. replayed from a backup or received
    /// from a peer facility. Pending copies of its transactions leave the pool.
    pub fn import_block(&self, block: Block) -> Result<()> {
        let ids: Vec<String> = block.transactions.iter().map(|tx| tx.id.clone()).collect();
        let number = block.number();
        let mut chain = write(&self.chain);
        self.commit(&mut chain, block)?;
        lock(&self.pool).forget(&ids);
        info!(block = number, txs = ids.len(), "imported block");
        Ok(())
    }

    fn append_block(&self, block: Block) -> Result<()> {
        let mut chain = write(&self.chain);
        self.commit(&mut chain, block)
    }

    /// Checks, persists, then appends `block` as the new tip.
    fn commit(&self, chain: &mut Chain, block: Block) -> Result<()> {
        chain.check_append(&block)?;
        if let Some(store) = &self.store {
            store.put_block(&block)?;
        }
        chain.push_unchecked(block);
        Ok(())
    }

    /// Full re-validation; the outcome drives `chain_status`.
    pub fn validate_chain(&self) -> ValidationReport {
        let report = read(&self.chain).validate();
        *write(&self.last_validation) = Some(report.clone());
        report
    }

    pub fn last_validation(&self) -> Option<ValidationReport> {
        read(&self.last_validation).clone()
    }

    pub fn chain_status(&self) -> ChainStatus {
        match read(&self.last_validation).as_ref() {
            None => ChainStatus::Unknown,
            Some(r) if r.is_valid => ChainStatus::Valid,
            Some(_) => ChainStatus::Invalid,
        }
    }

    pub fn verify_transaction(&self, id: &str) -> TransactionVerification {
        read(&self.chain).verify_transaction(id)
    }

    pub fn get_transaction(&self, id: &str) -> Option<TransactionLocation> {
        read(&self.chain).get_transaction(id)
    }

    pub fn get_block(&self, number: u64) -> Option<Block> {
        read(&self.chain).get_block(number).cloned()
    }

    pub fn latest_block(&self) -> Option<Block> {
        let chain = read(&self.chain);
        chain.blocks().last().cloned()
    }

    /// Snapshot of every block, oldest first.
    pub fn get_chain(&self) -> Vec<Block> {
        read(&self.chain).blocks().to_vec()
    }

    pub fn chain_summary(&self) -> ChainSummary {
        let status = self.chain_status();
        read(&self.chain).summary(&self.config.facility_id, status)
    }
}

fn miner_for(config: &LedgerConfig) -> Miner {
    Miner::new(config.miner_id.clone())
        .with_nonce_window(config.nonce_window)
        .allow_empty_blocks(config.allow_empty_blocks)
}
