use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_FACILITY_ID, DEFAULT_MINER_ID, GENESIS_SENTINEL, MAX_MINE_ATTEMPTS, NONCE_WINDOW,
    POW_TARGET_DIFFICULTY,
};
use crate::{hex_hash, Hash};

/// Per-deployment ledger settings, injected at construction.
///
/// Difficulty is fixed for the lifetime of a deployment; there is no
/// retargeting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub facility_id: String,
    pub miner_id: String,
    pub difficulty: u32,
    #[serde(with = "hex_hash")]
    pub genesis_sentinel: Hash,
    pub allow_empty_blocks: bool,
    pub max_mine_attempts: u32,
    pub nonce_window: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            facility_id: DEFAULT_FACILITY_ID.to_string(),
            miner_id: DEFAULT_MINER_ID.to_string(),
            difficulty: POW_TARGET_DIFFICULTY,
            genesis_sentinel: GENESIS_SENTINEL,
            allow_empty_blocks: false,
            max_mine_attempts: MAX_MINE_ATTEMPTS,
            nonce_window: NONCE_WINDOW,
        }
    }
}

impl LedgerConfig {
    pub fn with_facility(mut self, facility_id: impl Into<String>) -> Self {
        self.facility_id = facility_id.into();
        self
    }

    pub fn with_difficulty(mut self, difficulty: u32) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_miner(mut self, miner_id: impl Into<String>) -> Self {
        self.miner_id = miner_id.into();
        self
    }
}
