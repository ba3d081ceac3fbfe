use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::HEADER_PREIMAGE_SIZE;
use crate::{hex_hash, pow, sha256, Hash, Transaction};

/// Fields covered by `current_hash` and the proof-of-work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub block_number: u64,
    pub timestamp: u64,
    #[serde(with = "hex_hash")]
    pub previous_hash: Hash,
    #[serde(with = "hex_hash")]
    pub merkle_root: Hash,
    pub nonce: u64,
    pub difficulty: u32,
}

impl BlockHeader {
    pub fn new(
        block_number: u64,
        previous_hash: Hash,
        merkle_root: Hash,
        timestamp: u64,
        difficulty: u32,
    ) -> Self {
        Self {
            block_number,
            timestamp,
            previous_hash,
            merkle_root,
            nonce: 0,
            difficulty,
        }
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn hash_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_PREIMAGE_SIZE);
        bytes.extend_from_slice(&self.block_number.to_le_bytes());
        bytes.extend_from_slice(&self.previous_hash);
        bytes.extend_from_slice(&self.merkle_root);
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        bytes.extend_from_slice(&self.nonce.to_le_bytes());
        bytes.extend_from_slice(&self.difficulty.to_le_bytes());
        bytes
    }

    pub fn hash(&self) -> Hash {
        sha256(&self.hash_bytes())
    }
}

/// Classification chosen by whoever triggered mining.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BlockType {
    Genesis,
    #[default]
    Standard,
    ComplianceAudit,
    Other(String),
}

impl BlockType {
    pub fn as_str(&self) -> &str {
        match self {
            BlockType::Genesis => "genesis",
            BlockType::Standard => "standard",
            BlockType::ComplianceAudit => "compliance-audit",
            BlockType::Other(s) => s,
        }
    }
}

impl From<String> for BlockType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "genesis" => BlockType::Genesis,
            "standard" => BlockType::Standard,
            "compliance-audit" => BlockType::ComplianceAudit,
            _ => BlockType::Other(s),
        }
    }
}

impl From<&str> for BlockType {
    fn from(s: &str) -> Self {
        BlockType::from(s.to_string())
    }
}

impl From<BlockType> for String {
    fn from(t: BlockType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compliance check outcome snapshotted into a block when it is sealed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceCheck {
    #[serde(rename = "type")]
    pub check_type: String,
    pub passed: bool,
}

impl ComplianceCheck {
    pub fn new(check_type: impl Into<String>, passed: bool) -> Self {
        Self {
            check_type: check_type.into(),
            passed,
        }
    }
}

/// A sealed block. Only the miner builds these; the chain never edits them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    #[serde(with = "hex_hash")]
    pub current_hash: Hash,
    pub transactions: Vec<Transaction>,
    pub mined_by: String,
    pub block_type: BlockType,
    #[serde(default)]
    pub compliance_checks: Vec<ComplianceCheck>,
}

impl Block {
    pub fn number(&self) -> u64 {
        self.header.block_number
    }

    /// Recomputes the header hash; compare with `current_hash` to detect edits.
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn seal_is_valid(&self) -> bool {
        self.hash() == self.current_hash
    }

    pub fn meets_difficulty(&self) -> bool {
        pow::meets_difficulty(&self.current_hash, self.header.difficulty)
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.current_hash)
    }
}
