use serde::{Deserialize, Serialize};

use crate::constants::EMPTY_MERKLE_ROOT;
use crate::{hash_pair, hex_hash, Hash, Result, Transaction};

/// Binary Merkle tree over a block's transactions.
///
/// `levels[0]` holds the leaf hashes in transaction order and the last level
/// holds the root. An odd level pairs its last node with itself.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    ids: Vec<String>,
    levels: Vec<Vec<Hash>>,
}

/// Which side of the running hash the sibling sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    #[serde(with = "hex_hash")]
    pub sibling: Hash,
    pub side: Side,
    /// Node the tree held above this step when the proof was produced.
    #[serde(with = "hex_hash")]
    pub parent: Hash,
}

/// Inclusion proof from a leaf up to the root, ordered leaf first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf_index: usize,
    #[serde(with = "hex_hash")]
    pub leaf_hash: Hash,
    pub steps: Vec<ProofStep>,
}

/// Outcome of folding a proof.
///
/// `failed_step` is the index of the first step whose recomputed parent
/// diverged from the one recorded in the proof; `steps.len()` means every
/// step matched but the final hash differs from the expected root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofVerification {
    pub valid: bool,
    pub failed_step: Option<usize>,
}

impl ProofVerification {
    fn ok() -> Self {
        Self {
            valid: true,
            failed_step: None,
        }
    }

    fn failed(step: usize) -> Self {
        Self {
            valid: false,
            failed_step: Some(step),
        }
    }
}

impl MerkleTree {
    pub fn build(txs: &[Transaction]) -> Result<Self> {
        let leaves = txs
            .iter()
            .map(Transaction::leaf_hash)
            .collect::<Result<Vec<_>>>()?;
        let ids = txs.iter().map(|t| t.id.clone()).collect();
        Ok(Self::from_leaves(ids, leaves))
    }

    fn from_leaves(ids: Vec<String>, leaves: Vec<Hash>) -> Self {
        let mut levels = vec![leaves];
        while levels.last().map_or(0, Vec::len) > 1 {
            let level = &levels[levels.len() - 1];
            let next = level
                .chunks(2)
                .map(|pair| match pair {
                    [a, b] => hash_pair(a, b),
                    [a] => hash_pair(a, a),
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                })
                .collect();
            levels.push(next);
        }
        Self { ids, levels }
    }

    pub fn root(&self) -> Hash {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or(EMPTY_MERKLE_ROOT)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn leaf(&self, index: usize) -> Option<Hash> {
        self.levels.first().and_then(|l| l.get(index)).copied()
    }

    pub fn prove_inclusion(&self, tx_id: &str) -> Option<MerkleProof> {
        let index = self.ids.iter().position(|id| id == tx_id)?;
        self.prove_index(index)
    }

    pub fn prove_index(&self, index: usize) -> Option<MerkleProof> {
        let leaf_hash = self.leaf(index)?;
        let mut steps = Vec::with_capacity(self.levels.len().saturating_sub(1));
        let mut idx = index;
        for window in self.levels.windows(2) {
            let (level, parents) = (&window[0], &window[1]);
            let (sibling, side) = if idx % 2 == 0 {
                (level.get(idx + 1).unwrap_or(&level[idx]), Side::Right)
            } else {
                (&level[idx - 1], Side::Left)
            };
            steps.push(ProofStep {
                sibling: *sibling,
                side,
                parent: parents[idx / 2],
            });
            idx /= 2;
        }
        Some(MerkleProof {
            leaf_index: index,
            leaf_hash,
            steps,
        })
    }
}

/// Folds `proof` starting from `leaf_hash` and compares the result with `root`.
pub fn verify_inclusion(leaf_hash: &Hash, proof: &MerkleProof, root: &Hash) -> ProofVerification {
    let mut current = *leaf_hash;
    for (i, step) in proof.steps.iter().enumerate() {
        current = match step.side {
            Side::Right => hash_pair(&current, &step.sibling),
            Side::Left => hash_pair(&step.sibling, &current),
        };
        if current != step.parent {
            return ProofVerification::failed(i);
        }
    }
    if current != *root {
        return ProofVerification::failed(proof.steps.len());
    }
    ProofVerification::ok()
}

/// Root of `txs` without keeping the tree around.
pub fn merkle_root(txs: &[Transaction]) -> Result<Hash> {
    Ok(MerkleTree::build(txs)?.root())
}
