use anyhow::Result;

use crate::{Block, Hash};

/// Persistence backend for sealed blocks.
/// Lives in the core crate so storage crates can depend on it, not the reverse.
pub trait ChainStore: Send + Sync {
    fn put_block(&self, block: &Block) -> Result<()>;
    fn get_block(&self, number: u64) -> Result<Option<Block>>;
    /// Number of the highest stored block, `None` for an empty store.
    fn tip_height(&self) -> Result<Option<u64>>;
    fn tip_hash(&self) -> Result<Option<Hash>>;
    fn close(&self) -> Result<()>;

    /// Every stored block in order, stopping at the first gap.
    fn load_chain(&self) -> Result<Vec<Block>> {
        let Some(height) = self.tip_height()? else {
            return Ok(Vec::new());
        };
        let mut blocks = Vec::new();
        for number in 0..=height {
            match self.get_block(number)? {
                Some(block) => blocks.push(block),
                None => break,
            }
        }
        Ok(blocks)
    }
}
