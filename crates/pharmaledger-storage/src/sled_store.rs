use anyhow::{anyhow, Context, Result};
use pharmaledger_core::{Block, ChainStore, Hash};
use sled::{Db, IVec, Tree};
use std::path::Path;
use tracing::{debug, info};

const TREE_BLOCKS: &str = "blocks";
const KEY_TIP_HEIGHT: &[u8] = b"tip_height";
const KEY_TIP_HASH: &[u8] = b"tip_hash";

/// Blocks keyed by big-endian block number, stored as JSON so every field
/// survives a reload verbatim.
#[derive(Clone)]
pub struct SledStore {
  db: Db,
  blocks: Tree,
}

impl SledStore {
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
    let path = path.as_ref();
    let db = sled::open(path).with_context(|| format!("opening sled store at {}", path.display()))?;
    let blocks = db.open_tree(TREE_BLOCKS)?;
    info!(path = %path.display(), "sled store opened");
    Ok(Self { db, blocks })
  }

  /// Store that lives only as long as the process.
  pub fn temporary() -> Result<Self> {
    let db = sled::Config::new().temporary(true).open()?;
    let blocks = db.open_tree(TREE_BLOCKS)?;
    Ok(Self { db, blocks })
  }

  pub fn len(&self) -> usize {
    self.blocks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.blocks.is_empty()
  }

  /// Drops every block and the tip markers.
  pub fn clear(&self) -> Result<()> {
    self.blocks.clear()?;
    self.db.remove(KEY_TIP_HEIGHT)?;
    self.db.remove(KEY_TIP_HASH)?;
    self.db.flush()?;
    Ok(())
  }
}

fn decode_height(v: IVec) -> Result<u64> {
  let arr: [u8; 8] = v[..].try_into().map_err(|_| anyhow!("corrupt tip height ({} bytes)", v.len()))?;
  Ok(u64::from_be_bytes(arr))
}

impl ChainStore for SledStore {
  fn put_block(&self, block: &Block) -> Result<()> {
    let number = block.number();
    let bytes = serde_json::to_vec(block).context("encoding block")?;
    self.blocks.insert(number.to_be_bytes(), bytes)?;

    // tip only moves forward
    let current = self.tip_height()?;
    if current.is_none_or(|h| number >= h) {
      self.db.insert(KEY_TIP_HEIGHT, &number.to_be_bytes())?;
      self.db.insert(KEY_TIP_HASH, &block.current_hash)?;
    }

    self.db.flush()?;
    debug!(block = number, "block persisted");
    Ok(())
  }

  fn get_block(&self, number: u64) -> Result<Option<Block>> {
    self
      .blocks
      .get(number.to_be_bytes())?
      .map(|ivec: IVec| serde_json::from_slice(&ivec).with_context(|| format!("decoding block {number}")))
      .transpose()
  }

  fn tip_height(&self) -> Result<Option<u64>> {
    self.db.get(KEY_TIP_HEIGHT)?.map(decode_height).transpose()
  }

  fn tip_hash(&self) -> Result<Option<Hash>> {
    self
      .db
      .get(KEY_TIP_HASH)?
      .map(|v| -> Result<Hash> {
        v[..]
          .try_into()
          .map_err(|_| anyhow!("corrupt tip hash ({} bytes)", v.len()))
      })
      .transpose()
  }

  fn close(&self) -> Result<()> {
    self.db.flush()?;
    Ok(())
  }
}
