pub const BYTE: usize = 8;
pub const HASH_SIZE: usize = 32;
/// Header pre-image: number, previous hash, merkle root, timestamp, nonce, difficulty.
pub const HEADER_PREIMAGE_SIZE: usize = 8 + HASH_SIZE + HASH_SIZE + 8 + 8 + 4;
pub const POW_TARGET_DIFFICULTY: u32 = 16;
pub const MAX_DIFFICULTY: u32 = (HASH_SIZE * BYTE) as u32;
pub const GENESIS_SENTINEL: [u8; HASH_SIZE] = [0u8; HASH_SIZE];
pub const EMPTY_MERKLE_ROOT: [u8; HASH_SIZE] = [0u8; HASH_SIZE];
pub const NONCE_WINDOW: u64 = 1 << 14;
pub const MAX_MINE_ATTEMPTS: u32 = 3;
pub const DEFAULT_FACILITY_ID: &str = "facility-0";
pub const DEFAULT_MINER_ID: &str = "ledger-miner";
