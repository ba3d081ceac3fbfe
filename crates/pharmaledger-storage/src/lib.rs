//! Persistent `ChainStore` backends for the compliance ledger.

pub mod sled_store;

pub use pharmaledger_core::ChainStore;
pub use sled_store::SledStore;
