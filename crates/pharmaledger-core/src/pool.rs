use std::collections::{HashSet, VecDeque};
use tracing::debug;

use crate::{LedgerError, Result, Transaction};

/// Pending transactions waiting to be mined, in arrival order.
///
/// The pool is not synchronized on its own; `Ledger` keeps it behind a mutex
/// and composes `drain`, mining and `append` into one serialized operation.
/// Drained ids stay reserved as in-flight until the batch is either settled
/// (appended) or restored, so a duplicate cannot slip in mid-search.
#[derive(Debug, Default)]
pub struct TransactionPool {
    pending: VecDeque<Transaction>,
    pending_ids: HashSet<String>,
    in_flight: HashSet<String>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// True if `id` is pending or part of a batch being mined.
    pub fn contains(&self, id: &str) -> bool {
        self.pending_ids.contains(id) || self.in_flight.contains(id)
    }

    /// Appends `tx` unless its id is already pooled or in flight. Chain-level
    /// duplicates are checked by the caller, which owns the chain index.
    pub fn enqueue(&mut self, tx: Transaction) -> Result<()> {
        if self.contains(&tx.id) {
            return Err(LedgerError::DuplicateTransaction(tx.id));
        }
        debug!(id = %tx.id, tx_type = %tx.tx_type, "transaction pooled");
        self.pending_ids.insert(tx.id.clone());
        self.pending.push_back(tx);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Transaction> {
        if !self.pending_ids.contains(id) {
            return None;
        }
        self.pending.iter().find(|t| t.id == id)
    }

    /// Current queue, unchanged.
    pub fn peek_all(&self) -> Vec<Transaction> {
        self.pending.iter().cloned().collect()
    }

    /// Removes and returns every pending transaction in arrival order.
    pub fn drain(&mut self) -> Vec<Transaction> {
        let batch: Vec<Transaction> = self.pending.drain(..).collect();
        for tx in &batch {
            self.pending_ids.remove(&tx.id);
            self.in_flight.insert(tx.id.clone());
        }
        if !batch.is_empty() {
            debug!(count = batch.len(), "pool drained");
        }
        batch
    }

    /// Releases the in-flight reservation for a batch that made it into the chain.
    pub fn settle(&mut self, batch: &[Transaction]) {
        for tx in batch {
            self.in_flight.remove(&tx.id);
        }
    }

    /// Drops pending copies of `ids` that reached the chain some other way.
    /// In-flight ids are left to the batch that holds them.
    pub fn forget(&mut self, ids: &[String]) {
        let before = self.pending.len();
        for id in ids {
            self.pending_ids.remove(id);
        }
        let pending_ids = &self.pending_ids;
        self.pending.retain(|tx| pending_ids.contains(&tx.id));
        if self.pending.len() != before {
            debug!(dropped = before - self.pending.len(), "pending transactions already in chain");
        }
    }

    /// Puts a drained batch back at the front of the queue, ahead of anything
    /// that arrived while it was being mined.
    pub fn restore(&mut self, batch: Vec<Transaction>) {
        debug!(count = batch.len(), "restoring drained batch");
        for tx in batch.into_iter().rev() {
            self.in_flight.remove(&tx.id);
            self.pending_ids.insert(tx.id.clone());
            self.pending.push_front(tx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tx(id: &str) -> Transaction {
        Transaction::with_id(id, "sensor-reading", 1, json!({"id": id}))
    }

    #[test]
    fn enqueue_preserves_arrival_order() {
        let mut pool = TransactionPool::new();
        for id in ["a", "b", "c"] {
            pool.enqueue(tx(id)).unwrap();
        }
        let ids: Vec<String> = pool.peek_all().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn duplicate_pending_id_is_rejected() {
        let mut pool = TransactionPool::new();
        pool.enqueue(tx("a")).unwrap();
        let err = pool.enqueue(tx("a")).unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateTransaction(id) if id == "a"));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn drain_is_exactly_once() {
        let mut pool = TransactionPool::new();
        pool.enqueue(tx("a")).unwrap();
        pool.enqueue(tx("b")).unwrap();
        assert_eq!(pool.drain().len(), 2);
        assert!(pool.drain().is_empty());
        assert!(pool.is_empty());
    }

    #[test]
    fn in_flight_ids_stay_reserved_until_settled() {
        let mut pool = TransactionPool::new();
        pool.enqueue(tx("a")).unwrap();
        let batch = pool.drain();
        assert!(pool.enqueue(tx("a")).is_err());
        pool.settle(&batch);
        assert!(!pool.contains("a"));
    }

    #[test]
    fn restore_puts_batch_ahead_of_newcomers() {
        let mut pool = TransactionPool::new();
        pool.enqueue(tx("a")).unwrap();
        pool.enqueue(tx("b")).unwrap();
        let batch = pool.drain();
        pool.enqueue(tx("c")).unwrap();
        pool.restore(batch);
        let ids: Vec<String> = pool.peek_all().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert!(pool.enqueue(tx("b")).is_err());
    }

    #[test]
    fn forget_drops_only_pending_copies() {
        let mut pool = TransactionPool::new();
        pool.enqueue(tx("a")).unwrap();
        let batch = pool.drain();
        pool.enqueue(tx("b")).unwrap();
        pool.enqueue(tx("c")).unwrap();
        pool.forget(&["a".to_string(), "b".to_string()]);
        let ids: Vec<String> = pool.peek_all().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, ["c"]);
        assert!(pool.contains("a"), "in-flight reservation survives");
        pool.settle(&batch);
        assert!(!pool.contains("a"));
    }

    #[test]
    fn peek_does_not_mutate() {
        let mut pool = TransactionPool::new();
        pool.enqueue(tx("a")).unwrap();
        let _ = pool.peek_all();
        assert_eq!(pool.len(), 1);
    }
}
