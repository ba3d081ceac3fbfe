use serde::{Deserialize, Serialize};

use crate::{now_millis, Ledger};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Unknown,
    Healthy,
    Degraded,
}

/// Cached view of ledger health. Rates are per minute.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub block_rate: f64,
    pub transaction_rate: f64,
    pub last_validation: Option<u64>,
    pub invalid_blocks: usize,
    pub chain_length: usize,
    pub total_transactions: usize,
    pub pending_transactions: usize,
    pub polled_at: u64,
}

/// Read-only monitor over a `Ledger`.
///
/// Status only moves on validation outcomes: the first clean report makes it
/// healthy, any report with invalid blocks makes it degraded, and it stays
/// degraded until a later report comes back fully valid.
#[derive(Debug, Default)]
pub struct HealthMonitor {
    snapshot: HealthSnapshot,
    polled: bool,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> &HealthSnapshot {
        &self.snapshot
    }

    pub fn poll(&mut self, ledger: &Ledger, revalidate: bool) -> HealthSnapshot {
        self.poll_at(ledger, revalidate, now_millis())
    }

    /// `poll` with an explicit clock, in Unix milliseconds.
    pub fn poll_at(&mut self, ledger: &Ledger, revalidate: bool, now: u64) -> HealthSnapshot {
        if revalidate {
            ledger.validate_chain();
        }
        let summary = ledger.chain_summary();
        let prev = &self.snapshot;

        let (block_rate, transaction_rate) = if self.polled && now > prev.polled_at {
            let minutes = (now - prev.polled_at) as f64 / 60_000.0;
            (
                summary.chain_length.saturating_sub(prev.chain_length) as f64 / minutes,
                summary.total_transactions.saturating_sub(prev.total_transactions) as f64 / minutes,
            )
        } else {
            (prev.block_rate, prev.transaction_rate)
        };

        let (status, last_validation, invalid_blocks) = match ledger.last_validation() {
            Some(report) if report.is_valid => (HealthStatus::Healthy, Some(report.validated_at), 0),
            Some(report) => (
                HealthStatus::Degraded,
                Some(report.validated_at),
                report.invalid_blocks.len(),
            ),
            None => (prev.status, prev.last_validation, prev.invalid_blocks),
        };

        self.snapshot = HealthSnapshot {
            status,
            block_rate,
            transaction_rate,
            last_validation,
            invalid_blocks,
            chain_length: summary.chain_length,
            total_transactions: summary.total_transactions,
            pending_transactions: ledger.pending_transactions().len(),
            polled_at: now,
        };
        self.polled = true;
        self.snapshot.clone()
    }
}
