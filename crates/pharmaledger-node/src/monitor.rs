use std::sync::PoisonError;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use pharmaledger_core::HealthStatus;

use crate::AppState;

/// Polls the ledger every `interval`, running a full re-validation on every
/// `validate_every`-th poll (the first poll included). `validate_every == 0`
/// never re-validates.
pub fn spawn_health_loop(state: AppState, interval: Duration, validate_every: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        let mut tick: u64 = 0;
        loop {
            ticker.tick().await;
            let revalidate = validate_every > 0 && tick % validate_every == 0;
            tick += 1;

            let state = state.clone();
            let polled = tokio::task::spawn_blocking(move || {
                let snapshot = {
                    let mut monitor = state.health.lock().unwrap_or_else(PoisonError::into_inner);
                    monitor.poll(&state.ledger, revalidate)
                };
                *state.snapshot.write().unwrap_or_else(PoisonError::into_inner) = snapshot.clone();
                snapshot
            })
            .await;

            match polled {
                Ok(snapshot) if snapshot.status == HealthStatus::Degraded => warn!(
                    invalid_blocks = snapshot.invalid_blocks,
                    chain_length = snapshot.chain_length,
                    "ledger health degraded"
                ),
                Ok(snapshot) => debug!(
                    status = ?snapshot.status,
                    block_rate = snapshot.block_rate,
                    transaction_rate = snapshot.transaction_rate,
                    "health poll"
                ),
                Err(e) => warn!("health poll task failed: {e}"),
            }
        }
    })
}
