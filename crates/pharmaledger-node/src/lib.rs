//! HTTP node for the compliance ledger: an axum router over a shared
//! `Ledger` plus the background health poll loop.

pub mod api;
pub mod constants;
pub mod monitor;

use pharmaledger_core::{HealthMonitor, HealthSnapshot, Ledger};
use std::sync::{Arc, Mutex, RwLock};

pub use api::{router, ApiError};
pub use monitor::spawn_health_loop;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    /// Owned by the poll loop; held across full re-validations.
    pub health: Arc<Mutex<HealthMonitor>>,
    /// Latest published poll result, read by `/health/ledger`.
    pub snapshot: Arc<RwLock<HealthSnapshot>>,
}

impl AppState {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger: Arc::new(ledger),
            health: Arc::new(Mutex::new(HealthMonitor::new())),
            snapshot: Arc::new(RwLock::new(HealthSnapshot::default())),
        }
    }
}
