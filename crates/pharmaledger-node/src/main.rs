use clap::Parser;
use pharmaledger_core::constants::{DEFAULT_FACILITY_ID, DEFAULT_MINER_ID, POW_TARGET_DIFFICULTY};
use pharmaledger_core::{ChainStore, Ledger, LedgerConfig};
use pharmaledger_node::constants::{
    DEFAULT_DATA_DIR, DEFAULT_HEALTH_INTERVAL_SECS, DEFAULT_LISTEN, DEFAULT_VALIDATE_EVERY,
};
use pharmaledger_node::{router, spawn_health_loop, AppState};
use pharmaledger_storage::SledStore;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tracing::{info, Level};

#[derive(Parser, Debug)]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, default_value = DEFAULT_LISTEN)]
    listen: String,

    /// Data directory for sled
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    data_dir: String,

    /// Facility this ledger records events for
    #[arg(long, default_value = DEFAULT_FACILITY_ID)]
    facility_id: String,

    /// Identity stamped into `minedBy`
    #[arg(long, default_value = DEFAULT_MINER_ID)]
    miner_id: String,

    /// Leading zero bits required of every block hash
    #[arg(long, default_value_t = POW_TARGET_DIFFICULTY)]
    difficulty: u32,

    #[arg(long, default_value_t = DEFAULT_HEALTH_INTERVAL_SECS)]
    health_interval_secs: u64,

    /// Re-validate the full chain every N health polls (0 = never)
    #[arg(long, default_value_t = DEFAULT_VALIDATE_EVERY)]
    validate_every: u64,

    /// Seal blocks even when the pool is empty
    #[arg(long)]
    allow_empty_blocks: bool,
}

impl Args {
    fn ledger_config(&self) -> LedgerConfig {
        let mut config = LedgerConfig::default()
            .with_facility(self.facility_id.clone())
            .with_miner(self.miner_id.clone())
            .with_difficulty(self.difficulty);
        config.allow_empty_blocks = self.allow_empty_blocks;
        config
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {e}");
    }
    info!("shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let store = Arc::new(SledStore::open(&args.data_dir)?);
    let ledger = Ledger::open(args.ledger_config(), store.clone())?;
    let summary = ledger.chain_summary();
    info!(
        facility = %summary.facility_id,
        blocks = summary.chain_length,
        difficulty = summary.difficulty,
        "ledger ready"
    );

    let state = AppState::new(ledger);
    let health = spawn_health_loop(
        state.clone(),
        Duration::from_secs(args.health_interval_secs.max(1)),
        args.validate_every,
    );
    let app = router(state.clone());

    let addr: SocketAddr = args.listen.parse()?;
    info!("pharmaledger-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    health.abort();
    state.ledger.cancel_mining();
    store.close()?;
    info!("pharmaledger-node stopped");
    Ok(())
}
