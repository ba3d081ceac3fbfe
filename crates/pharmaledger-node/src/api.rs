use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use pharmaledger_core::{BlockType, ComplianceCheck, LedgerError, TransactionType};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::PoisonError;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::constants::MAX_BODY_BYTES;
use crate::AppState;

#[derive(Debug)]
pub enum ApiError {
    Ledger(LedgerError),
    BadRequest(String),
    Internal(String),
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        ApiError::Ledger(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Ledger(e) => match e {
                LedgerError::DuplicateTransaction(_)
                | LedgerError::ChainLinkMismatch { .. }
                | LedgerError::MiningCancelled
                | LedgerError::ChainIntegrityViolation { .. } => StatusCode::CONFLICT,
                LedgerError::NothingToMine | LedgerError::MerkleVerificationFailed { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                LedgerError::TransactionNotFound(_) | LedgerError::BlockNotFound(_) => StatusCode::NOT_FOUND,
                LedgerError::InvalidDifficulty(_) => StatusCode::BAD_REQUEST,
                LedgerError::Serialization(_) | LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Ledger(e) => e.to_string(),
            ApiError::BadRequest(m) | ApiError::Internal(m) => m,
        };
        if status.is_server_error() {
            warn!(%status, "request failed: {message}");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct Liveness {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct TxIn {
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct MineIn {
    pub block_type: Option<BlockType>,
    pub compliance_checks: Option<Vec<ComplianceCheck>>,
}

async fn liveness() -> Json<Liveness> {
    Json(Liveness { status: "ok" })
}

async fn ledger_health(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.snapshot.read().unwrap_or_else(PoisonError::into_inner).clone();
    Json(snapshot)
}

async fn get_chain(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.ledger.get_chain())
}

async fn chain_summary(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.ledger.chain_summary())
}

async fn latest_block(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let block = state.ledger.latest_block().ok_or(LedgerError::BlockNotFound(0))?;
    Ok(Json(block))
}

async fn get_block(State(state): State<AppState>, Path(number): Path<u64>) -> ApiResult<impl IntoResponse> {
    let block = state
        .ledger
        .get_block(number)
        .ok_or(LedgerError::BlockNotFound(number))?;
    Ok(Json(block))
}

async fn validate_chain(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let ledger = state.ledger.clone();
    let report = tokio::task::spawn_blocking(move || ledger.validate_chain())
        .await
        .map_err(|e| ApiError::Internal(format!("validation task failed: {e}")))?;
    Ok(Json(report))
}

async fn mempool(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.ledger.pending_transactions())
}

async fn submit_tx(State(state): State<AppState>, Json(tx): Json<TxIn>) -> ApiResult<impl IntoResponse> {
    let tx = state.ledger.submit(tx.tx_type, tx.payload)?;
    Ok((StatusCode::CREATED, Json(tx)))
}

/// Mined transactions first, then the pool, so a pending id is still found.
async fn get_tx(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<impl IntoResponse> {
    if let Some(location) = state.ledger.get_transaction(&id) {
        return Ok(Json(json!({ "status": "mined", "location": location })));
    }
    match state.ledger.pending_transaction(&id) {
        Some(tx) => Ok(Json(json!({ "status": "pending", "transaction": tx }))),
        None => Err(LedgerError::TransactionNotFound(id).into()),
    }
}

async fn verify_tx(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    Json(state.ledger.verify_transaction(&id))
}

async fn mine(State(state): State<AppState>, body: Bytes) -> ApiResult<impl IntoResponse> {
    let request: MineIn = if body.is_empty() {
        MineIn::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(format!("invalid mine request: {e}")))?
    };
    let ledger = state.ledger.clone();
    let block = tokio::task::spawn_blocking(move || ledger.mine_block(request.block_type, request.compliance_checks))
        .await
        .map_err(|e| ApiError::Internal(format!("mining task failed: {e}")))??;
    info!(block = block.number(), txs = block.transactions.len(), "block mined via api");
    Ok((StatusCode::CREATED, Json(block)))
}

async fn cancel_mining(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "cancelled": state.ledger.cancel_mining() }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(liveness))
        .route("/health/ledger", get(ledger_health))
        .route("/chain", get(get_chain))
        .route("/chain/summary", get(chain_summary))
        .route("/chain/latest", get(latest_block))
        .route("/chain/blocks/{number}", get(get_block))
        .route("/chain/validate", get(validate_chain).post(validate_chain))
        .route("/mempool", get(mempool))
        .route("/tx", post(submit_tx))
        .route("/tx/{id}", get(get_tx))
        .route("/tx/{id}/verify", get(verify_tx))
        .route("/mine", post(mine))
        .route("/mine/cancel", post(cancel_mining))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
