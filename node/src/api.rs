//! # REST API
//!
//! Builds the axum router that exposes the hosted ledger over HTTP.
//! All endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                   | Description                          |
//! |--------|------------------------|--------------------------------------|
//! | GET    | `/health`              | Liveness check                       |
//! | GET    | `/status`              | Token configuration and supply       |
//! | POST   | `/transfers`           | Settle one authorized transfer       |
//! | GET    | `/accounts/:address`   | Balances per partition, nonce        |
//! | GET    | `/events`              | Settlement event log (paginated)     |
//!
//! HTTP callers are anonymous, so `POST /transfers` only settles transfers
//! carrying an authorizer signature. A pair that would take the exempt path
//! is refused with 403 before the ledger is touched; exempt transfers are
//! settled locally with `prosynergy-node settle`.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use prosynergy_contracts::{KycToken, SettlementError, SettlementEvent, TransferRequest};
use prosynergy_protocol::config::DEFAULT_PARTITION_LABEL;
use prosynergy_protocol::ledger::Partition;
use prosynergy_protocol::types::{Address, Amount};

use crate::metrics::SharedMetrics;

/// Largest page `GET /events` will return.
const MAX_EVENT_PAGE: usize = 1_000;
const DEFAULT_EVENT_PAGE: usize = 100;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone, everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// The hosted ledger. Settlement takes the write lock; queries share the
    /// read lock.
    pub token: Arc<RwLock<KycToken>>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/transfers", post(transfer_handler))
        .route("/accounts/:address", get(account_handler))
        .route("/events", get(events_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request Types
// ---------------------------------------------------------------------------

/// Body of `POST /transfers`, and one entry of a `settle` batch.
///
/// `from_partition` defaults to the issuance partition and `operator` to
/// the sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferBody {
    #[serde(default)]
    pub from_partition: Option<Partition>,
    #[serde(default)]
    pub operator: Option<Address>,
    pub from: Address,
    pub to: Address,
    pub value: Amount,
    #[serde(default, with = "prosynergy_protocol::types::hex_bytes")]
    pub data: Vec<u8>,
    #[serde(default, with = "prosynergy_protocol::types::hex_bytes")]
    pub operator_data: Vec<u8>,
}

impl TransferBody {
    pub fn into_request(self) -> TransferRequest {
        let from_partition = self
            .from_partition
            .unwrap_or_else(|| Partition::from_label(DEFAULT_PARTITION_LABEL).unwrap_or_default());
        TransferRequest {
            from_partition,
            operator: self.operator.unwrap_or(self.from),
            from: self.from,
            to: self.to,
            value: self.value,
            data: self.data,
            operator_data: self.operator_data,
        }
    }
}

/// Query string of `GET /events`.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub offset: usize,
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub name: String,
    pub symbol: String,
    pub chain_id: u64,
    pub total_supply: Amount,
    pub administrator: Address,
    pub authorizer: Address,
    pub fee_collector: Address,
    pub prosynergy_collector: Address,
    pub exempted: Vec<Address>,
    pub event_count: usize,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// One `(partition, balance)` pair of an account.
#[derive(Debug, Serialize, Deserialize)]
pub struct PartitionBalance {
    pub partition: Partition,
    pub balance: Amount,
}

/// Response payload for `GET /accounts/:address`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub address: Address,
    /// Sum across all partitions.
    pub balance: Amount,
    pub partitions: Vec<PartitionBalance>,
    /// Nonce the next authorization for this account must carry.
    pub nonce: u64,
    /// Whether the account itself is flagged exempt.
    pub exempt: bool,
}

/// Response payload for `GET /events`.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventsResponse {
    pub total: usize,
    pub offset: usize,
    pub events: Vec<SettlementEvent>,
}

/// Error body returned for every non-2xx response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable machine-readable code.
    pub error: String,
    pub message: String,
}

/// A handler error carrying its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: code.into(),
                message: message.into(),
            },
        }
    }

    fn bad_request(code: &str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }
}

/// Error code for exempt-path transfers submitted over HTTP.
pub const EXEMPT_PATH_REFUSED: &str = "exempt_path_refused";

impl From<SettlementError> for ApiError {
    fn from(err: SettlementError) -> Self {
        let status = match &err {
            SettlementError::AuthorizationRequired
            | SettlementError::InvalidAuthorization(_)
            | SettlementError::Unauthorized
            | SettlementError::UnauthorizedOperator { .. } => StatusCode::FORBIDDEN,
            SettlementError::NonceReplayed { .. } | SettlementError::IssuanceClosed => {
                StatusCode::CONFLICT
            }
            SettlementError::InsufficientBalance { .. } | SettlementError::ArithmeticOverflow => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            SettlementError::InvalidConfiguration(_) => StatusCode::BAD_REQUEST,
            SettlementError::LedgerInvariant(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            body: ErrorBody {
                error: err.code().into(),
                message: err.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status`: token configuration and supply.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let token = state.token.read().await;
    let (fee_collector, prosynergy_collector) = token.fee_collectors();

    Json(StatusResponse {
        version: state.version.clone(),
        name: token.name().to_string(),
        symbol: token.symbol().to_string(),
        chain_id: token.chain_id(),
        total_supply: token.total_supply(),
        administrator: token.administrator(),
        authorizer: token.authorizer(),
        fee_collector,
        prosynergy_collector,
        exempted: token.exempted_accounts(),
        event_count: token.events().len(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `POST /transfers`: settles one authorized transfer and returns its
/// receipt.
async fn transfer_handler(
    State(state): State<AppState>,
    Json(body): Json<TransferBody>,
) -> Result<impl IntoResponse, ApiError> {
    let request = body.into_request();
    let started = Instant::now();

    let mut token = state.token.write().await;
    // The exempt path ignores `data`, so nothing in the request proves the
    // caller controls `from`.
    if token.is_exempt(&request.from, &request.to) {
        warn!(from = %request.from, to = %request.to, "exempt transfer refused over http");
        state.metrics.record_rejected(EXEMPT_PATH_REFUSED, started.elapsed());
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            EXEMPT_PATH_REFUSED,
            "exempt transfers are not accepted over http; use `prosynergy-node settle`",
        ));
    }

    match token.transfer_by_partition(&request) {
        Ok(receipt) => {
            state
                .metrics
                .record_settled(started.elapsed(), token.total_supply(), token.events().len());
            Ok((StatusCode::OK, Json(receipt)))
        }
        Err(err) => {
            state.metrics.record_rejected(err.code(), started.elapsed());
            Err(err.into())
        }
    }
}

/// `GET /accounts/:address`: balances and nonce. Unknown accounts come
/// back zeroed rather than 404.
async fn account_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let address: Address = address
        .parse()
        .map_err(|e: prosynergy_protocol::types::AddressError| {
            ApiError::bad_request("invalid_address", e.to_string())
        })?;

    let token = state.token.read().await;
    let partitions = token
        .partitions_of(&address)
        .into_iter()
        .map(|partition| PartitionBalance {
            partition,
            balance: token.balance_of_by_partition(&address, &partition),
        })
        .collect();

    Ok(Json(AccountResponse {
        address,
        balance: token.balance_of(&address),
        partitions,
        nonce: token.nonce_of(&address),
        exempt: token.is_flagged(&address),
    }))
}

/// `GET /events?offset=&limit=`: a page of the settlement event log.
async fn events_handler(
    Query(query): Query<EventsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_EVENT_PAGE)
        .min(MAX_EVENT_PAGE);

    let token = state.token.read().await;
    let events = token.events();
    let start = query.offset.min(events.len());
    let end = start.saturating_add(limit).min(events.len());

    Json(EventsResponse {
        total: events.len(),
        offset: start,
        events: events[start..end].to_vec(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
