// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// The operator surface: promotion workflow, registry refresh, synchronous
// signal generation, signal approval, and execution dispatch. All endpoints
// live under `/api/v1/` and exchange JSON. Failures map to a stable
// `{error, message}` body; internal causes are logged, not exposed.
//
// CORS is configured permissively for development; tighten allowed origins
// in production.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

use crate::app_state::AppState;
use crate::artifact::domain::{Artifact, ArtifactState, DomainError};
use crate::artifact::loader::ArtifactLoader;
use crate::artifact::service::{ArtifactService, DraftRequest, ValidationRequest};
use crate::artifact::store::StoreError;
use crate::clock;
use crate::execution::{ExecError, ExecutionEngine};
use crate::generator::SignalGenerator;
use crate::signal_store::{SignalStore, SignalStoreError};

// =============================================================================
// Context & router
// =============================================================================

/// Everything the handlers need, shared by Arc.
#[derive(Clone)]
pub struct ApiContext {
    pub state: Arc<AppState>,
    pub service: Arc<ArtifactService>,
    pub loader: Arc<ArtifactLoader>,
    pub generator: Arc<SignalGenerator>,
    pub execution: Arc<ExecutionEngine>,
    pub signals: Arc<SignalStore>,
}

/// Build the full REST router with CORS middleware and shared context.
pub fn router(ctx: ApiContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Health & state ──────────────────────────────────────────
        .route("/api/v1/health", get(health))
        .route("/api/v1/state", get(full_state))
        // ── Registry ────────────────────────────────────────────────
        .route("/api/v1/registry/refresh", post(registry_refresh))
        // ── Artifact promotion workflow ─────────────────────────────
        .route("/api/v1/artifacts", get(list_artifacts).post(create_artifact))
        .route("/api/v1/artifacts/latest/:strategy", get(latest_approved))
        .route("/api/v1/artifacts/:id", get(get_artifact))
        .route("/api/v1/artifacts/:id/promote", post(promote_artifact))
        .route("/api/v1/artifacts/:id/validate", post(validate_artifact))
        .route("/api/v1/artifacts/:id/approvals", post(record_approval))
        // ── Signals ─────────────────────────────────────────────────
        .route("/api/v1/signals/generate", post(generate_signals))
        .route("/api/v1/signals", get(list_signals))
        .route("/api/v1/signals/:id", get(get_signal))
        .route("/api/v1/signals/:id/approve", post(approve_signal))
        // ── Execution ───────────────────────────────────────────────
        .route("/api/v1/execute", post(execute_signal))
        .route("/api/v1/trades", get(list_trades))
        .route("/api/v1/trades/:id", get(get_trade))
        // ── Middleware & state ──────────────────────────────────────
        .layer(cors)
        .with_state(ctx)
}

// =============================================================================
// Error mapping
// =============================================================================

/// Stable error body: a machine discriminator plus a human message.
struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.code, "message": self.message });
        (self.status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match &e {
            StoreError::NotFound(id) => Self::new(
                StatusCode::NOT_FOUND,
                "not_found",
                format!("artifact {id} not found"),
            ),
            StoreError::UniqueViolation(_) => {
                Self::new(StatusCode::CONFLICT, "unique_violation", e.to_string())
            }
            StoreError::Domain(DomainError::InvalidTransition { .. }) => {
                Self::new(StatusCode::CONFLICT, "invalid_transition", e.to_string())
            }
            StoreError::Domain(DomainError::HashMismatch { .. }) => {
                error!(error = %e, "artifact integrity failure surfaced to API");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "hash_mismatch",
                    e.to_string(),
                )
            }
            StoreError::Domain(DomainError::InvalidPayload { .. }) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "invalid_payload", e.to_string())
            }
            _ => {
                error!(error = %e, "artifact store failure");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage_error",
                    "internal storage failure",
                )
            }
        }
    }
}

impl From<SignalStoreError> for ApiError {
    fn from(e: SignalStoreError) -> Self {
        match &e {
            SignalStoreError::NotFound(id) => Self::new(
                StatusCode::NOT_FOUND,
                "not_found",
                format!("signal {id} not found"),
            ),
            SignalStoreError::NotPending(_) => {
                Self::new(StatusCode::CONFLICT, "not_pending", e.to_string())
            }
            _ => {
                error!(error = %e, "signal store failure");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage_error",
                    "internal storage failure",
                )
            }
        }
    }
}

impl From<ExecError> for ApiError {
    fn from(e: ExecError) -> Self {
        let (status, code) = match &e {
            ExecError::ExecutionDisabled => (StatusCode::FORBIDDEN, "execution_disabled"),
            ExecError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ExecError::NotApproved(_) => (StatusCode::CONFLICT, "not_approved"),
            ExecError::InvalidSignal(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_signal"),
            ExecError::BrokerUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "broker_unavailable"),
            ExecError::RiskGateRejected(_) => (StatusCode::CONFLICT, "risk_gate_rejected"),
            ExecError::InsufficientSize { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "insufficient_size")
            }
            ExecError::DeadlineExceeded => (StatusCode::GATEWAY_TIMEOUT, "deadline_exceeded"),
            ExecError::Store(_) => {
                error!(error = %e, "execution storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error")
            }
        };
        Self::new(status, code, e.to_string())
    }
}

// =============================================================================
// Health & state
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    server_time: String,
}

async fn health(State(ctx): State<ApiContext>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: ctx.state.start_time.elapsed().as_secs(),
        server_time: clock::fmt_ts(clock::now()),
    })
}

async fn full_state(State(ctx): State<ApiContext>) -> impl IntoResponse {
    Json(ctx.state.build_summary())
}

// =============================================================================
// Registry
// =============================================================================

async fn registry_refresh(State(ctx): State<ApiContext>) -> impl IntoResponse {
    let strategies = ctx.loader.refresh(&ctx.state);
    Json(serde_json::json!({ "strategies": strategies }))
}

// =============================================================================
// Artifact promotion workflow
// =============================================================================

/// Condensed artifact view for listings.
#[derive(Serialize)]
struct ArtifactSummary {
    id: String,
    strategy_name: String,
    strategy_version: String,
    state: ArtifactState,
    created_at: String,
    payload_hash: String,
}

impl From<&Artifact> for ArtifactSummary {
    fn from(a: &Artifact) -> Self {
        Self {
            id: a.id.clone(),
            strategy_name: a.strategy.name.clone(),
            strategy_version: a.strategy.version.clone(),
            state: a.state,
            created_at: a.created_at.clone(),
            payload_hash: a.payload_hash.clone(),
        }
    }
}

#[derive(Deserialize)]
struct ListArtifactsQuery {
    state: Option<ArtifactState>,
}

async fn list_artifacts(
    State(ctx): State<ApiContext>,
    Query(query): Query<ListArtifactsQuery>,
) -> Result<Json<Vec<ArtifactSummary>>, ApiError> {
    let artifacts = ctx.service.list_artifacts(query.state)?;
    Ok(Json(artifacts.iter().map(ArtifactSummary::from).collect()))
}

async fn create_artifact(
    State(ctx): State<ApiContext>,
    Json(draft): Json<DraftRequest>,
) -> Result<(StatusCode, Json<Artifact>), ApiError> {
    let artifact = ctx.service.create_artifact(draft)?;
    Ok((StatusCode::CREATED, Json(artifact)))
}

async fn get_artifact(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let artifact = ctx.service.get_artifact(&id)?;
    let approvals = ctx.service.store().list_approvals(&id)?;
    let promotions = ctx.service.store().list_promotions(&id)?;
    Ok(Json(serde_json::json!({
        "artifact": artifact,
        "approvals": approvals,
        "promotions": promotions,
    })))
}

#[derive(Deserialize)]
struct PromoteRequest {
    target_state: ArtifactState,
    actor: String,
    #[serde(default)]
    reason: String,
}

async fn promote_artifact(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    Json(request): Json<PromoteRequest>,
) -> Result<Json<Artifact>, ApiError> {
    let artifact = ctx.service.promote(
        &id,
        request.target_state,
        &request.actor,
        &request.reason,
    )?;
    Ok(Json(artifact))
}

async fn validate_artifact(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    Json(request): Json<ValidationRequest>,
) -> Result<Json<crate::artifact::store::ValidationReport>, ApiError> {
    let report = ctx.service.validate(&id, request)?;
    Ok(Json(report))
}

async fn latest_approved(
    State(ctx): State<ApiContext>,
    Path(strategy): Path<String>,
) -> Result<Json<Artifact>, ApiError> {
    let artifact = ctx.service.store().get_latest_approved(&strategy)?;
    Ok(Json(artifact))
}

#[derive(Deserialize)]
struct RecordApprovalRequest {
    approver_id: String,
    approval_type: crate::types::ApprovalType,
    #[serde(default)]
    notes: Option<String>,
}

async fn record_approval(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    Json(request): Json<RecordApprovalRequest>,
) -> Result<(StatusCode, Json<crate::artifact::store::Approval>), ApiError> {
    // The artifact must exist (and verify) before sign-off attaches to it.
    ctx.service.get_artifact(&id)?;

    let approval = crate::artifact::store::Approval {
        id: format!("apr-{}", uuid::Uuid::new_v4()),
        artifact_id: id,
        approver_id: request.approver_id,
        approved_at: clock::now(),
        approval_type: request.approval_type,
        notes: request.notes,
    };
    ctx.service.store().create_approval(&approval)?;
    Ok((StatusCode::CREATED, Json(approval)))
}

// =============================================================================
// Signals
// =============================================================================

#[derive(Deserialize)]
struct GenerateRequest {
    /// Explicit symbols; defaults to the configured watchlist.
    #[serde(default)]
    symbols: Option<Vec<String>>,
}

async fn generate_signals(
    State(ctx): State<ApiContext>,
    Json(request): Json<GenerateRequest>,
) -> impl IntoResponse {
    let symbols = request
        .symbols
        .unwrap_or_else(|| ctx.state.config.read().watchlist.clone());
    let report = ctx.generator.run_cycle(&symbols);
    Json(report)
}

#[derive(Deserialize)]
struct ListSignalsQuery {
    symbol: String,
    #[serde(default = "default_signal_limit")]
    limit: usize,
}

fn default_signal_limit() -> usize {
    50
}

async fn list_signals(
    State(ctx): State<ApiContext>,
    Query(query): Query<ListSignalsQuery>,
) -> Result<Json<Vec<crate::signal_store::Signal>>, ApiError> {
    let limit = query.limit.min(500);
    let signals = ctx.signals.recent(&query.symbol, limit)?;
    Ok(Json(signals))
}

async fn get_signal(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<crate::signal_store::Signal>, ApiError> {
    let signal = ctx.signals.get(&id)?;
    Ok(Json(signal))
}

#[derive(Deserialize)]
struct ApproveRequest {
    approver: String,
    approved: bool,
}

async fn approve_signal(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    Json(request): Json<ApproveRequest>,
) -> Result<Json<crate::signal_store::TradeApproval>, ApiError> {
    let approval = ctx.signals.decide(&id, &request.approver, request.approved)?;
    Ok(Json(approval))
}

// =============================================================================
// Execution
// =============================================================================

#[derive(Deserialize)]
struct ExecuteRequest {
    signal_id: String,
    approver: String,
}

async fn execute_signal(
    State(ctx): State<ApiContext>,
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<crate::execution::TradeResult>, ApiError> {
    let result = ctx
        .execution
        .execute(&request.signal_id, &request.approver)
        .await?;
    Ok(Json(result))
}

#[derive(Deserialize)]
struct ListTradesQuery {
    #[serde(default = "default_signal_limit")]
    limit: usize,
}

async fn list_trades(
    State(ctx): State<ApiContext>,
    Query(query): Query<ListTradesQuery>,
) -> Result<Json<Vec<crate::trade_store::Trade>>, ApiError> {
    let trades = ctx
        .execution
        .trades()
        .list_recent(query.limit.min(500))
        .map_err(trade_store_error)?;
    Ok(Json(trades))
}

async fn get_trade(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<crate::trade_store::Trade>, ApiError> {
    let trade = ctx.execution.trades().get(&id).map_err(trade_store_error)?;
    Ok(Json(trade))
}

fn trade_store_error(e: crate::trade_store::TradeStoreError) -> ApiError {
    match &e {
        crate::trade_store::TradeStoreError::NotFound(id) => ApiError::new(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("trade {id} not found"),
        ),
        _ => {
            error!(error = %e, "trade store failure");
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                "internal storage failure",
            )
        }
    }
}
