//! HTTP endpoints of the payment router.
//!
//! - `GET /health`
//! - `GET /routes/preflight?sourceChain=..&destChain=..&token=..` – readiness of every
//!   candidate bridge on a route
//! - `POST /payments` – resolve, price and create a payment
//! - `GET /payments/{id}` and `GET /payments/{id}/events`
//! - `POST /payments/{id}/destination-tx`, `/complete`, `/fail`, `/refund` – lifecycle transitions
//! - `GET /payments/{id}/diagnostics` – decoded on-chain failure of a payment
//!
//! Errors are returned as `{"error": "..."}`. A route with no ready bridge answers
//! `422` and carries the full preflight report under `preflight`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use paybridge_chain_eip155::{ProbeError, RevertProbe};
use paybridge_types::chain::ChainId;
use paybridge_types::model::{PaymentEventType, PaymentKey, TokenKey};
use paybridge_types::store::{ConfigStore, PaymentStore};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

use crate::diagnostics::{DiagnosticsError, RevertDiagnostics};
use crate::fees::GasEstimator;
use crate::lifecycle::{CreatePayment, LifecycleError, PaymentLifecycle};
use crate::resolver::FeeQuoter;

/// Lifecycle over type-erased collaborators, as served over HTTP.
pub type SharedLifecycle = PaymentLifecycle<
    Arc<dyn ConfigStore>,
    Arc<dyn PaymentStore>,
    Arc<dyn FeeQuoter>,
    Arc<dyn GasEstimator>,
>;

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<SharedLifecycle>,
    pub diagnostics: Arc<RevertDiagnostics<Arc<dyn RevertProbe>>>,
}

impl AppState {
    pub fn new(lifecycle: Arc<SharedLifecycle>, probe: Arc<dyn RevertProbe>) -> Self {
        Self {
            lifecycle,
            diagnostics: Arc::new(RevertDiagnostics::new(probe)),
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(get_health))
        .route("/routes/preflight", get(get_preflight))
        .route("/payments", post(post_payment))
        .route("/payments/{id}", get(get_payment))
        .route("/payments/{id}/events", get(get_payment_events))
        .route("/payments/{id}/destination-tx", post(post_destination_tx))
        .route("/payments/{id}/complete", post(post_complete))
        .route("/payments/{id}/fail", post(post_fail))
        .route("/payments/{id}/refund", post(post_refund))
        .route("/payments/{id}/diagnostics", get(get_diagnostics))
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Diagnostics(#[from] DiagnosticsError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Lifecycle(err) => match err {
                LifecycleError::NotFound { .. } => StatusCode::NOT_FOUND,
                LifecycleError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                LifecycleError::NotReady(_)
                | LifecycleError::Unpriced { .. }
                | LifecycleError::InsufficientFundsAfterFees { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                LifecycleError::InvalidTransition { .. } | LifecycleError::StaleState(_) => {
                    StatusCode::CONFLICT
                }
                LifecycleError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Diagnostics(err) => match err {
                DiagnosticsError::UnknownChain(_) => StatusCode::NOT_FOUND,
                DiagnosticsError::NoTransaction(_) => StatusCode::UNPROCESSABLE_ENTITY,
                DiagnosticsError::Probe(ProbeError::Transport(_)) => StatusCode::BAD_GATEWAY,
                DiagnosticsError::Probe(_) => StatusCode::UNPROCESSABLE_ENTITY,
                DiagnosticsError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed");
        } else {
            tracing::warn!(error = ?self, "Request rejected");
        }
        let body = match &self {
            ApiError::Lifecycle(LifecycleError::NotReady(preflight)) => json!({
                "error": self.to_string(),
                "preflight": preflight,
            }),
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[instrument(skip_all)]
pub async fn get_health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreflightQuery {
    pub source_chain: ChainId,
    pub dest_chain: ChainId,
    #[serde(default)]
    pub token: Option<TokenKey>,
}

/// `GET /routes/preflight`: evaluates every candidate bridge of the route policy.
#[instrument(skip_all)]
pub async fn get_preflight(
    State(state): State<AppState>,
    Query(query): Query<PreflightQuery>,
) -> Result<Response, ApiError> {
    let preflight = state
        .lifecycle
        .resolver()
        .preflight(&query.source_chain, &query.dest_chain, query.token)
        .await
        .map_err(LifecycleError::from)?;
    Ok(Json(preflight).into_response())
}

#[instrument(skip_all)]
pub async fn post_payment(
    State(state): State<AppState>,
    Json(body): Json<CreatePayment>,
) -> Result<Response, ApiError> {
    let created = state.lifecycle.create_payment(body).await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

#[instrument(skip_all, fields(payment = %id))]
pub async fn get_payment(
    State(state): State<AppState>,
    Path(id): Path<PaymentKey>,
) -> Result<Response, ApiError> {
    let payment = state.lifecycle.payment(id).await?;
    Ok(Json(payment).into_response())
}

#[instrument(skip_all, fields(payment = %id))]
pub async fn get_payment_events(
    State(state): State<AppState>,
    Path(id): Path<PaymentKey>,
) -> Result<Response, ApiError> {
    let events = state.lifecycle.events(id).await?;
    Ok(Json(events).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationTx {
    pub tx_hash: String,
    #[serde(default)]
    pub block_number: Option<u64>,
}

#[instrument(skip_all, fields(payment = %id))]
pub async fn post_destination_tx(
    State(state): State<AppState>,
    Path(id): Path<PaymentKey>,
    Json(body): Json<DestinationTx>,
) -> Result<Response, ApiError> {
    let payment = state
        .lifecycle
        .record_destination_tx_hash(id, &body.tx_hash, body.block_number)
        .await?;
    Ok(Json(payment).into_response())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    #[serde(default)]
    pub dest_amount: Option<Decimal>,
}

#[instrument(skip_all, fields(payment = %id))]
pub async fn post_complete(
    State(state): State<AppState>,
    Path(id): Path<PaymentKey>,
    Json(body): Json<Completion>,
) -> Result<Response, ApiError> {
    let payment = state.lifecycle.mark_completed(id, body.dest_amount).await?;
    Ok(Json(payment).into_response())
}

#[derive(Debug, Deserialize)]
pub struct Failure {
    pub reason: String,
}

#[instrument(skip_all, fields(payment = %id))]
pub async fn post_fail(
    State(state): State<AppState>,
    Path(id): Path<PaymentKey>,
    Json(body): Json<Failure>,
) -> Result<Response, ApiError> {
    let payment = state.lifecycle.mark_failed(id, &body.reason).await?;
    Ok(Json(payment).into_response())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Refund {
    #[serde(default)]
    pub refund_tx_hash: Option<String>,
}

#[instrument(skip_all, fields(payment = %id))]
pub async fn post_refund(
    State(state): State<AppState>,
    Path(id): Path<PaymentKey>,
    Json(body): Json<Refund>,
) -> Result<Response, ApiError> {
    let payment = state.lifecycle.mark_refunded(id, body.refund_tx_hash).await?;
    Ok(Json(payment).into_response())
}

/// `GET /payments/{id}/diagnostics`: the decoded revert of the payment's latest
/// on-chain transaction, next to the failure reason recorded for it.
#[instrument(skip_all, fields(payment = %id))]
pub async fn get_diagnostics(
    State(state): State<AppState>,
    Path(id): Path<PaymentKey>,
) -> Result<Response, ApiError> {
    let lifecycle = &state.lifecycle;
    let payment = lifecycle.payment(id).await?;
    let failure_reason = lifecycle
        .latest_event(id, Some(PaymentEventType::Failed))
        .await?
        .and_then(|event| event.metadata.get("reason")?.as_str().map(str::to_string));
    let report = state
        .diagnostics
        .diagnose(lifecycle.config_store(), &payment, failure_reason)
        .await?;
    Ok(Json(report).into_response())
}
