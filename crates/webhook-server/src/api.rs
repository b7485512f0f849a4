//! HTTP webhook and admin routes
//!
//! Provider webhooks arrive form-encoded under `/voice`; the admin API under
//! `/api` speaks JSON. Every handler is a thin translation onto one
//! [`QueueEngine`] operation.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Form, Json, Router,
};
use holdline_transfer_engine::{
    CallAccepted, CallId, CallInfo, CallRecord, Cleared, ConnectPlan, ErrorKind, QueueEngine, QueueError,
    QueueStatus, StatusApplied, TransferAccepted, TransferOutcome,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, warn};

/// Shared handler state
pub type ApiState = Arc<QueueEngine>;

/// Create the HTTP router
pub fn create_router(engine: Arc<QueueEngine>) -> Router {
    Router::new()
        // Provider webhooks
        .route("/voice/incoming", post(incoming_call))
        .route("/voice/transfer", post(connect_plan))
        .route("/voice/transfer-status", post(transfer_status))
        // Admin API
        .route("/api/queue", get(queue_status))
        .route("/api/queue/clear", post(clear_queue))
        .route("/api/transfer/:call_sid", post(request_transfer))
        .route("/api/calls/:call_sid", get(call_info))
        .route("/api/calls/:call_sid", delete(abandon_call))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(engine)
}

#[derive(Debug, Deserialize)]
pub struct IncomingCallForm {
    #[serde(rename = "CallSid", default)]
    pub call_sid: String,
    #[serde(rename = "From", default)]
    pub from: String,
}

#[derive(Debug, Deserialize)]
pub struct ConnectPlanForm {
    #[serde(rename = "CallSid", default)]
    pub call_sid: String,
}

#[derive(Debug, Deserialize)]
pub struct TransferStatusForm {
    #[serde(rename = "CallSid", default)]
    pub call_sid: String,
    #[serde(rename = "DialCallStatus", default)]
    pub dial_call_status: String,
}

#[derive(Debug, Deserialize)]
pub struct TransferBody {
    #[serde(default)]
    pub to: String,
}

async fn incoming_call(
    State(engine): State<ApiState>,
    Form(form): Form<IncomingCallForm>,
) -> Result<Json<CallAccepted>, ApiError> {
    let accepted = engine.call_arrived(CallId::new(form.call_sid), &form.from).await?;
    Ok(Json(accepted))
}

async fn connect_plan(
    State(engine): State<ApiState>,
    Form(form): Form<ConnectPlanForm>,
) -> Result<Json<ConnectPlan>, ApiError> {
    Ok(Json(engine.connect_plan(&CallId::new(form.call_sid))?))
}

async fn transfer_status(
    State(engine): State<ApiState>,
    Form(form): Form<TransferStatusForm>,
) -> Result<Json<StatusApplied>, ApiError> {
    let outcome = TransferOutcome::from_dial_status(&form.dial_call_status).ok_or_else(|| {
        ApiError::BadRequest(format!("Unrecognized DialCallStatus: '{}'", form.dial_call_status))
    })?;

    let applied = engine
        .transfer_status_reported(&CallId::new(form.call_sid), outcome)
        .await?;
    Ok(Json(applied))
}

async fn queue_status(State(engine): State<ApiState>) -> Json<QueueStatus> {
    Json(engine.queue_status())
}

async fn clear_queue(State(engine): State<ApiState>) -> Json<Cleared> {
    Json(engine.clear_all().await)
}

async fn request_transfer(
    State(engine): State<ApiState>,
    Path(call_sid): Path<String>,
    Json(body): Json<TransferBody>,
) -> Result<Json<TransferAccepted>, ApiError> {
    let accepted = engine
        .transfer_requested(&CallId::new(call_sid), &body.to)
        .await?;
    Ok(Json(accepted))
}

async fn call_info(
    State(engine): State<ApiState>,
    Path(call_sid): Path<String>,
) -> Result<Json<CallInfo>, ApiError> {
    Ok(Json(engine.fetch_call_info(&CallId::new(call_sid)).await?))
}

async fn abandon_call(
    State(engine): State<ApiState>,
    Path(call_sid): Path<String>,
) -> Result<Json<CallRecord>, ApiError> {
    Ok(Json(engine.abandon(&CallId::new(call_sid)).await?))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    queue_length: usize,
}

async fn health_check(State(engine): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "holdline",
        version: env!("CARGO_PKG_VERSION"),
        queue_length: engine.queue_status().queue_length,
    })
}

// Error handling

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("{0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Queue(e) => match e.kind() {
                ErrorKind::Validation => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                ErrorKind::Conflict => (StatusCode::CONFLICT, "CONFLICT"),
                ErrorKind::NotFound => (StatusCode::NOT_FOUND, "CALL_NOT_FOUND"),
                ErrorKind::Provider => (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR"),
                ErrorKind::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
        };

        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => {
                error!("Internal error: {}", self);
                "An internal error occurred".to_string()
            }
            StatusCode::BAD_GATEWAY => {
                warn!("Provider error: {}", self);
                self.to_string()
            }
            _ => {
                debug!("Request refused: {}", self);
                self.to_string()
            }
        };

        let body = Json(ErrorResponse {
            error: ErrorDetail { code, message },
        });
        (status, body).into_response()
    }
}
