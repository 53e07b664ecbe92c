//! HTTP surface of the adder service.
//!
//! Thin shell over the sum service plus the operator endpoints for the
//! outbox (health, quarantine inspection, requeue) and the Prometheus
//! exposition endpoint.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use sumline_shared::telemetry::PipelineMetrics;

use crate::domain::{OutboxError, OutboxEvent, OutboxRepository};
use crate::persistence::PostgresOutboxRepository;
use crate::service::{SumError, SumService};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub sum_service: Arc<SumService<PostgresOutboxRepository>>,
    pub repository: Arc<PostgresOutboxRepository>,
    pub metrics: Arc<PipelineMetrics>,
    pub max_retries: i32,
}

/// Build the adder router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/sum", post(post_sum))
        .route("/v1/healthcheck", get(healthcheck))
        .route("/v1/outbox/quarantined", get(quarantined))
        .route("/v1/outbox/:id/requeue", post(requeue))
        .route("/metrics", get(metrics))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct SumRequest {
    x: i64,
    y: i64,
}

async fn post_sum(
    State(state): State<AppState>,
    Json(request): Json<SumRequest>,
) -> Result<Json<crate::service::SumOutcome>, ApiError> {
    let outcome = state.sum_service.add(request.x, request.y).await?;
    Ok(Json(outcome))
}

async fn healthcheck(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let stats = state.repository.stats(state.max_retries).await?;

    Ok(Json(serde_json::json!({
        "status": "available",
        "system_info": {
            "service": "adder",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "outbox": stats,
    })))
}

/// Operator view of a quarantined outbox row
#[derive(Debug, Serialize)]
struct QuarantinedEvent {
    event_id: Uuid,
    event_type: String,
    created_at: DateTime<Utc>,
    retry_count: i32,
    last_error: Option<String>,
}

impl From<OutboxEvent> for QuarantinedEvent {
    fn from(event: OutboxEvent) -> Self {
        Self {
            event_id: event.id,
            event_type: event.event_type,
            created_at: event.created_at,
            retry_count: event.retry_count,
            last_error: event.last_error,
        }
    }
}

async fn quarantined(
    State(state): State<AppState>,
) -> Result<Json<Vec<QuarantinedEvent>>, ApiError> {
    let events = state.repository.fetch_quarantined(state.max_retries).await?;
    Ok(Json(events.into_iter().map(QuarantinedEvent::from).collect()))
}

async fn requeue(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.repository.requeue(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = state.metrics.encode().map_err(|e| {
        error!(error = %e, "Failed to encode metrics");
        ApiError::Internal
    })?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

/// API error envelope
#[derive(Debug)]
pub enum ApiError {
    UnprocessableEntity(String),
    NotFound,
    Internal,
}

impl From<SumError> for ApiError {
    fn from(err: SumError) -> Self {
        match err {
            SumError::Overflow => ApiError::UnprocessableEntity(err.to_string()),
            SumError::Outbox(e) => {
                error!(error = %e, "Sum request failed");
                ApiError::Internal
            }
        }
    }
}

impl From<OutboxError> for ApiError {
    fn from(err: OutboxError) -> Self {
        match err {
            OutboxError::NotFound(_) => ApiError::NotFound,
            other => {
                error!(error = %other, "Outbox operation failed");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::UnprocessableEntity(message) => (StatusCode::UNPROCESSABLE_ENTITY, message),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                "the requested resource could not be found".to_string(),
            ),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "the server encountered a problem and could not process your request".to_string(),
            ),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
