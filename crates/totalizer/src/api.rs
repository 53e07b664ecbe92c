//! HTTP read side of the totalizer service.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tracing::error;

use sumline_shared::telemetry::PipelineMetrics;

use crate::persistence::PostgresTotalsStore;
use crate::service::TotalizerService;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TotalizerService<PostgresTotalsStore>>,
    pub metrics: Arc<PipelineMetrics>,
}

/// Build the totalizer router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/total", get(get_total))
        .route("/v1/healthcheck", get(healthcheck))
        .route("/metrics", get(metrics))
        .with_state(state)
}

async fn get_total(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let total = state.service.current_total().await.map_err(|e| {
        error!(error = %e, "Failed to load running total");
        ApiError::Internal
    })?;

    Ok(Json(serde_json::json!({ "result": total })))
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "available",
        "system_info": {
            "service": "totalizer",
            "version": env!("CARGO_PKG_VERSION"),
        },
    }))
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
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "the server encountered a problem and could not process your request",
            ),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
