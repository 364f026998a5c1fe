//! Operational HTTP endpoints.
//!
//! - `/healthz`              : liveness
//! - `<scrape.path>`         : Prometheus text format (default `/metrics`)
//! - `/v1/anomalies`         : scenario list
//! - `/v1/anomalies/:name`   : POST triggers, DELETE stops

use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use pulsemeter_core::error::{ErrorCode, TelemetryError};
use pulsemeter_core::exposition;

use crate::app_state::AgentState;

fn http_status(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::UnknownScenario | ErrorCode::UnknownMetric => StatusCode::NOT_FOUND,
        ErrorCode::ScenarioActive => StatusCode::CONFLICT,
        ErrorCode::Config => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(e: &TelemetryError) -> Response {
    let code = e.code();
    (
        http_status(code),
        Json(json!({ "code": code.as_str(), "msg": e.to_string() })),
    )
        .into_response()
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// The scrape waits on gauge workers, so it runs on the blocking pool. Gauge
/// callbacks are already bounded by `samplers.callback_budget_ms` as a group;
/// `scrape.timeout_ms` only backstops the scrape as a whole.
pub async fn metrics(State(state): State<AgentState>) -> Response {
    let registry = state.registry();
    let limit = Duration::from_millis(state.cfg().scrape.timeout_ms);
    let scrape = tokio::task::spawn_blocking(move || registry.render());

    match tokio::time::timeout(limit, scrape).await {
        Ok(Ok(body)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, exposition::CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "scrape task failed");
            error_response(&TelemetryError::Internal(format!("scrape task failed: {e}")))
        }
        Err(_) => {
            tracing::warn!(timeout_ms = limit.as_millis() as u64, "scrape timed out");
            (StatusCode::SERVICE_UNAVAILABLE, "scrape timed out").into_response()
        }
    }
}

pub async fn list_anomalies(State(state): State<AgentState>) -> Response {
    Json(json!({ "scenarios": state.simulator().list() })).into_response()
}

pub async fn trigger_anomaly(State(state): State<AgentState>, Path(name): Path<String>) -> Response {
    match state.simulator().trigger(&name) {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(json!({ "scenario": name, "triggered": true })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn stop_anomaly(State(state): State<AgentState>, Path(name): Path<String>) -> Response {
    match state.simulator().stop(&name) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e),
    }
}
