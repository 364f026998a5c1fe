//! Axum router wiring.
//!
//! Every route, the fallback included, runs inside the request
//! instrumentation middleware.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{app_state::AgentState, obs::track_requests, ops};

pub fn build_router(state: AgentState) -> Router {
    let scrape_path = state.cfg().scrape.path.clone();
    Router::new()
        .route("/healthz", get(ops::healthz))
        .route(&scrape_path, get(ops::metrics))
        .route("/v1/anomalies", get(ops::list_anomalies))
        .route(
            "/v1/anomalies/:name",
            post(ops::trigger_anomaly).delete(ops::stop_anomaly),
        )
        .layer(middleware::from_fn_with_state(state.requests(), track_requests))
        .with_state(state)
}
