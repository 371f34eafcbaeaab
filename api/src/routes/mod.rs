//! API routes organization
//!
//! - `polls` - Poll creation, poll reads with tallies, and voting
//!
//! The live results channel is served at `/socket`.

mod polls;

use crate::live_ws::live_ws_handler;
use crate::{ApiResult, ApiState};
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

/// Create the main router with all API endpoints
pub fn create_routes() -> Router<ApiState> {
    Router::new()
        // Core application routes
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/socket", get(live_ws_handler))
        // Domain-specific route groups
        .merge(polls::poll_routes())
}

// Root endpoints

async fn root() -> &'static str {
    "LivePoll API"
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: String,
    connections: usize,
    groups: usize,
    uptime_secs: u64,
}

async fn health_check(State(state): State<ApiState>) -> ApiResult<Json<HealthResponse>> {
    let (connections, groups) = state.service.hub().stats().await;
    crate::ok_json!(HealthResponse {
        status: "ok".to_string(),
        connections,
        groups,
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}
