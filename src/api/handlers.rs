//! Health endpoint

use axum::{
    Json,
    extract::{Query, State as AxumState},
    response::IntoResponse,
};
use serde_json::json;
use std::collections::HashMap;

use crate::SharedState;

/// Health check endpoint
/// Supports ?format=json for detailed JSON response
pub async fn health(
    AxumState(state): AxumState<SharedState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if params.get("format").map(|s| s.as_str()) == Some("json") {
        Json(json!({
            "name": "deploy_hook",
            "version": env!("CARGO_PKG_VERSION"),
            "started_at": state.started_at.to_rfc3339(),
            "uptime_seconds": state.start_time.elapsed().as_secs(),
            "total_sites": state.dispatcher.registry().len(),
            "status": "healthy"
        }))
        .into_response()
    } else {
        "deploy_hook - healthy".into_response()
    }
}
