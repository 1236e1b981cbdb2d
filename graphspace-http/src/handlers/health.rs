use axum::{extract::State, Json};
use std::sync::Arc;

use super::AppState;

/// Health check endpoint
pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "workspaces_loaded": state.manager.loaded_count(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
