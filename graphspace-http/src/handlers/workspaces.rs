use axum::{
    extract::{Path, State},
    Json,
};
use graphspace::{GraphspaceError, WorkspaceId};
use serde::Serialize;
use std::sync::Arc;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct WorkspaceInfo {
    pub name: String,
    pub loaded: bool,
    pub storage_bytes: u64,
}

#[derive(Debug, Serialize)]
pub struct ListWorkspacesResponse {
    pub workspaces: Vec<WorkspaceInfo>,
    pub total: usize,
}

/// List every workspace found on disk or currently loaded, sorted by name.
pub async fn list_workspaces(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ListWorkspacesResponse>, GraphspaceError> {
    let manager = Arc::clone(&state.manager);
    // Directory walks are blocking.
    let workspaces = tokio::task::spawn_blocking(move || {
        manager
            .all_workspaces()
            .into_iter()
            .map(|ws| WorkspaceInfo {
                loaded: manager.loaded(&ws).is_some(),
                storage_bytes: manager.workspace_storage_bytes(&ws),
                name: ws.into_string(),
            })
            .collect::<Vec<_>>()
    })
    .await
    .map_err(|e| GraphspaceError::Io(format!("spawn_blocking join error: {}", e)))?;

    Ok(Json(ListWorkspacesResponse {
        total: workspaces.len(),
        workspaces,
    }))
}

/// Close a workspace's engine. The data on disk is kept.
pub async fn close_workspace(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, GraphspaceError> {
    let closed = state.manager.close_instance(Some(&name)).await?;
    Ok(Json(serde_json::json!({
        "workspace": name,
        "closed": closed,
    })))
}

/// Graph counts for a loaded workspace. Never triggers construction.
pub async fn workspace_stats(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, GraphspaceError> {
    let id = WorkspaceId::parse(&name)?;
    let kg = state
        .manager
        .loaded(&id)
        .ok_or(GraphspaceError::WorkspaceNotLoaded(name))?;
    let stats = kg.stats().await;
    Ok(Json(serde_json::json!({
        "workspace": id,
        "instance_id": kg.instance_id().to_string(),
        "loaded_at": kg.loaded_at().to_rfc3339(),
        "nodes": stats.nodes,
        "edges": stats.edges,
        "chunks": stats.chunks,
    })))
}
