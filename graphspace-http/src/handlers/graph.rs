use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use graphspace::engine::Engine;
use graphspace::{CustomKg, EntityRecord, GraphspaceError, RelationRecord};
use serde::Deserialize;
use std::sync::Arc;

use super::{engine_for, AppState};

#[derive(Debug, Deserialize)]
pub struct InsertCustomKgRequest {
    pub custom_kg: CustomKg,
}

/// Merge a caller-built knowledge graph into the request's workspace.
pub async fn insert_custom_kg(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<InsertCustomKgRequest>,
) -> Result<Json<serde_json::Value>, GraphspaceError> {
    let kg = engine_for(&state, &headers).await?;
    let summary = kg.insert_custom_kg(body.custom_kg).await?;
    Ok(Json(serde_json::json!({
        "status": "success",
        "message": format!("Custom KG inserted into workspace {}", kg.workspace()),
        "entities": summary.entities,
        "relationships": summary.relationships,
        "chunks": summary.chunks,
        "auto_created": summary.auto_created,
    })))
}

pub async fn all_entities(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<EntityRecord>>, GraphspaceError> {
    let kg = engine_for(&state, &headers).await?;
    Ok(Json(kg.all_nodes().await))
}

pub async fn all_relations(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<RelationRecord>>, GraphspaceError> {
    let kg = engine_for(&state, &headers).await?;
    Ok(Json(kg.all_edges().await))
}

/// Delete an entity and every relation touching it.
pub async fn delete_entity(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, GraphspaceError> {
    let kg = engine_for(&state, &headers).await?;
    let relations_removed = kg.delete_entity(&name).await?;
    Ok(Json(serde_json::json!({
        "status": "success",
        "entity": name,
        "relations_removed": relations_removed,
    })))
}
