use axum::http::HeaderMap;
use graphspace::{GraphspaceError, KnowledgeGraph, KnowledgeGraphFactory, WorkspaceManager};
use std::sync::Arc;

pub mod graph;
pub mod health;
pub mod workspaces;

/// Request header selecting the workspace. Absent means `default`.
pub const WORKSPACE_HEADER: &str = "x-workspace";

pub type GraphManager = WorkspaceManager<KnowledgeGraphFactory>;

pub struct AppState {
    pub manager: Arc<GraphManager>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(manager: Arc<GraphManager>) -> Arc<Self> {
        Arc::new(AppState {
            manager,
            start_time: std::time::Instant::now(),
        })
    }
}

/// Workspace named by the `X-Workspace` header, if any.
pub(crate) fn workspace_header(headers: &HeaderMap) -> Result<Option<&str>, GraphspaceError> {
    match headers.get(WORKSPACE_HEADER) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(Some)
            .map_err(|_| GraphspaceError::InvalidWorkspace {
                name: String::from_utf8_lossy(value.as_bytes()).into_owned(),
                reason: "header value is not visible ASCII".to_string(),
            }),
    }
}

/// Resolve the request's workspace to its engine, constructing it if needed.
pub(crate) async fn engine_for(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Arc<KnowledgeGraph>, GraphspaceError> {
    state.manager.get_instance(workspace_header(headers)?).await
}

pub use graph::{all_entities, all_relations, delete_entity, insert_custom_kg};
pub use health::health;
pub use workspaces::{close_workspace, list_workspaces, workspace_stats};


#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn missing_header_selects_default() {
        let headers = HeaderMap::new();
        assert_eq!(workspace_header(&headers).unwrap(), None);
    }

    #[test]
    fn header_value_is_passed_through() {
        let mut headers = HeaderMap::new();
        headers.insert(WORKSPACE_HEADER, HeaderValue::from_static("erp"));
        assert_eq!(workspace_header(&headers).unwrap(), Some("erp"));
    }

    #[test]
    fn non_ascii_header_is_invalid_workspace() {
        let mut headers = HeaderMap::new();
        headers.insert(
            WORKSPACE_HEADER,
            HeaderValue::from_bytes(b"caf\xc3\xa9").unwrap(),
        );
        let err = workspace_header(&headers).unwrap_err();
        assert!(matches!(err, GraphspaceError::InvalidWorkspace { .. }));
    }
}
