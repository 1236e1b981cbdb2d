use http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum GraphspaceError {
    #[error("Invalid workspace name '{name}': {reason}")]
    InvalidWorkspace { name: String, reason: String },

    #[error("Workspace not loaded: {0}")]
    WorkspaceNotLoaded(String),

    #[error("Failed to construct engine for workspace {workspace}: {message}")]
    Construction { workspace: String, message: String },

    #[error("Failed to finalize engine for workspace {workspace}: {message}")]
    Teardown { workspace: String, message: String },

    #[error("Engine for workspace {0} is closed")]
    EngineClosed(String),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Entity already exists: {0}")]
    EntityAlreadyExists(String),

    #[error("Relation already exists: {src_id} -> {tgt_id}")]
    RelationAlreadyExists { src_id: String, tgt_id: String },

    #[error("Invalid knowledge graph: {0}")]
    InvalidGraph(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, GraphspaceError>;

impl From<std::io::Error> for GraphspaceError {
    fn from(e: std::io::Error) -> Self {
        GraphspaceError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for GraphspaceError {
    fn from(e: serde_json::Error) -> Self {
        GraphspaceError::Json(e.to_string())
    }
}

impl GraphspaceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GraphspaceError::InvalidWorkspace { .. } => StatusCode::BAD_REQUEST,
            GraphspaceError::WorkspaceNotLoaded(_) => StatusCode::NOT_FOUND,
            GraphspaceError::Construction { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            GraphspaceError::Teardown { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            GraphspaceError::EngineClosed(_) => StatusCode::SERVICE_UNAVAILABLE,
            GraphspaceError::EntityNotFound(_) => StatusCode::NOT_FOUND,
            GraphspaceError::EntityAlreadyExists(_) => StatusCode::CONFLICT,
            GraphspaceError::RelationAlreadyExists { .. } => StatusCode::CONFLICT,
            GraphspaceError::InvalidGraph(_) => StatusCode::BAD_REQUEST,
            GraphspaceError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GraphspaceError::Json(_) => StatusCode::BAD_REQUEST,
            GraphspaceError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Wrap any displayable failure as a construction error for `workspace`.
    pub fn construction(workspace: &str, err: impl std::fmt::Display) -> Self {
        GraphspaceError::Construction {
            workspace: workspace.to_string(),
            message: err.to_string(),
        }
    }

    /// Wrap any displayable failure as a teardown error for `workspace`.
    pub fn teardown(workspace: &str, err: impl std::fmt::Display) -> Self {
        GraphspaceError::Teardown {
            workspace: workspace.to_string(),
            message: err.to_string(),
        }
    }
}


#[cfg(feature = "axum-support")]
use axum::response::{IntoResponse, Json, Response};
#[cfg(feature = "axum-support")]
use serde::Serialize;

#[cfg(feature = "axum-support")]
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[cfg(feature = "axum-support")]
impl IntoResponse for GraphspaceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (error_code, suggestion) = match &self {
            GraphspaceError::InvalidWorkspace { .. } => (
                "invalid_workspace",
                Some("Use 1-64 letters, digits, '_' or '-'".to_string()),
            ),
            GraphspaceError::WorkspaceNotLoaded(_) => ("workspace_not_loaded", None),
            GraphspaceError::Construction { .. } => (
                "engine_construction_failed",
                Some("Check the workspace storage directory and retry".to_string()),
            ),
            GraphspaceError::Teardown { .. } => ("engine_teardown_failed", None),
            GraphspaceError::EngineClosed(_) => (
                "engine_closed",
                Some("The workspace was closed while the request ran; retry".to_string()),
            ),
            GraphspaceError::EntityNotFound(_) => ("entity_not_found", None),
            GraphspaceError::EntityAlreadyExists(_) => ("entity_already_exists", None),
            GraphspaceError::RelationAlreadyExists { .. } => ("relation_already_exists", None),
            GraphspaceError::InvalidGraph(_) => (
                "invalid_graph",
                Some("Check entity_name, src_id and tgt_id fields".to_string()),
            ),
            GraphspaceError::Io(_) => ("io_error", None),
            GraphspaceError::Json(_) => ("json_error", None),
            GraphspaceError::Config(_) => ("config_error", None),
        };

        let error_response = ErrorResponse {
            error: error_code.to_string(),
            message: self.to_string(),
            request_id: format!("req_gs_{}", uuid::Uuid::new_v4()),
            suggestion,
        };

        (status, Json(error_response)).into_response()
    }
}
