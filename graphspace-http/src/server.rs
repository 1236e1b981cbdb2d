use axum::{
    routing::{delete, get, post},
    Router,
};
use graphspace::{GraphConfig, KnowledgeGraphFactory, WorkspaceManager};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::handlers::{
    all_entities, all_relations, close_workspace, delete_entity, health, insert_custom_kg,
    list_workspaces, workspace_stats, AppState,
};

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:9621";

/// All routes over a shared [`AppState`].
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/workspaces", get(list_workspaces))
        .route("/api/workspaces/:name", delete(close_workspace))
        .route("/api/workspaces/:name/stats", get(workspace_stats))
        .route("/insert_custom_kg", post(insert_custom_kg))
        .route("/graph/entities/all", get(all_entities))
        .route("/graph/relations/all", get(all_relations))
        .route("/graph/entity/:name", delete(delete_entity))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive().max_age(std::time::Duration::from_secs(86400)))
}

/// Run the server until Ctrl-C, then close every loaded workspace.
///
/// Reads `GRAPHSPACE_DATA_DIR` (default `./data`) and `GRAPHSPACE_BIND_ADDR`
/// (default `127.0.0.1:9621`).
pub async fn serve() -> Result<(), Box<dyn std::error::Error>> {
    let startup_start = std::time::Instant::now();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let data_dir = std::env::var("GRAPHSPACE_DATA_DIR").unwrap_or_else(|_| "./data".to_string());
    let bind_addr =
        std::env::var("GRAPHSPACE_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

    std::fs::create_dir_all(&data_dir)?;
    let config = GraphConfig::load_or_default(Path::new(&data_dir));
    let manager = WorkspaceManager::new(&data_dir, KnowledgeGraphFactory, config);

    let on_disk = manager.discover();
    tracing::info!(
        "Found {} workspace(s) under {}: {:?}",
        on_disk.len(),
        data_dir,
        on_disk
    );

    let app = router(AppState::new(Arc::clone(&manager)));
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(
        startup_ms = startup_start.elapsed().as_millis() as u64,
        "graphspace v{} listening on http://{}",
        env!("CARGO_PKG_VERSION"),
        listener.local_addr()?
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let report = manager.close_all().await;
    for (workspace, e) in &report.failed {
        tracing::error!("Workspace {} did not shut down cleanly: {}", workspace, e);
    }
    tracing::info!(
        "Shutdown complete: {} workspace(s) closed, {} failed",
        report.closed.len(),
        report.failed.len()
    );

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections");
}
