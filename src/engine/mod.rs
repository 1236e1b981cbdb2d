//! Engine collaborator contract.
//!
//! [`crate::WorkspaceManager`] is generic over an [`EngineFactory`]; it never
//! looks inside an engine beyond [`Engine::workspace`] and
//! [`Engine::finalize`]. The bundled implementation is
//! [`graph::KnowledgeGraphFactory`].

pub mod graph;

use crate::error::Result;
use crate::workspace::WorkspaceId;
use async_trait::async_trait;
use std::path::Path;

/// A constructed, fully initialized per-workspace engine.
///
/// Handles are shared as `Arc<Self>` between callers, so every method takes
/// `&self` and implementations synchronize internally.
#[async_trait]
pub trait Engine: Send + Sync + 'static {
    /// The workspace this instance was constructed for.
    fn workspace(&self) -> &WorkspaceId;

    /// Flush and release backend resources.
    ///
    /// Called exactly once by the manager, after the handle has been removed
    /// from the registry. Errors are logged by the manager and not retried.
    async fn finalize(&self) -> Result<()>;
}

/// Builds engines for workspaces on first access.
#[async_trait]
pub trait EngineFactory: Send + Sync + 'static {
    /// Settings shared by every workspace (model endpoints, flush policy, ...).
    type Config: Send + Sync + 'static;
    type Engine: Engine;

    /// Construct and initialize the engine for `workspace`.
    ///
    /// Implementations derive an isolated storage location from
    /// `storage_root` and `workspace`. The call may take arbitrarily long; the
    /// manager holds only that workspace's init lock while it runs.
    async fn construct(
        &self,
        workspace: &WorkspaceId,
        config: &Self::Config,
        storage_root: &Path,
    ) -> Result<Self::Engine>;
}
