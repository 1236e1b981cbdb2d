//! Lazy, per-workspace knowledge-graph engines.
//!
//! A [`WorkspaceManager`] maps workspace names to engine instances, building
//! each one on first use through an [`EngineFactory`] and tearing it down on
//! request. [`KnowledgeGraphFactory`] is the bundled factory; any other engine
//! can be plugged in by implementing the two traits in [`engine`].

pub mod engine;
pub mod error;
pub mod types;
pub mod workspace;

pub use engine::graph::{GraphConfig, KnowledgeGraph, KnowledgeGraphFactory};
pub use engine::{Engine, EngineFactory};
pub use error::{GraphspaceError, Result};
pub use types::{CustomKg, EntityRecord, GraphStats, InsertSummary, RelationRecord};
pub use workspace::{
    discover, normalize, CloseAllReport, WorkspaceId, WorkspaceManager, DEFAULT_WORKSPACE,
};
