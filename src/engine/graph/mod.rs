//! File-backed knowledge graph, one instance per workspace.
//!
//! Each graph lives in `{storage_root}/{workspace}/{graph_file}` as a JSON
//! snapshot of its entities, relations and chunks. The whole graph is held in
//! memory behind a `tokio::sync::RwLock`; reads share the lock, mutations take
//! it exclusively and (with `flush_on_write`) rewrite the snapshot atomically
//! before releasing it.

pub mod config;

pub use config::GraphConfig;

use super::{Engine, EngineFactory};
use crate::error::{GraphspaceError, Result};
use crate::types::{
    ChunkRecord, CustomKg, EntityData, EntityRecord, GraphStats, InsertSummary, RelationData,
    RelationRecord, UNKNOWN_ENTITY_TYPE,
};
use crate::workspace::WorkspaceId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::{RwLock, RwLockWriteGuard};
use uuid::Uuid;

/// Relations are undirected: `(a, b)` and `(b, a)` share one key.
type EdgeKey = (String, String);

fn edge_key(a: &str, b: &str) -> EdgeKey {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

#[derive(Clone, Default)]
struct GraphState {
    nodes: IndexMap<String, EntityRecord>,
    edges: IndexMap<EdgeKey, RelationRecord>,
    chunks: Vec<ChunkRecord>,
    closed: bool,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct GraphSnapshot {
    nodes: Vec<EntityRecord>,
    edges: Vec<RelationRecord>,
    chunks: Vec<ChunkRecord>,
}

#[derive(Serialize)]
struct GraphSnapshotRef<'a> {
    nodes: Vec<&'a EntityRecord>,
    edges: Vec<&'a RelationRecord>,
    chunks: &'a [ChunkRecord],
}

impl GraphState {
    fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        GraphState {
            nodes: snapshot
                .nodes
                .into_iter()
                .map(|n| (n.entity_name.clone(), n))
                .collect(),
            edges: snapshot
                .edges
                .into_iter()
                .map(|e| (edge_key(&e.src_id, &e.tgt_id), e))
                .collect(),
            chunks: snapshot.chunks,
            closed: false,
        }
    }

    fn snapshot(&self) -> GraphSnapshotRef<'_> {
        GraphSnapshotRef {
            nodes: self.nodes.values().collect(),
            edges: self.edges.values().collect(),
            chunks: &self.chunks,
        }
    }

    /// Insert a placeholder node for `name` if absent. Returns true if created.
    fn ensure_node(&mut self, name: &str, now: DateTime<Utc>) -> bool {
        if self.nodes.contains_key(name) {
            return false;
        }
        self.nodes.insert(
            name.to_string(),
            EntityRecord {
                entity_name: name.to_string(),
                data: EntityData {
                    entity_type: UNKNOWN_ENTITY_TYPE.to_string(),
                    ..Default::default()
                },
                created_at: now,
            },
        );
        true
    }
}

/// A workspace's knowledge graph engine.
pub struct KnowledgeGraph {
    workspace: WorkspaceId,
    instance_id: Uuid,
    loaded_at: DateTime<Utc>,
    dir: PathBuf,
    config: GraphConfig,
    state: RwLock<GraphState>,
}

impl KnowledgeGraph {
    /// Unique per construction; a reopened workspace gets a new id.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// The workspace's storage directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn graph_path(&self) -> PathBuf {
        self.dir.join(&self.config.graph_file)
    }

    pub async fn is_closed(&self) -> bool {
        self.state.read().await.closed
    }

    async fn write_state(&self) -> Result<RwLockWriteGuard<'_, GraphState>> {
        let state = self.state.write().await;
        if state.closed {
            return Err(GraphspaceError::EngineClosed(self.workspace.to_string()));
        }
        Ok(state)
    }

    async fn persist(&self, state: &GraphState) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&state.snapshot())?;
        let path = self.graph_path();
        let tmp = self.dir.join(format!("{}.tmp", self.config.graph_file));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::debug!(
            "[KG {}] persisted {} nodes, {} edges",
            self.workspace,
            state.nodes.len(),
            state.edges.len()
        );
        Ok(())
    }

    /// Run `change` under the write lock.
    ///
    /// With `flush_on_write` the change is made on a copy that replaces the
    /// live state only once it is on disk, so an `Err` leaves the graph as it
    /// was. `change` must not return `Err` after it has mutated its argument.
    async fn apply<T>(&self, change: impl FnOnce(&mut GraphState) -> Result<T>) -> Result<T> {
        let mut state = self.write_state().await?;
        if !self.config.flush_on_write {
            return change(&mut state);
        }
        let mut next = state.clone();
        let out = change(&mut next)?;
        self.persist(&next).await?;
        *state = next;
        Ok(out)
    }

    /// Merge a caller-built graph into this workspace.
    ///
    /// Entities and relations are upserted: a repeated name (or endpoint pair)
    /// replaces the earlier attributes but keeps the original `created_at`.
    /// Relation endpoints that do not exist yet are created with entity type
    /// `UNKNOWN`. An empty payload is a no-op. On error nothing is merged.
    ///
    /// # Errors
    ///
    /// [`GraphspaceError::InvalidGraph`] for empty names or a payload larger
    /// than `max_batch_size`; [`GraphspaceError::EngineClosed`] after
    /// finalize; `Io`/`Json` if the graph file cannot be written.
    pub async fn insert_custom_kg(&self, kg: CustomKg) -> Result<InsertSummary> {
        if kg.len() > self.config.max_batch_size {
            return Err(GraphspaceError::InvalidGraph(format!(
                "batch of {} items exceeds max {}",
                kg.len(),
                self.config.max_batch_size
            )));
        }
        if kg.entities.iter().any(|e| e.entity_name.trim().is_empty()) {
            return Err(GraphspaceError::InvalidGraph(
                "entity_name must not be empty".to_string(),
            ));
        }
        if kg
            .relationships
            .iter()
            .any(|r| r.src_id.trim().is_empty() || r.tgt_id.trim().is_empty())
        {
            return Err(GraphspaceError::InvalidGraph(
                "src_id and tgt_id must not be empty".to_string(),
            ));
        }
        if kg.is_empty() {
            if self.is_closed().await {
                return Err(GraphspaceError::EngineClosed(self.workspace.to_string()));
            }
            return Ok(InsertSummary::default());
        }

        let summary = self
            .apply(|state| {
                let now = Utc::now();
                let mut summary = InsertSummary {
                    chunks: kg.chunks.len(),
                    ..Default::default()
                };
                state.chunks.extend(kg.chunks);

                for entity in kg.entities {
                    let created_at = state
                        .nodes
                        .get(&entity.entity_name)
                        .map_or(now, |existing| existing.created_at);
                    state.nodes.insert(
                        entity.entity_name.clone(),
                        EntityRecord {
                            entity_name: entity.entity_name,
                            data: entity.data,
                            created_at,
                        },
                    );
                    summary.entities += 1;
                }

                for rel in kg.relationships {
                    if state.ensure_node(&rel.src_id, now) {
                        summary.auto_created += 1;
                    }
                    if state.ensure_node(&rel.tgt_id, now) {
                        summary.auto_created += 1;
                    }
                    let key = edge_key(&rel.src_id, &rel.tgt_id);
                    let created_at = state
                        .edges
                        .get(&key)
                        .map_or(now, |existing| existing.created_at);
                    state.edges.insert(
                        key,
                        RelationRecord {
                            src_id: rel.src_id,
                            tgt_id: rel.tgt_id,
                            data: rel.data,
                            created_at,
                        },
                    );
                    summary.relationships += 1;
                }
                Ok(summary)
            })
            .await?;

        tracing::info!(
            "[KG {}] merged {} entities, {} relations, {} chunks ({} auto-created)",
            self.workspace,
            summary.entities,
            summary.relationships,
            summary.chunks,
            summary.auto_created
        );
        Ok(summary)
    }

    /// Create a new entity. Fails with `EntityAlreadyExists` on duplicates.
    pub async fn create_entity(&self, name: &str, data: EntityData) -> Result<EntityRecord> {
        if name.trim().is_empty() {
            return Err(GraphspaceError::InvalidGraph(
                "entity_name must not be empty".to_string(),
            ));
        }
        self.apply(|state| {
            if state.nodes.contains_key(name) {
                return Err(GraphspaceError::EntityAlreadyExists(name.to_string()));
            }
            let record = EntityRecord {
                entity_name: name.to_string(),
                data,
                created_at: Utc::now(),
            };
            state.nodes.insert(name.to_string(), record.clone());
            Ok(record)
        })
        .await
    }

    /// Create a relation between two existing entities.
    pub async fn create_relation(
        &self,
        src_id: &str,
        tgt_id: &str,
        data: RelationData,
    ) -> Result<RelationRecord> {
        self.apply(|state| {
            for endpoint in [src_id, tgt_id] {
                if !state.nodes.contains_key(endpoint) {
                    return Err(GraphspaceError::EntityNotFound(endpoint.to_string()));
                }
            }
            let key = edge_key(src_id, tgt_id);
            if state.edges.contains_key(&key) {
                return Err(GraphspaceError::RelationAlreadyExists {
                    src_id: src_id.to_string(),
                    tgt_id: tgt_id.to_string(),
                });
            }
            let record = RelationRecord {
                src_id: src_id.to_string(),
                tgt_id: tgt_id.to_string(),
                data,
                created_at: Utc::now(),
            };
            state.edges.insert(key, record.clone());
            Ok(record)
        })
        .await
    }

    /// Delete an entity and every relation touching it.
    ///
    /// Returns the number of relations removed.
    pub async fn delete_entity(&self, name: &str) -> Result<usize> {
        let removed = self
            .apply(|state| {
                if state.nodes.shift_remove(name).is_none() {
                    return Err(GraphspaceError::EntityNotFound(name.to_string()));
                }
                let before = state.edges.len();
                state
                    .edges
                    .retain(|_, e| e.src_id != name && e.tgt_id != name);
                Ok(before - state.edges.len())
            })
            .await?;
        tracing::info!(
            "[KG {}] deleted entity {} and {} relation(s)",
            self.workspace,
            name,
            removed
        );
        Ok(removed)
    }

    pub async fn has_node(&self, name: &str) -> bool {
        self.state.read().await.nodes.contains_key(name)
    }

    pub async fn get_node(&self, name: &str) -> Option<EntityRecord> {
        self.state.read().await.nodes.get(name).cloned()
    }

    pub async fn has_edge(&self, a: &str, b: &str) -> bool {
        self.state.read().await.edges.contains_key(&edge_key(a, b))
    }

    pub async fn get_edge(&self, a: &str, b: &str) -> Option<RelationRecord> {
        self.state.read().await.edges.get(&edge_key(a, b)).cloned()
    }

    /// `(src_id, tgt_id)` pairs of every relation touching `name`.
    pub async fn node_edges(&self, name: &str) -> Vec<(String, String)> {
        self.state
            .read()
            .await
            .edges
            .values()
            .filter(|e| e.src_id == name || e.tgt_id == name)
            .map(|e| (e.src_id.clone(), e.tgt_id.clone()))
            .collect()
    }

    /// Every entity, in insertion order.
    pub async fn all_nodes(&self) -> Vec<EntityRecord> {
        self.state.read().await.nodes.values().cloned().collect()
    }

    /// Every relation, in insertion order.
    pub async fn all_edges(&self) -> Vec<RelationRecord> {
        self.state.read().await.edges.values().cloned().collect()
    }

    pub async fn chunks(&self) -> Vec<ChunkRecord> {
        self.state.read().await.chunks.clone()
    }

    pub async fn stats(&self) -> GraphStats {
        let state = self.state.read().await;
        GraphStats {
            nodes: state.nodes.len(),
            edges: state.edges.len(),
            chunks: state.chunks.len(),
        }
    }
}

#[async_trait]
impl Engine for KnowledgeGraph {
    fn workspace(&self) -> &WorkspaceId {
        &self.workspace
    }

    /// Persist the graph and reject further mutations. Idempotent.
    async fn finalize(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        self.persist(&state)
            .await
            .map_err(|e| GraphspaceError::teardown(&self.workspace, e))
    }
}

/// Builds a [`KnowledgeGraph`] from `{storage_root}/{workspace}/`.
#[derive(Debug, Clone, Copy, Default)]
pub struct KnowledgeGraphFactory;

#[async_trait]
impl EngineFactory for KnowledgeGraphFactory {
    type Config = GraphConfig;
    type Engine = KnowledgeGraph;

    async fn construct(
        &self,
        workspace: &WorkspaceId,
        config: &GraphConfig,
        storage_root: &Path,
    ) -> Result<KnowledgeGraph> {
        let dir = storage_root.join(workspace);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| GraphspaceError::construction(workspace, e))?;

        let path = dir.join(&config.graph_file);
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: GraphSnapshot = serde_json::from_slice(&bytes).map_err(|e| {
                    GraphspaceError::construction(
                        workspace,
                        format!("corrupt graph file {}: {}", path.display(), e),
                    )
                })?;
                GraphState::from_snapshot(snapshot)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => GraphState::default(),
            Err(e) => return Err(GraphspaceError::construction(workspace, e)),
        };

        tracing::info!(
            "[KG {}] opened with {} nodes, {} edges",
            workspace,
            state.nodes.len(),
            state.edges.len()
        );

        Ok(KnowledgeGraph {
            workspace: workspace.clone(),
            instance_id: Uuid::new_v4(),
            loaded_at: Utc::now(),
            dir,
            config: config.clone(),
            state: RwLock::new(state),
        })
    }
}
