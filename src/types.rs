use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Entity type assigned to nodes that only appear as relation endpoints.
pub const UNKNOWN_ENTITY_TYPE: &str = "UNKNOWN";

/// Attributes of an entity, as supplied by callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityData {
    pub entity_type: String,
    pub description: String,
    /// Free-form provenance, e.g. `"src/auth.py:12-25"`.
    pub source_id: String,
    pub file_path: String,
}

/// Attributes of a relation, as supplied by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationData {
    pub description: String,
    /// Comma-separated keywords such as `"CALLS"` or `"inheritance,dependency"`.
    pub keywords: String,
    pub weight: f64,
    pub source_id: String,
}

impl Default for RelationData {
    fn default() -> Self {
        RelationData {
            description: String::new(),
            keywords: String::new(),
            weight: 1.0,
            source_id: String::new(),
        }
    }
}

/// A node stored in a workspace's knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity_name: String,
    #[serde(flatten)]
    pub data: EntityData,
    pub created_at: DateTime<Utc>,
}

/// An undirected edge stored in a workspace's knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationRecord {
    pub src_id: String,
    pub tgt_id: String,
    #[serde(flatten)]
    pub data: RelationData,
    pub created_at: DateTime<Utc>,
}

/// A text chunk attached to the graph for provenance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkRecord {
    pub content: String,
    pub source_id: String,
    pub file_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomEntity {
    pub entity_name: String,
    #[serde(flatten)]
    pub data: EntityData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomRelationship {
    pub src_id: String,
    pub tgt_id: String,
    #[serde(flatten)]
    pub data: RelationData,
}

/// A caller-built knowledge graph to merge into a workspace.
///
/// Every section is optional; `{}` is a valid, empty payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomKg {
    pub chunks: Vec<ChunkRecord>,
    pub entities: Vec<CustomEntity>,
    pub relationships: Vec<CustomRelationship>,
}

impl CustomKg {
    pub fn len(&self) -> usize {
        self.chunks.len() + self.entities.len() + self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Counts from one [`CustomKg`] merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertSummary {
    pub entities: usize,
    pub relationships: usize,
    pub chunks: usize,
    /// Endpoint nodes created because a relation referenced them.
    pub auto_created: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub chunks: usize,
}
