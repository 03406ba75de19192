//! Node and relationship records, entity classes, and chunk references.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// One node row from a batch: a unique key, a label, and a flat map of
/// properties. Producers need not deduplicate; the store-side upsert is
/// keyed by `key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub key: String,
    pub label: String,
    pub props: BTreeMap<String, String>,
}

/// One relationship row from a batch. The natural key is the
/// `(start, end, rel_type)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelRecord {
    pub start: String,
    pub end: String,
    pub rel_type: String,
    pub props: BTreeMap<String, String>,
}

impl RelRecord {
    /// Natural key used for upsert deduplication.
    #[must_use]
    pub fn natural_key(&self) -> (&str, &str, &str) {
        (&self.start, &self.end, &self.rel_type)
    }
}

/// One node type or one relationship type imported as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityClass {
    Node { label: String },
    Relationship { rel_type: String },
}

impl EntityClass {
    #[must_use]
    pub fn node(label: impl Into<String>) -> Self {
        Self::Node { label: label.into() }
    }

    #[must_use]
    pub fn relationship(rel_type: impl Into<String>) -> Self {
        Self::Relationship { rel_type: rel_type.into() }
    }

    /// The label or relationship type name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Node { label } => label,
            Self::Relationship { rel_type } => rel_type,
        }
    }

    #[must_use]
    pub fn is_node(&self) -> bool {
        matches!(self, Self::Node { .. })
    }
}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node { label } => write!(f, "node:{label}"),
            Self::Relationship { rel_type } => write!(f, "rel:{rel_type}"),
        }
    }
}

/// Reference to one physical chunk file produced by the splitter.
///
/// Chunks are independent units of work: exactly one load attempt owns a
/// chunk at a time, and chunks are never merged back together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRef {
    /// Path to the chunk file (or the original batch file when no split was
    /// needed).
    pub path: PathBuf,
    /// Zero-based position within the batch.
    pub index: usize,
    /// Number of data rows in this chunk.
    pub record_count: usize,
}

impl ChunkRef {
    /// Identifier used in logs and failure reports.
    #[must_use]
    pub fn id(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("chunk_{:03}", self.index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_class_name_and_display() {
        let nodes = EntityClass::node("Chemical");
        let rels = EntityClass::relationship("USED_IN");
        assert_eq!(nodes.name(), "Chemical");
        assert_eq!(rels.name(), "USED_IN");
        assert!(nodes.is_node());
        assert!(!rels.is_node());
        assert_eq!(nodes.to_string(), "node:Chemical");
        assert_eq!(rels.to_string(), "rel:USED_IN");
    }

    #[test]
    fn chunk_id_uses_file_stem() {
        let chunk = ChunkRef {
            path: PathBuf::from("/tmp/chunks_nodes/nodes_chunk_007.csv"),
            index: 6,
            record_count: 5000,
        };
        assert_eq!(chunk.id(), "nodes_chunk_007");
    }

    #[test]
    fn rel_natural_key_is_the_triple() {
        let rel = RelRecord {
            start: "a".into(),
            end: "b".into(),
            rel_type: "KNOWS".into(),
            props: BTreeMap::new(),
        };
        assert_eq!(rel.natural_key(), ("a", "b", "KNOWS"));
    }
}
