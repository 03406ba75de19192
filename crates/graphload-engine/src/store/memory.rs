//! In-process graph store for tests and dry runs.
//!
//! Mirrors the Bolt adapter's upsert semantics: nodes merge on (label, key),
//! relationships merge on (start, end, type) and are dropped when either
//! endpoint is missing. A scripted failure queue lets tests drive the retry
//! machinery deterministically.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use graphload_types::{NodeRecord, RelRecord, StoreError};

use crate::store::GraphStore;

#[derive(Default)]
struct Inner {
    /// (label, key) -> props.
    nodes: BTreeMap<(String, String), BTreeMap<String, String>>,
    /// (start, end, type) -> props.
    rels: BTreeMap<(String, String, String), BTreeMap<String, String>>,
    constraints: HashSet<String>,
    /// Errors returned ahead of real work, in order, one per write call.
    scripted_failures: VecDeque<StoreError>,
    write_calls: u64,
}

/// In-memory [`GraphStore`] with scripted failure injection.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an error to be returned by the next write call. Queued errors
    /// are consumed in order; once the queue is empty, writes succeed.
    pub fn inject_failure(&self, error: StoreError) {
        self.lock().scripted_failures.push_back(error);
    }

    /// Total write calls observed, including failed ones.
    pub fn write_calls(&self) -> u64 {
        self.lock().write_calls
    }

    /// Labels for which a constraint was ensured.
    pub fn constrained_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.lock().constraints.iter().cloned().collect();
        labels.sort();
        labels
    }

    /// Distinct node count across all labels.
    pub fn node_count(&self) -> usize {
        self.lock().nodes.len()
    }

    /// Distinct relationship count across all types.
    pub fn relationship_count(&self) -> usize {
        self.lock().rels.len()
    }

    /// Props for one node, if present.
    pub fn node_props(&self, label: &str, key: &str) -> Option<BTreeMap<String, String>> {
        self.lock()
            .nodes
            .get(&(label.to_string(), key.to_string()))
            .cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn take_scripted_failure(&self) -> Option<StoreError> {
        let mut inner = self.lock();
        inner.write_calls += 1;
        inner.scripted_failures.pop_front()
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn verify_connectivity(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn ensure_constraints(&self, labels: &[String]) -> Result<(), StoreError> {
        let mut inner = self.lock();
        for label in labels {
            inner.constraints.insert(label.clone());
        }
        Ok(())
    }

    async fn apply_nodes(&self, label: &str, records: &[NodeRecord]) -> Result<u64, StoreError> {
        if let Some(err) = self.take_scripted_failure() {
            return Err(err);
        }
        let mut inner = self.lock();
        for record in records {
            inner
                .nodes
                .entry((label.to_string(), record.key.clone()))
                .or_default()
                .extend(record.props.clone());
        }
        Ok(records.len() as u64)
    }

    async fn apply_relationships(
        &self,
        rel_type: &str,
        records: &[RelRecord],
    ) -> Result<u64, StoreError> {
        if let Some(err) = self.take_scripted_failure() {
            return Err(err);
        }
        let mut inner = self.lock();
        let mut applied = 0u64;
        for record in records {
            let start_exists = inner.nodes.keys().any(|(_, k)| k == &record.start);
            let end_exists = inner.nodes.keys().any(|(_, k)| k == &record.end);
            if !start_exists || !end_exists {
                continue;
            }
            inner
                .rels
                .entry((
                    record.start.clone(),
                    record.end.clone(),
                    rel_type.to_string(),
                ))
                .or_default()
                .extend(record.props.clone());
            applied += 1;
        }
        Ok(applied)
    }

    async fn node_counts_by_label(&self) -> Result<BTreeMap<String, u64>, StoreError> {
        let inner = self.lock();
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for (label, _) in inner.nodes.keys() {
            *counts.entry(label.clone()).or_default() += 1;
        }
        Ok(counts)
    }

    async fn relationship_counts_by_type(&self) -> Result<BTreeMap<String, u64>, StoreError> {
        let inner = self.lock();
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for (_, _, rel_type) in inner.rels.keys() {
            *counts.entry(rel_type.clone()).or_default() += 1;
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(label: &str, key: &str) -> NodeRecord {
        NodeRecord {
            key: key.to_string(),
            label: label.to_string(),
            props: BTreeMap::new(),
        }
    }

    fn rel(start: &str, end: &str, rel_type: &str) -> RelRecord {
        RelRecord {
            start: start.to_string(),
            end: end.to_string(),
            rel_type: rel_type.to_string(),
            props: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn node_upserts_are_idempotent() {
        let store = MemoryStore::new();
        let batch = vec![node("Chemical", "water"), node("Chemical", "ethanol")];
        store.apply_nodes("Chemical", &batch).await.unwrap();
        store.apply_nodes("Chemical", &batch).await.unwrap();
        assert_eq!(store.node_count(), 2);
    }

    #[tokio::test]
    async fn relationships_require_both_endpoints() {
        let store = MemoryStore::new();
        store
            .apply_nodes("Chemical", &[node("Chemical", "a"), node("Chemical", "b")])
            .await
            .unwrap();
        let applied = store
            .apply_relationships("USED_IN", &[rel("a", "b", "USED_IN"), rel("a", "ghost", "USED_IN")])
            .await
            .unwrap();
        assert_eq!(applied, 1);
        assert_eq!(store.relationship_count(), 1);
    }

    #[tokio::test]
    async fn scripted_failures_are_consumed_in_order() {
        let store = MemoryStore::new();
        store.inject_failure(StoreError::transient("deadlock detected"));
        let batch = vec![node("L", "k")];
        assert!(store.apply_nodes("L", &batch).await.is_err());
        assert!(store.apply_nodes("L", &batch).await.is_ok());
        assert_eq!(store.write_calls(), 2);
    }
}
