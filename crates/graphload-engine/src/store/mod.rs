//! Graph store abstraction.
//!
//! The engine talks to the store through [`GraphStore`]: batch upserts plus
//! the count queries the verifier needs. The Bolt adapter in [`bolt`] is the
//! production implementation; [`memory`] is an in-process store used by the
//! test suites to exercise scheduling and retry behavior without a server.

use std::collections::BTreeMap;

use async_trait::async_trait;
use graphload_types::{NodeRecord, RelRecord, StoreError};

pub mod bolt;
pub mod memory;

pub use bolt::{BoltStore, StoreConfig};
pub use memory::MemoryStore;

/// Backend-agnostic graph store surface.
///
/// All write operations are upserts keyed on the natural key, so replaying
/// any batch is safe. Implementations classify their failures into
/// [`StoreError`] kinds; the retry machinery never inspects backend errors
/// directly.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Cheap liveness probe, run once before any work is scheduled.
    async fn verify_connectivity(&self) -> Result<(), StoreError>;

    /// Ensure a uniqueness constraint on the key property for each label.
    async fn ensure_constraints(&self, labels: &[String]) -> Result<(), StoreError>;

    /// Upsert a batch of nodes sharing one label. Returns the number of
    /// records applied.
    async fn apply_nodes(&self, label: &str, records: &[NodeRecord]) -> Result<u64, StoreError>;

    /// Upsert a batch of relationships sharing one type. Rows referencing
    /// missing endpoints are skipped, never invented. Returns the number of
    /// records applied.
    async fn apply_relationships(
        &self,
        rel_type: &str,
        records: &[RelRecord],
    ) -> Result<u64, StoreError>;

    /// Live node counts grouped by label.
    async fn node_counts_by_label(&self) -> Result<BTreeMap<String, u64>, StoreError>;

    /// Live relationship counts grouped by type.
    async fn relationship_counts_by_type(&self) -> Result<BTreeMap<String, u64>, StoreError>;
}
