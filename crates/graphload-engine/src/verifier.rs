//! Pre-import workload estimation and post-import live verification.
//!
//! Both sides degrade instead of failing: an unreadable batch file
//! contributes nothing to the estimate, and a store that cannot be counted
//! after bounded retries yields zeroed live stats. Verification informs the
//! operator; it never blocks or undoes an import.

use std::collections::BTreeMap;
use std::sync::Arc;

use graphload_types::EntityClass;
use serde::Serialize;

use crate::batch::{self, BatchFile, BatchKind};
use crate::retry::RetryPolicy;
use crate::store::GraphStore;

/// Expected record counts derived from scanning the batch files.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkloadEstimate {
    pub node_counts_by_label: BTreeMap<String, u64>,
    pub relationship_counts_by_type: BTreeMap<String, u64>,
}

impl WorkloadEstimate {
    /// Estimated records for one entity class; zero when the class never
    /// appeared in the scan.
    #[must_use]
    pub fn records_for(&self, class: &EntityClass) -> u64 {
        match class {
            EntityClass::Node { label } => {
                self.node_counts_by_label.get(label).copied().unwrap_or(0)
            }
            EntityClass::Relationship { rel_type } => self
                .relationship_counts_by_type
                .get(rel_type)
                .copied()
                .unwrap_or(0),
        }
    }

    /// Every entity class seen in the scan, nodes first.
    #[must_use]
    pub fn classes(&self) -> Vec<EntityClass> {
        let mut classes: Vec<EntityClass> = self
            .node_counts_by_label
            .keys()
            .map(|label| EntityClass::node(label.clone()))
            .collect();
        classes.extend(
            self.relationship_counts_by_type
                .keys()
                .map(|rel_type| EntityClass::relationship(rel_type.clone())),
        );
        classes
    }

    #[must_use]
    pub fn total_records(&self) -> u64 {
        self.node_counts_by_label.values().sum::<u64>()
            + self.relationship_counts_by_type.values().sum::<u64>()
    }
}

/// Live store counts taken after the import.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LiveStats {
    pub node_counts_by_label: BTreeMap<String, u64>,
    pub relationship_counts_by_type: BTreeMap<String, u64>,
    /// False when counting failed and the stats were zeroed.
    pub available: bool,
}

/// Scan batch files and count rows per entity class.
///
/// Reads only the `:LABEL` / `:TYPE` cell of each row; the full record is
/// never parsed, so the scan stays cheap even for wide property rows.
/// Unreadable or malformed files are logged and skipped; the estimate is
/// advisory and the import decides per chunk what actually loads.
#[must_use]
pub fn estimate_workload(batches: &[BatchFile]) -> WorkloadEstimate {
    let mut estimate = WorkloadEstimate::default();
    for batch in batches {
        if let Err(err) = scan_batch(batch, &mut estimate) {
            tracing::warn!(
                file = %batch.path.display(),
                %err,
                "Batch unreadable during estimation, skipping"
            );
        }
    }
    estimate
}

fn scan_batch(
    batch_file: &BatchFile,
    estimate: &mut WorkloadEstimate,
) -> anyhow::Result<()> {
    let mut reader = csv::Reader::from_path(&batch_file.path)?;
    let layout = batch::HeaderLayout::resolve(reader.headers()?)?;
    for row in reader.records() {
        let row = row?;
        match batch_file.kind {
            BatchKind::Nodes => {
                if let Some(label) = layout.label_of(&row) {
                    *estimate
                        .node_counts_by_label
                        .entry(label.to_string())
                        .or_default() += 1;
                }
            }
            BatchKind::Relationships => {
                if let Some(rel_type) = layout.type_of(&row) {
                    *estimate
                        .relationship_counts_by_type
                        .entry(rel_type.to_string())
                        .or_default() += 1;
                }
            }
        }
    }
    Ok(())
}

/// Count what the store actually holds, with bounded retries.
///
/// Exhausting the policy yields zeroed stats flagged unavailable rather than
/// an error; a run that loaded data but cannot be counted is still a
/// finished run.
pub async fn live_stats(store: &Arc<dyn GraphStore>, policy: RetryPolicy) -> LiveStats {
    let mut attempt = 0u32;
    loop {
        match collect_counts(store).await {
            Ok(stats) => return stats,
            Err(err) => {
                attempt += 1;
                let decision = policy.should_retry(attempt, &err);
                if !decision.retry {
                    tracing::warn!(%err, attempt, "Store counts unavailable, zeroing stats");
                    return LiveStats::default();
                }
                tracing::debug!(%err, attempt, delay = ?decision.delay, "Retrying store counts");
                tokio::time::sleep(decision.delay).await;
            }
        }
    }
}

async fn collect_counts(
    store: &Arc<dyn GraphStore>,
) -> Result<LiveStats, graphload_types::StoreError> {
    let node_counts_by_label = store.node_counts_by_label().await?;
    let relationship_counts_by_type = store.relationship_counts_by_type().await?;
    Ok(LiveStats {
        node_counts_by_label,
        relationship_counts_by_type,
        available: true,
    })
}
