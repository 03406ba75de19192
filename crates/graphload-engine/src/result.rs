//! Structured run outcomes.
//!
//! A run always produces a [`RunSummary`], even when some chunks fail:
//! partial success is a normal terminal state, and the summary carries
//! enough detail to decide whether to re-run (every operation is an upsert,
//! so re-running is always safe).

use graphload_types::{EntityClass, ErrorKind};
use serde::Serialize;

use crate::scheduler::Strategy;
use crate::verifier::{LiveStats, WorkloadEstimate};

/// One chunk that reached a terminal failure state.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkFailure {
    pub chunk_id: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of importing one entity class.
#[derive(Debug, Clone, Serialize)]
pub struct EntityClassRun {
    pub class: EntityClass,
    pub strategy: Strategy,
    pub total_chunks: usize,
    pub succeeded: usize,
    pub records_applied: u64,
    /// Chunks still failed after the reconciliation pass.
    pub failed_chunks: Vec<ChunkFailure>,
    /// Chunks that failed the main pass but succeeded on reconciliation.
    pub reconciled: usize,
    pub elapsed_secs: f64,
}

impl EntityClassRun {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed_chunks.is_empty()
    }
}

/// Full outcome of one import run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub class_runs: Vec<EntityClassRun>,
    /// Pre-import workload estimate from scanning the batch files.
    pub estimate: WorkloadEstimate,
    /// Post-import live store counts.
    pub live_stats: LiveStats,
    pub elapsed_secs: f64,
}

impl RunSummary {
    /// Total chunks that stayed failed across all classes.
    #[must_use]
    pub fn failed_chunk_count(&self) -> usize {
        self.class_runs.iter().map(|r| r.failed_chunks.len()).sum()
    }

    /// Total records applied across all classes.
    #[must_use]
    pub fn records_applied(&self) -> u64 {
        self.class_runs.iter().map(|r| r.records_applied).sum()
    }

    /// True when every chunk of every class reached success.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.class_runs.iter().all(EntityClassRun::is_complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_run(failed: usize, applied: u64) -> EntityClassRun {
        EntityClassRun {
            class: EntityClass::node("Chemical"),
            strategy: Strategy::Parallel,
            total_chunks: 4,
            succeeded: 4 - failed,
            records_applied: applied,
            failed_chunks: (0..failed)
                .map(|i| ChunkFailure {
                    chunk_id: format!("nodes_chunk_{:03}", i + 1),
                    kind: ErrorKind::Timeout,
                    message: "query timeout".to_string(),
                })
                .collect(),
            reconciled: 0,
            elapsed_secs: 1.0,
        }
    }

    #[test]
    fn summary_aggregates_across_classes() {
        let summary = RunSummary {
            class_runs: vec![class_run(0, 100), class_run(2, 50)],
            estimate: WorkloadEstimate::default(),
            live_stats: LiveStats::default(),
            elapsed_secs: 2.0,
        };
        assert_eq!(summary.failed_chunk_count(), 2);
        assert_eq!(summary.records_applied(), 150);
        assert!(!summary.is_complete());
    }

    #[test]
    fn summary_serializes_for_machine_consumers() {
        let summary = RunSummary {
            class_runs: vec![class_run(1, 10)],
            estimate: WorkloadEstimate::default(),
            live_stats: LiveStats::default(),
            elapsed_secs: 0.5,
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"parallel\""));
        assert!(json.contains("\"timeout\""));
        assert!(json.contains("nodes_chunk_001"));
    }

    #[test]
    fn complete_run_has_no_failed_chunks() {
        let summary = RunSummary {
            class_runs: vec![class_run(0, 10)],
            estimate: WorkloadEstimate::default(),
            live_stats: LiveStats::default(),
            elapsed_secs: 0.5,
        };
        assert!(summary.is_complete());
    }
}
