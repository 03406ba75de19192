//! End-to-end import driver.
//!
//! One run: verify the store, size the run from the host, discover and
//! estimate the batches, bootstrap constraints, split into chunks, import
//! every node class to a terminal state, then every relationship class, then
//! read back live counts. Relationship batches never start before all node
//! classes finish; edges can only attach to nodes that exist.

use std::sync::Arc;

use anyhow::Context;
use graphload_types::{ChunkRef, EntityClass};
use tokio::sync::watch;

use crate::batch::{self, BatchKind};
use crate::chunker::FileChunker;
use crate::config::LoadConfig;
use crate::error::LoadError;
use crate::profiler::ResourceProfiler;
use crate::result::RunSummary;
use crate::retry::{RetryPolicy, RECONCILE_MAX_ATTEMPTS};
use crate::scheduler::{ImportScheduler, SchedulerTuning};
use crate::store::GraphStore;
use crate::verifier;

/// Per-run options beyond the config file.
#[derive(Default)]
pub struct RunOptions {
    /// Receiver flipped to `true` to stop scheduling new chunks. In-flight
    /// chunks finish; unstarted ones are reported as failed.
    pub cancel: Option<watch::Receiver<bool>>,
}

/// Run one full import. Partial success is a normal outcome: chunk failures
/// land in the summary, and only store-unreachable or host-side problems
/// surface as errors.
///
/// # Errors
///
/// Fails when the store fails its connectivity probe, the batch directory is
/// unreadable, or chunk splitting hits an I/O problem.
pub async fn run_import(
    config: &LoadConfig,
    store: Arc<dyn GraphStore>,
    options: RunOptions,
) -> Result<RunSummary, LoadError> {
    let started = std::time::Instant::now();

    store.verify_connectivity().await?;

    let profile = ResourceProfiler::profile(&config.resources.sizing_hints());

    let batches = batch::discover_batches(&config.source.batch_dir)?;
    if batches.is_empty() {
        tracing::warn!(
            dir = %config.source.batch_dir.display(),
            "No batch files found, nothing to import"
        );
    }

    let estimate = verifier::estimate_workload(&batches);
    tracing::info!(
        batches = batches.len(),
        node_labels = estimate.node_counts_by_label.len(),
        relationship_types = estimate.relationship_counts_by_type.len(),
        estimated_records = estimate.total_records(),
        "Workload estimated"
    );

    // Constraint bootstrap is best-effort: a store without the privilege
    // still imports correctly, just without index support.
    let labels: Vec<String> = estimate.node_counts_by_label.keys().cloned().collect();
    if let Err(err) = store.ensure_constraints(&labels).await {
        tracing::warn!(%err, "Constraint bootstrap failed, continuing without");
    }

    let (node_chunks, rel_chunks) = split_batches(&batches, &profile)?;

    let mut tuning = SchedulerTuning::default();
    if let Some(threshold) = config.resources.contention_record_threshold {
        tuning.contention_record_threshold = threshold;
    }
    let mut scheduler = ImportScheduler::new(Arc::clone(&store), profile).with_tuning(tuning);
    if let Some(cancel) = options.cancel {
        scheduler = scheduler.with_cancel(cancel);
    }

    let mut class_runs = Vec::new();
    let (node_classes, rel_classes): (Vec<EntityClass>, Vec<EntityClass>) =
        estimate.classes().into_iter().partition(EntityClass::is_node);

    // All node classes reach a terminal state before any relationship class
    // starts.
    for class in node_classes.iter().chain(rel_classes.iter()) {
        let chunks = if class.is_node() {
            &node_chunks
        } else {
            &rel_chunks
        };
        let run = scheduler
            .import_entity_class(class, chunks, estimate.records_for(class))
            .await;
        class_runs.push(run);
    }

    let live_stats =
        verifier::live_stats(&store, RetryPolicy::new(RECONCILE_MAX_ATTEMPTS)).await;

    let summary = RunSummary {
        class_runs,
        estimate,
        live_stats,
        elapsed_secs: started.elapsed().as_secs_f64(),
    };
    tracing::info!(
        classes = summary.class_runs.len(),
        records_applied = summary.records_applied(),
        failed_chunks = summary.failed_chunk_count(),
        complete = summary.is_complete(),
        elapsed_secs = format!("{:.1}", summary.elapsed_secs),
        "Import finished"
    );
    Ok(summary)
}

/// Split every batch, keeping node and relationship chunks apart.
fn split_batches(
    batches: &[batch::BatchFile],
    profile: &graphload_types::SizingProfile,
) -> Result<(Vec<ChunkRef>, Vec<ChunkRef>), LoadError> {
    let chunker = FileChunker::from_profile(profile);
    let mut node_chunks = Vec::new();
    let mut rel_chunks = Vec::new();
    for batch_file in batches {
        let chunks = chunker
            .split(&batch_file.path)
            .with_context(|| format!("failed to split {}", batch_file.path.display()))?;
        match batch_file.kind {
            BatchKind::Nodes => node_chunks.extend(chunks),
            BatchKind::Relationships => rel_chunks.extend(chunks),
        }
    }
    Ok((node_chunks, rel_chunks))
}
