//! Chunk scheduling: strategy selection, bounded-parallel and serial
//! execution, and the serial reconciliation pass.
//!
//! A chunk is the unit of work: exactly one in-flight attempt owns a chunk,
//! chunk outcomes are independent, and a failed chunk never aborts its
//! siblings. Every write is an upsert, so a chunk may be retried or
//! reconciled without double-applying records.

use std::sync::Arc;
use std::time::Duration;

use graphload_types::{ChunkRef, EntityClass, ErrorKind, SizingProfile, StoreError};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::batch;
use crate::result::{ChunkFailure, EntityClassRun};
use crate::retry::{
    RetryPolicy, PARALLEL_MAX_ATTEMPTS, RECONCILE_MAX_ATTEMPTS, SERIAL_MAX_ATTEMPTS,
};
use crate::store::GraphStore;

/// Chunk count above which a class is imported serially: with this many
/// chunks the lock-contention cost of parallel merges on one label outweighs
/// the concurrency win.
pub const SERIAL_CHUNK_THRESHOLD: usize = 20;
/// Pause between parallel waves, letting the store drain its queue.
const WAVE_PAUSE: Duration = Duration::from_millis(500);
/// Pause between chunks under the serial strategy.
const SERIAL_PAUSE: Duration = Duration::from_millis(200);
/// Pause before each reconciliation attempt.
const RECONCILE_PAUSE: Duration = Duration::from_secs(1);

/// How one entity class's chunks are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Parallel,
    Serial,
}

/// Pick the execution strategy for one entity class.
pub fn select_strategy(chunk_count: usize, contention_prone: bool) -> Strategy {
    if chunk_count > SERIAL_CHUNK_THRESHOLD || contention_prone {
        Strategy::Serial
    } else {
        Strategy::Parallel
    }
}

/// Knobs that operators may override per deployment.
#[derive(Debug, Clone)]
pub struct SchedulerTuning {
    /// Estimated record count at or above which a class is treated as
    /// contention-prone and imported serially.
    pub contention_record_threshold: u64,
}

impl Default for SchedulerTuning {
    fn default() -> Self {
        Self {
            contention_record_threshold: 50_000,
        }
    }
}

/// Executes one entity class's chunks against the store.
pub struct ImportScheduler {
    store: Arc<dyn GraphStore>,
    profile: SizingProfile,
    tuning: SchedulerTuning,
    cancel: Option<watch::Receiver<bool>>,
}

enum ChunkOutcome {
    Applied(u64),
    Failed(StoreError),
}

impl ImportScheduler {
    #[must_use]
    pub fn new(store: Arc<dyn GraphStore>, profile: SizingProfile) -> Self {
        Self {
            store,
            profile,
            tuning: SchedulerTuning::default(),
            cancel: None,
        }
    }

    #[must_use]
    pub fn with_tuning(mut self, tuning: SchedulerTuning) -> Self {
        self.tuning = tuning;
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// A class whose estimated volume crosses the threshold merges too many
    /// rows under one label to run chunks concurrently.
    #[must_use]
    pub fn contention_prone(&self, estimated_records: u64) -> bool {
        estimated_records >= self.tuning.contention_record_threshold
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Per-store-call time budget from the sizing profile. A hung call
    /// becomes a timeout-kind error on the ordinary retry path instead of
    /// parking a worker forever.
    fn op_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.profile.timeout_secs.max(1)))
    }

    /// Import one entity class to a terminal state.
    ///
    /// Runs the selected strategy over all chunks, then a serial
    /// reconciliation pass over whatever failed. Always returns a structured
    /// outcome; chunks that stay failed are listed, never raised.
    pub async fn import_entity_class(
        &self,
        class: &EntityClass,
        chunks: &[ChunkRef],
        estimated_records: u64,
    ) -> EntityClassRun {
        let started = std::time::Instant::now();
        let strategy = select_strategy(chunks.len(), self.contention_prone(estimated_records));
        tracing::info!(
            class = %class,
            chunks = chunks.len(),
            estimated_records,
            ?strategy,
            "Importing entity class"
        );

        let mut outcomes = match strategy {
            Strategy::Parallel => self.run_parallel(class, chunks).await,
            Strategy::Serial => self.run_serial(class, chunks).await,
        };

        // Phase two: serial reconciliation of the stragglers with a higher
        // attempt ceiling. Upserts make re-running a partially applied chunk
        // safe.
        let failed: Vec<usize> = outcomes
            .iter()
            .enumerate()
            .filter_map(|(i, o)| matches!(o, ChunkOutcome::Failed(_)).then_some(i))
            .collect();
        let mut reconciled = 0usize;
        if !failed.is_empty() && !self.cancelled() {
            tracing::warn!(
                class = %class,
                failed = failed.len(),
                "Reconciling failed chunks serially"
            );
            let policy = RetryPolicy::new(RECONCILE_MAX_ATTEMPTS);
            for i in failed {
                if self.cancelled() {
                    break;
                }
                tokio::time::sleep(RECONCILE_PAUSE).await;
                let outcome = self.load_chunk_with_retry(class, &chunks[i], policy).await;
                if matches!(outcome, ChunkOutcome::Applied(_)) {
                    reconciled += 1;
                }
                outcomes[i] = outcome;
            }
        }

        let mut records_applied = 0u64;
        let mut succeeded = 0usize;
        let mut failed_chunks = Vec::new();
        for (chunk, outcome) in chunks.iter().zip(&outcomes) {
            match outcome {
                ChunkOutcome::Applied(n) => {
                    succeeded += 1;
                    records_applied += n;
                }
                ChunkOutcome::Failed(err) => failed_chunks.push(ChunkFailure {
                    chunk_id: chunk.id(),
                    kind: err.kind,
                    message: err.message.clone(),
                }),
            }
        }

        let run = EntityClassRun {
            class: class.clone(),
            strategy,
            total_chunks: chunks.len(),
            succeeded,
            records_applied,
            failed_chunks,
            reconciled,
            elapsed_secs: started.elapsed().as_secs_f64(),
        };
        tracing::info!(
            class = %class,
            succeeded = run.succeeded,
            failed = run.failed_chunks.len(),
            reconciled = run.reconciled,
            records = run.records_applied,
            "Entity class finished"
        );
        run
    }

    /// Waves of up to `max_workers` concurrent chunk loads, with start
    /// jitter inside each wave and a drain pause between waves.
    async fn run_parallel(&self, class: &EntityClass, chunks: &[ChunkRef]) -> Vec<ChunkOutcome> {
        let workers = self.profile.max_workers.max(1);
        let policy = RetryPolicy::new(PARALLEL_MAX_ATTEMPTS);
        let commit_size = self.profile.commit_size();
        let op_timeout = self.op_timeout();

        let mut outcomes: Vec<ChunkOutcome> = Vec::with_capacity(chunks.len());
        for _ in chunks {
            outcomes.push(ChunkOutcome::Failed(StoreError::fatal("not attempted")));
        }

        for (wave_idx, wave) in chunks.chunks(workers).enumerate() {
            if self.cancelled() {
                let base = wave_idx * workers;
                for i in base..chunks.len() {
                    outcomes[i] = ChunkOutcome::Failed(cancellation_error());
                }
                break;
            }
            if wave_idx > 0 {
                tokio::time::sleep(WAVE_PAUSE).await;
            }

            let mut tasks: JoinSet<(usize, ChunkOutcome)> = JoinSet::new();
            for (offset, chunk) in wave.iter().enumerate() {
                let index = wave_idx * workers + offset;
                let store = Arc::clone(&self.store);
                let class = class.clone();
                let chunk = chunk.clone();
                tasks.spawn(async move {
                    // Stagger starts so a wave does not stampede the pool.
                    let jitter = 0.1 + 0.4 * rand::random::<f64>();
                    tokio::time::sleep(Duration::from_secs_f64(jitter)).await;
                    let outcome = load_chunk_with_retry(
                        &store,
                        &class,
                        &chunk,
                        policy,
                        commit_size,
                        op_timeout,
                    )
                    .await;
                    (index, outcome)
                });
            }
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((index, outcome)) => outcomes[index] = outcome,
                    Err(err) => {
                        tracing::error!(%err, "Chunk task panicked");
                    }
                }
            }
        }
        outcomes
    }

    /// One chunk at a time with a fixed pause in between, trading throughput
    /// for a quiet lock profile.
    async fn run_serial(&self, class: &EntityClass, chunks: &[ChunkRef]) -> Vec<ChunkOutcome> {
        let policy = RetryPolicy::new(SERIAL_MAX_ATTEMPTS);
        let mut outcomes = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            if self.cancelled() {
                outcomes.extend((i..chunks.len()).map(|_| ChunkOutcome::Failed(cancellation_error())));
                break;
            }
            if i > 0 {
                tokio::time::sleep(SERIAL_PAUSE).await;
            }
            outcomes.push(self.load_chunk_with_retry(class, chunk, policy).await);
        }
        outcomes
    }

    async fn load_chunk_with_retry(
        &self,
        class: &EntityClass,
        chunk: &ChunkRef,
        policy: RetryPolicy,
    ) -> ChunkOutcome {
        load_chunk_with_retry(
            &self.store,
            class,
            chunk,
            policy,
            self.profile.commit_size(),
            self.op_timeout(),
        )
        .await
    }
}

fn cancellation_error() -> StoreError {
    StoreError::fatal("import cancelled")
}

/// Load one chunk to a terminal state under the given policy.
///
/// Each attempt replays the whole chunk; partially applied attempts are
/// absorbed by the upsert semantics.
async fn load_chunk_with_retry(
    store: &Arc<dyn GraphStore>,
    class: &EntityClass,
    chunk: &ChunkRef,
    policy: RetryPolicy,
    commit_size: usize,
    op_timeout: Duration,
) -> ChunkOutcome {
    let mut attempt = 0u32;
    loop {
        match load_chunk(store, class, chunk, commit_size, op_timeout).await {
            Ok(applied) => {
                tracing::debug!(chunk = %chunk.id(), class = %class, applied, "Chunk loaded");
                return ChunkOutcome::Applied(applied);
            }
            Err(err) => {
                attempt += 1;
                let decision = policy.should_retry(attempt, &err);
                if !decision.retry {
                    tracing::error!(
                        chunk = %chunk.id(),
                        class = %class,
                        kind = %err.kind,
                        attempt,
                        %err,
                        "Chunk failed terminally"
                    );
                    return ChunkOutcome::Failed(err);
                }
                tracing::warn!(
                    chunk = %chunk.id(),
                    class = %class,
                    kind = %err.kind,
                    attempt,
                    delay = ?decision.delay,
                    "Chunk attempt failed, backing off"
                );
                tokio::time::sleep(decision.delay).await;
            }
        }
    }
}

/// Parse the chunk file, keep the rows belonging to this class, and apply
/// them in commit-sized sub-batches. File-level problems are fatal: a chunk
/// that cannot be read will not read better on retry. Every store call is
/// bounded by the profile's timeout budget.
async fn load_chunk(
    store: &Arc<dyn GraphStore>,
    class: &EntityClass,
    chunk: &ChunkRef,
    commit_size: usize,
    op_timeout: Duration,
) -> Result<u64, StoreError> {
    let commit_size = commit_size.max(1);
    let mut applied = 0u64;
    match class {
        EntityClass::Node { label } => {
            let records = batch::read_node_records(&chunk.path)
                .map_err(|e| StoreError::fatal(format!("{e:#}")))?;
            let mine: Vec<_> = records.into_iter().filter(|r| &r.label == label).collect();
            for sub in mine.chunks(commit_size) {
                applied += bounded(op_timeout, store.apply_nodes(label, sub)).await?;
            }
        }
        EntityClass::Relationship { rel_type } => {
            let records = batch::read_rel_records(&chunk.path)
                .map_err(|e| StoreError::fatal(format!("{e:#}")))?;
            let mine: Vec<_> = records
                .into_iter()
                .filter(|r| &r.rel_type == rel_type)
                .collect();
            for sub in mine.chunks(commit_size) {
                applied += bounded(op_timeout, store.apply_relationships(rel_type, sub)).await?;
            }
        }
    }
    Ok(applied)
}

/// Bound one store call by the per-operation time budget, converting elapse
/// into a timeout-kind error the retry policy already understands.
async fn bounded<T>(
    op_timeout: Duration,
    call: impl std::future::Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    match tokio::time::timeout(op_timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::with_kind(
            ErrorKind::Timeout,
            format!("store call exceeded the {}s budget", op_timeout.as_secs()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use graphload_types::{DiskClass, ErrorKind};
    use std::io::Write;
    use std::path::{Path, PathBuf};

    fn profile() -> SizingProfile {
        SizingProfile {
            cpu_cores: 4,
            memory_gb: 8.0,
            available_memory_gb: 4.0,
            disk_class: DiskClass::Unknown,
            pool_size: 8,
            timeout_secs: 60,
            chunk_size: 100,
            read_chunk_size: 50,
            max_workers: 2,
        }
    }

    fn write_node_chunk(dir: &Path, name: &str, label: &str, keys: &[&str]) -> ChunkRef {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "id:ID,:LABEL").unwrap();
        for key in keys {
            writeln!(f, "{key},{label}").unwrap();
        }
        ChunkRef {
            path,
            index: 0,
            record_count: keys.len(),
        }
    }

    #[test]
    fn strategy_boundary_at_the_chunk_threshold() {
        assert_eq!(select_strategy(19, false), Strategy::Parallel);
        assert_eq!(select_strategy(20, false), Strategy::Parallel);
        assert_eq!(select_strategy(21, false), Strategy::Serial);
    }

    #[test]
    fn contention_prone_classes_go_serial() {
        assert_eq!(select_strategy(2, true), Strategy::Serial);
    }

    #[test]
    fn contention_threshold_is_configurable() {
        let store: Arc<dyn GraphStore> = Arc::new(MemoryStore::new());
        let scheduler = ImportScheduler::new(Arc::clone(&store), profile());
        assert!(!scheduler.contention_prone(49_999));
        assert!(scheduler.contention_prone(50_000));

        let scheduler = ImportScheduler::new(store, profile()).with_tuning(SchedulerTuning {
            contention_record_threshold: 10,
        });
        assert!(scheduler.contention_prone(10));
    }

    #[tokio::test(start_paused = true)]
    async fn parallel_import_applies_all_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let chunks = vec![
            write_node_chunk(dir.path(), "c1.csv", "Chemical", &["a", "b"]),
            write_node_chunk(dir.path(), "c2.csv", "Chemical", &["c", "d"]),
            write_node_chunk(dir.path(), "c3.csv", "Chemical", &["e", "f"]),
        ];
        let memory = Arc::new(MemoryStore::new());
        let store: Arc<dyn GraphStore> = memory.clone();
        let scheduler = ImportScheduler::new(store, profile());
        let run = scheduler
            .import_entity_class(&EntityClass::node("Chemical"), &chunks, 6)
            .await;
        assert_eq!(run.strategy, Strategy::Parallel);
        assert_eq!(run.succeeded, 3);
        assert_eq!(run.records_applied, 6);
        assert!(run.is_complete());
        assert_eq!(memory.node_count(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn rows_of_other_classes_are_filtered_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "id:ID,:LABEL").unwrap();
        writeln!(f, "a,Chemical").unwrap();
        writeln!(f, "acme,Company").unwrap();
        drop(f);
        let chunk = ChunkRef {
            path,
            index: 0,
            record_count: 2,
        };
        let memory = Arc::new(MemoryStore::new());
        let store: Arc<dyn GraphStore> = memory.clone();
        let scheduler = ImportScheduler::new(store, profile());
        let run = scheduler
            .import_entity_class(&EntityClass::node("Chemical"), &[chunk], 1)
            .await;
        assert_eq!(run.records_applied, 1);
        assert_eq!(memory.node_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_retried_to_success() {
        let dir = tempfile::tempdir().unwrap();
        let chunks = vec![write_node_chunk(dir.path(), "c1.csv", "L", &["a"])];
        let memory = Arc::new(MemoryStore::new());
        memory.inject_failure(StoreError::transient("deadlock detected"));
        memory.inject_failure(StoreError::transient("query timeout"));
        let store: Arc<dyn GraphStore> = memory.clone();
        let scheduler = ImportScheduler::new(store, profile());
        let run = scheduler
            .import_entity_class(&EntityClass::node("L"), &chunks, 1)
            .await;
        assert!(run.is_complete());
        assert_eq!(memory.node_count(), 1);
        assert!(memory.write_calls() >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_failure_reaches_reconciliation_then_reports() {
        let dir = tempfile::tempdir().unwrap();
        let chunks = vec![write_node_chunk(dir.path(), "c1.csv", "L", &["a"])];
        let memory = Arc::new(MemoryStore::new());
        // Main pass fails fatally; reconciliation pass succeeds.
        memory.inject_failure(StoreError::fatal("syntax error"));
        let store: Arc<dyn GraphStore> = memory.clone();
        let scheduler = ImportScheduler::new(store, profile());
        let run = scheduler
            .import_entity_class(&EntityClass::node("L"), &chunks, 1)
            .await;
        assert!(run.is_complete());
        assert_eq!(run.reconciled, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_chunk_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let chunks = vec![
            write_node_chunk(dir.path(), "c1.csv", "L", &["a"]),
            write_node_chunk(dir.path(), "c2.csv", "L", &["b"]),
        ];
        let memory = Arc::new(MemoryStore::new());
        // Far more failures than any ceiling allows; only chunk attempts
        // consume them, so one chunk stays failed while its sibling lands.
        for _ in 0..40 {
            memory.inject_failure(StoreError::transient("connection reset"));
        }
        let store: Arc<dyn GraphStore> = memory.clone();
        let scheduler = ImportScheduler::new(store, profile());
        let run = scheduler
            .import_entity_class(&EntityClass::node("L"), &chunks, 2)
            .await;
        assert_eq!(run.total_chunks, 2);
        assert!(!run.is_complete());
        assert!(run.failed_chunks.len() <= 2);
        assert!(run
            .failed_chunks
            .iter()
            .all(|f| f.kind == ErrorKind::Connection));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_store_call_is_bounded_by_the_timeout_budget() {
        use graphload_types::{NodeRecord, RelRecord};
        use std::collections::BTreeMap;

        struct HangingStore;

        #[async_trait::async_trait]
        impl GraphStore for HangingStore {
            async fn verify_connectivity(&self) -> Result<(), StoreError> {
                Ok(())
            }
            async fn ensure_constraints(&self, _: &[String]) -> Result<(), StoreError> {
                Ok(())
            }
            async fn apply_nodes(&self, _: &str, _: &[NodeRecord]) -> Result<u64, StoreError> {
                std::future::pending().await
            }
            async fn apply_relationships(
                &self,
                _: &str,
                _: &[RelRecord],
            ) -> Result<u64, StoreError> {
                std::future::pending().await
            }
            async fn node_counts_by_label(&self) -> Result<BTreeMap<String, u64>, StoreError> {
                Ok(BTreeMap::new())
            }
            async fn relationship_counts_by_type(
                &self,
            ) -> Result<BTreeMap<String, u64>, StoreError> {
                Ok(BTreeMap::new())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let chunks = vec![write_node_chunk(dir.path(), "c1.csv", "L", &["a"])];
        let store: Arc<dyn GraphStore> = Arc::new(HangingStore);
        let scheduler = ImportScheduler::new(store, profile());
        // A store call that never resolves must still yield a terminal
        // outcome instead of parking the worker forever.
        let run = scheduler
            .import_entity_class(&EntityClass::node("L"), &chunks, 1)
            .await;
        assert!(!run.is_complete());
        assert_eq!(run.failed_chunks.len(), 1);
        assert_eq!(run.failed_chunks[0].kind, ErrorKind::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_scheduling_new_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let chunks: Vec<ChunkRef> = (0..30)
            .map(|i| write_node_chunk(dir.path(), &format!("c{i}.csv"), "L", &["k"]))
            .collect();
        let (tx, rx) = watch::channel(true);
        let memory = Arc::new(MemoryStore::new());
        let store: Arc<dyn GraphStore> = memory.clone();
        // 30 chunks selects the serial strategy; cancelled before the start.
        let scheduler = ImportScheduler::new(store, profile()).with_cancel(rx);
        let run = scheduler
            .import_entity_class(&EntityClass::node("L"), &chunks, 30)
            .await;
        drop(tx);
        assert_eq!(run.strategy, Strategy::Serial);
        assert_eq!(run.succeeded, 0);
        assert_eq!(run.failed_chunks.len(), 30);
        assert_eq!(memory.write_calls(), 0);
    }
}
