//! Batch splitting into bounded-size chunk files.
//!
//! A batch no larger than the target chunk size is returned as a single
//! chunk referencing the original file, with no copy. Larger batches are
//! streamed in read-sub-chunk increments and flushed as numbered
//! `<base>_chunk_NNN.csv` files under a `chunks_<base>/` sibling directory;
//! stale artifacts for the same base are cleared first so re-runs are
//! reproducible. Blowing the in-memory accumulation budget triggers one
//! retry of the whole split at half the chunk size.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use graphload_types::{ChunkRef, SizingProfile};

const MB: usize = 1024 * 1024;
const MEMORY_BUDGET_MIN: usize = 64 * MB;
const MEMORY_BUDGET_MAX: usize = 1024 * MB;
/// Fraction of available memory the split accumulator may hold.
const MEMORY_BUDGET_FRACTION: f64 = 0.25;

/// Splits oversized batch files into bounded chunks.
#[derive(Debug, Clone)]
pub struct FileChunker {
    pub target_chunk_size: usize,
    pub read_chunk_size: usize,
    pub memory_budget_bytes: usize,
}

enum SplitAttempt {
    Done(Vec<ChunkRef>),
    BudgetExceeded,
}

impl FileChunker {
    #[must_use]
    pub fn from_profile(profile: &SizingProfile) -> Self {
        let budget = (profile.available_memory_gb * MEMORY_BUDGET_FRACTION * 1024.0 * 1024.0
            * 1024.0) as usize;
        Self {
            target_chunk_size: profile.chunk_size.max(1),
            read_chunk_size: profile.read_chunk_size.max(1),
            memory_budget_bytes: budget.clamp(MEMORY_BUDGET_MIN, MEMORY_BUDGET_MAX),
        }
    }

    /// Split one batch file into chunk references.
    ///
    /// # Errors
    ///
    /// Fails if the source cannot be read or chunk files cannot be written.
    /// Never fails on size alone.
    pub fn split(&self, path: &Path) -> Result<Vec<ChunkRef>> {
        let total_rows = count_rows(path)?;
        if total_rows <= self.target_chunk_size {
            tracing::debug!(
                file = %path.display(),
                rows = total_rows,
                "Batch fits in one chunk, no split"
            );
            return Ok(vec![ChunkRef {
                path: path.to_path_buf(),
                index: 0,
                record_count: total_rows,
            }]);
        }

        match self.split_once(path, self.target_chunk_size)? {
            SplitAttempt::Done(chunks) => Ok(chunks),
            SplitAttempt::BudgetExceeded => {
                let halved = (self.target_chunk_size / 2).max(1);
                tracing::warn!(
                    file = %path.display(),
                    halved_chunk_size = halved,
                    "Split accumulator over memory budget, retrying with smaller chunks"
                );
                match self.split_once(path, halved)? {
                    SplitAttempt::Done(chunks) => Ok(chunks),
                    SplitAttempt::BudgetExceeded => anyhow::bail!(
                        "split of {} exceeded the memory budget even at half chunk size",
                        path.display()
                    ),
                }
            }
        }
    }

    fn split_once(&self, path: &Path, chunk_size: usize) -> Result<SplitAttempt> {
        let base = file_stem(path);
        let chunk_dir = chunk_dir_for(path);

        // Clear stale artifacts from earlier runs of the same base.
        if chunk_dir.exists() {
            std::fs::remove_dir_all(&chunk_dir)
                .with_context(|| format!("failed to clear {}", chunk_dir.display()))?;
        }
        std::fs::create_dir_all(&chunk_dir)
            .with_context(|| format!("failed to create {}", chunk_dir.display()))?;

        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open batch file {}", path.display()))?;
        let headers = reader.headers()?.clone();

        let mut chunks = Vec::new();
        let mut accumulator: Vec<csv::StringRecord> = Vec::new();
        let mut accumulated_bytes = 0usize;
        let mut since_budget_check = 0usize;
        let mut chunk_num = 1usize;

        for row in reader.records() {
            let row = row.with_context(|| format!("malformed row in {}", path.display()))?;
            accumulated_bytes += row.as_slice().len();
            accumulator.push(row);
            since_budget_check += 1;

            if since_budget_check >= self.read_chunk_size {
                since_budget_check = 0;
                if accumulated_bytes > self.memory_budget_bytes {
                    return Ok(SplitAttempt::BudgetExceeded);
                }
            }

            if accumulator.len() >= chunk_size {
                let chunk =
                    flush_chunk(&chunk_dir, &base, chunk_num, &headers, &accumulator)?;
                chunks.push(chunk);
                accumulator.clear();
                accumulated_bytes = 0;
                chunk_num += 1;
            }
        }

        // Final partial accumulation flushes regardless of size.
        if !accumulator.is_empty() {
            let chunk = flush_chunk(&chunk_dir, &base, chunk_num, &headers, &accumulator)?;
            chunks.push(chunk);
        }

        tracing::info!(
            file = %path.display(),
            chunks = chunks.len(),
            chunk_size,
            "Batch split complete"
        );
        Ok(SplitAttempt::Done(chunks))
    }
}

fn flush_chunk(
    chunk_dir: &Path,
    base: &str,
    chunk_num: usize,
    headers: &csv::StringRecord,
    rows: &[csv::StringRecord],
) -> Result<ChunkRef> {
    let chunk_path = chunk_dir.join(format!("{base}_chunk_{chunk_num:03}.csv"));
    let mut writer = csv::Writer::from_path(&chunk_path)
        .with_context(|| format!("failed to create chunk file {}", chunk_path.display()))?;
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(ChunkRef {
        path: chunk_path,
        index: chunk_num - 1,
        record_count: rows.len(),
    })
}

/// `chunks_<base>/` next to the source file.
pub fn chunk_dir_for(path: &Path) -> PathBuf {
    let base = file_stem(path);
    path.parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("chunks_{base}"))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "batch".to_string())
}

fn count_rows(path: &Path) -> Result<usize> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open batch file {}", path.display()))?;
    let mut count = 0usize;
    for row in reader.byte_records() {
        row.with_context(|| format!("malformed row in {}", path.display()))?;
        count += 1;
    }
    Ok(count)
}
