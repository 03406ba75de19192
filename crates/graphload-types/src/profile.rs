//! Run sizing profile.
//!
//! A [`SizingProfile`] is computed once per run by the resource profiler and
//! read-only thereafter. Re-profiling is a new run.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage class of the host's primary disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DiskClass {
    Ssd,
    Rotational,
    #[default]
    Unknown,
}

impl fmt::Display for DiskClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ssd => "ssd",
            Self::Rotational => "rotational",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Immutable snapshot of the concurrency/timeout/chunk-size parameters for
/// one import run.
///
/// These are heuristics that bound resource usage; correctness never depends
/// on their exact values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizingProfile {
    pub cpu_cores: usize,
    pub memory_gb: f64,
    pub available_memory_gb: f64,
    pub disk_class: DiskClass,
    /// Store connection pool size.
    pub pool_size: u32,
    /// Per-operation timeout budget in seconds.
    pub timeout_secs: u32,
    /// Target records per chunk file.
    pub chunk_size: usize,
    /// Records per incremental read while splitting.
    pub read_chunk_size: usize,
    /// Worker concurrency for the parallel strategy.
    pub max_workers: usize,
}

impl SizingProfile {
    /// Conservative hard-coded profile used when host inspection fails.
    #[must_use]
    pub fn conservative() -> Self {
        Self {
            cpu_cores: 4,
            memory_gb: 4.0,
            available_memory_gb: 2.0,
            disk_class: DiskClass::Unknown,
            pool_size: 8,
            timeout_secs: 120,
            chunk_size: 1000,
            read_chunk_size: 1000,
            max_workers: 2,
        }
    }

    /// Per-transaction commit batch size, derived from available memory.
    #[must_use]
    pub fn commit_size(&self) -> usize {
        if self.available_memory_gb > 8.0 {
            2000
        } else if self.available_memory_gb > 4.0 {
            1000
        } else {
            500
        }
    }
}

impl Default for SizingProfile {
    fn default() -> Self {
        Self::conservative()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conservative_profile_matches_contract() {
        let p = SizingProfile::conservative();
        assert_eq!(p.cpu_cores, 4);
        assert_eq!(p.pool_size, 8);
        assert_eq!(p.timeout_secs, 120);
        assert_eq!(p.chunk_size, 1000);
        assert_eq!(p.max_workers, 2);
        assert_eq!(p.disk_class, DiskClass::Unknown);
    }

    #[test]
    fn commit_size_scales_with_available_memory() {
        let mut p = SizingProfile::conservative();
        p.available_memory_gb = 16.0;
        assert_eq!(p.commit_size(), 2000);
        p.available_memory_gb = 6.0;
        assert_eq!(p.commit_size(), 1000);
        p.available_memory_gb = 2.0;
        assert_eq!(p.commit_size(), 500);
    }
}
