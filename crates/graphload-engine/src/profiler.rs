//! Host resource detection and run sizing.
//!
//! Probes CPU count, memory, disk class, and current load, then derives the
//! [`SizingProfile`] for a run. Profiling never fails: any probe error falls
//! back to the conservative hard-coded profile.

use graphload_types::{DiskClass, SizingProfile};
use sysinfo::{CpuRefreshKind, Disks, MemoryRefreshKind, RefreshKind, System};

const GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Absolute connection-pool ceiling under the idle-host boost.
const POOL_ABSOLUTE_MAX: u32 = 150;
/// Timeout floor for the memory/disk adjustments.
const TIMEOUT_FLOOR_SECS: f64 = 60.0;
/// Timeout floor under the idle-host boost.
const BOOSTED_TIMEOUT_FLOOR_SECS: f64 = 30.0;
/// Composite load below which the host is judged idle.
const IDLE_LOAD_THRESHOLD: f64 = 0.6;

/// Caller-supplied sizing hints; everything else is derived.
#[derive(Debug, Clone)]
pub struct SizingHints {
    /// Target records per chunk before memory-tier adjustment.
    pub target_chunk_size: usize,
    /// Upper bound on the derived connection pool size.
    pub max_pool_size: u32,
    /// Baseline per-operation timeout before adjustment.
    pub base_timeout_secs: u32,
}

impl Default for SizingHints {
    fn default() -> Self {
        Self {
            target_chunk_size: 8000,
            max_pool_size: 50,
            base_timeout_secs: 120,
        }
    }
}

/// Raw measurements taken from the host.
#[derive(Debug, Clone)]
pub struct HostProbe {
    pub cpu_cores: usize,
    pub memory_gb: f64,
    pub available_memory_gb: f64,
    pub disk_class: DiskClass,
    /// Current CPU utilisation, 0.0–1.0.
    pub cpu_load: f64,
    /// Current memory utilisation, 0.0–1.0.
    pub memory_load: f64,
}

impl HostProbe {
    /// Probe the current system. Returns `None` when the readings are
    /// implausible (zero memory), which callers treat as a probe failure.
    pub fn detect() -> Option<Self> {
        let mut sys = System::new_with_specifics(
            RefreshKind::new()
                .with_memory(MemoryRefreshKind::everything())
                .with_cpu(CpuRefreshKind::everything()),
        );
        sys.refresh_memory();

        // CPU usage needs two samples a short interval apart.
        sys.refresh_cpu();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        sys.refresh_cpu();

        let total = sys.total_memory() as f64;
        if total <= 0.0 {
            return None;
        }
        let available = sys.available_memory() as f64;

        let cpu_cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        let cpu_load = f64::from(sys.global_cpu_info().cpu_usage()) / 100.0;
        let memory_load = (1.0 - available / total).clamp(0.0, 1.0);

        Some(Self {
            cpu_cores,
            memory_gb: total / GB,
            available_memory_gb: available / GB,
            disk_class: detect_disk_class(),
            cpu_load: cpu_load.clamp(0.0, 1.0),
            memory_load,
        })
    }

    /// Composite load indicator, CPU and memory weighted 50/50.
    #[must_use]
    pub fn composite_load(&self) -> f64 {
        self.cpu_load * 0.5 + self.memory_load * 0.5
    }
}

fn detect_disk_class() -> DiskClass {
    let disks = Disks::new_with_refreshed_list();
    match disks.list().first().map(sysinfo::Disk::kind) {
        Some(sysinfo::DiskKind::SSD) => DiskClass::Ssd,
        Some(sysinfo::DiskKind::HDD) => DiskClass::Rotational,
        _ => DiskClass::Unknown,
    }
}

/// Stateless profiler: probe the host and derive a sizing profile.
pub struct ResourceProfiler;

impl ResourceProfiler {
    /// Never fails: probe errors yield [`SizingProfile::conservative`].
    #[must_use]
    pub fn profile(hints: &SizingHints) -> SizingProfile {
        match HostProbe::detect() {
            Some(probe) => {
                let profile = profile_from_probe(&probe, hints);
                tracing::info!(
                    cpu_cores = profile.cpu_cores,
                    memory_gb = format!("{:.1}", profile.memory_gb),
                    disk = %profile.disk_class,
                    pool_size = profile.pool_size,
                    timeout_secs = profile.timeout_secs,
                    chunk_size = profile.chunk_size,
                    max_workers = profile.max_workers,
                    "Sized run from host resources"
                );
                profile
            }
            None => {
                tracing::warn!("Host inspection failed, using conservative profile");
                SizingProfile::conservative()
            }
        }
    }
}

/// Pure derivation from probe to profile; the unit-testable part.
#[must_use]
pub fn profile_from_probe(probe: &HostProbe, hints: &SizingHints) -> SizingProfile {
    let pool_base = pool_size(probe.cpu_cores, probe.memory_gb, hints.max_pool_size);
    let timeout_base = timeout_secs(
        probe.memory_gb,
        probe.disk_class,
        f64::from(hints.base_timeout_secs),
    );

    // Idle hosts get a bounded boost: a bigger pool and a shorter timeout.
    let load = probe.composite_load();
    let (pool, timeout) = if load < IDLE_LOAD_THRESHOLD {
        let boosted_pool = ((f64::from(pool_base) * 1.3) as u32).min(POOL_ABSOLUTE_MAX);
        let boosted_timeout = (timeout_base * 0.8).max(BOOSTED_TIMEOUT_FLOOR_SECS);
        (boosted_pool, boosted_timeout)
    } else {
        (pool_base, timeout_base)
    };

    let (chunk_size, read_chunk_size) =
        chunk_sizes(probe.available_memory_gb, hints.target_chunk_size);

    SizingProfile {
        cpu_cores: probe.cpu_cores,
        memory_gb: probe.memory_gb,
        available_memory_gb: probe.available_memory_gb,
        disk_class: probe.disk_class,
        pool_size: pool,
        timeout_secs: timeout.round() as u32,
        chunk_size,
        read_chunk_size,
        max_workers: max_workers(probe.cpu_cores, probe.available_memory_gb),
    }
}

/// Pool size: ~3 connections per core, clamped by memory tier.
fn pool_size(cpu_cores: usize, memory_gb: f64, max_pool: u32) -> u32 {
    let base = (u32::try_from(cpu_cores).unwrap_or(u32::MAX))
        .saturating_mul(3)
        .min(max_pool);
    if memory_gb < 4.0 {
        base.clamp(4, 8)
    } else if memory_gb < 8.0 {
        base.clamp(8, 20)
    } else if memory_gb < 16.0 {
        base.clamp(12, 40)
    } else {
        base.min(max_pool)
    }
}

/// Timeout shortens for low-memory hosts and for solid-state storage,
/// floored at 60 s.
fn timeout_secs(memory_gb: f64, disk: DiskClass, base: f64) -> f64 {
    if memory_gb < 4.0 {
        (base * 0.7).max(TIMEOUT_FLOOR_SECS)
    } else if disk == DiskClass::Ssd {
        (base * 0.8).max(TIMEOUT_FLOOR_SECS)
    } else {
        base
    }
}

/// Chunk size scales with available memory; the read sub-chunk bounds how
/// much of a batch is held in memory while splitting.
fn chunk_sizes(available_gb: f64, target: usize) -> (usize, usize) {
    if available_gb < 2.0 {
        (target.min(3000), 1000)
    } else if available_gb > 8.0 {
        let chunk = target.max(12_000);
        (chunk, chunk)
    } else {
        (target, (target / 2).max(1))
    }
}

/// Worker concurrency for the parallel strategy, reduced on small hosts.
fn max_workers(cpu_cores: usize, available_gb: f64) -> usize {
    if available_gb > 8.0 && cpu_cores > 8 {
        (cpu_cores / 2).min(12)
    } else if available_gb > 4.0 && cpu_cores > 4 {
        (cpu_cores / 2).min(6)
    } else {
        2
    }
}
