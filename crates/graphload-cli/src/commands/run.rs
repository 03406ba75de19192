use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;

use graphload_engine::config;
use graphload_engine::orchestrator::{self, RunOptions};
use graphload_engine::profiler::ResourceProfiler;
use graphload_engine::result::RunSummary;
use graphload_engine::store::{BoltStore, GraphStore, MemoryStore, StoreConfig};

/// Execute the `run` command: parse the config, connect, and run an import.
pub async fn execute(config_path: &Path, dry_run: bool, json: bool) -> Result<()> {
    let config = config::parse_config(config_path)
        .with_context(|| format!("Failed to load config: {}", config_path.display()))?;

    let store: Arc<dyn GraphStore> = if dry_run {
        tracing::info!("Dry run: importing into an in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        let profile = ResourceProfiler::profile(&config.resources.sizing_hints());
        let store_config = StoreConfig {
            uri: config.store.uri.clone(),
            user: config.store.user.clone(),
            password: config.store.password.clone(),
            database: config.store.database.clone(),
        };
        Arc::new(
            BoltStore::connect(&store_config, &profile)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to graph store: {e}"))?,
        )
    };

    // Ctrl-C stops scheduling new chunks; in-flight chunks finish.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight chunks");
            let _ = cancel_tx.send(true);
        }
    });

    let summary = orchestrator::run_import(
        &config,
        store,
        RunOptions {
            cancel: Some(cancel_rx),
        },
    )
    .await
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    if summary.is_complete() {
        Ok(())
    } else {
        anyhow::bail!(
            "{} chunk(s) failed; the run may be safely repeated",
            summary.failed_chunk_count()
        )
    }
}

fn print_summary(summary: &RunSummary) {
    println!("Import finished in {:.1}s", summary.elapsed_secs);
    println!("  Records applied: {}", summary.records_applied());
    for run in &summary.class_runs {
        println!(
            "  {:30} {:?}: {}/{} chunks, {} records{}",
            run.class.to_string(),
            run.strategy,
            run.succeeded,
            run.total_chunks,
            run.records_applied,
            if run.reconciled > 0 {
                format!(" ({} reconciled)", run.reconciled)
            } else {
                String::new()
            }
        );
        for failure in &run.failed_chunks {
            println!(
                "    FAILED {} [{}] {}",
                failure.chunk_id, failure.kind, failure.message
            );
        }
    }
    if summary.live_stats.available {
        println!("  Live store counts:");
        for (label, count) in &summary.live_stats.node_counts_by_label {
            println!("    node:{label:<24} {count}");
        }
        for (rel_type, count) in &summary.live_stats.relationship_counts_by_type {
            println!("    rel:{rel_type:<25} {count}");
        }
    } else {
        println!("  Live store counts unavailable");
    }
}
