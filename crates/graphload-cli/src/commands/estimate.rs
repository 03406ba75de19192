use std::path::Path;

use anyhow::{Context, Result};

use graphload_engine::batch;
use graphload_engine::config;
use graphload_engine::verifier;

/// Execute the `estimate` command: scan the batch files and report expected
/// record counts without touching the store.
pub async fn execute(config_path: &Path) -> Result<()> {
    let config = config::parse_config(config_path)
        .with_context(|| format!("Failed to load config: {}", config_path.display()))?;

    let batches = batch::discover_batches(&config.source.batch_dir)?;
    if batches.is_empty() {
        println!(
            "No batch files found in {}",
            config.source.batch_dir.display()
        );
        return Ok(());
    }

    let estimate = verifier::estimate_workload(&batches);
    println!("Batches: {}", batches.len());
    println!("Node labels:");
    for (label, count) in &estimate.node_counts_by_label {
        println!("  {label:<28} {count}");
    }
    println!("Relationship types:");
    for (rel_type, count) in &estimate.relationship_counts_by_type {
        println!("  {rel_type:<28} {count}");
    }
    println!("Total records: {}", estimate.total_records());
    Ok(())
}
