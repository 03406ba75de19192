use std::path::Path;

use anyhow::{Context, Result};

use graphload_engine::config;
use graphload_engine::profiler::ResourceProfiler;
use graphload_engine::store::{BoltStore, GraphStore, StoreConfig};

/// Execute the `check` command: validate config, batch directory, and store
/// connectivity.
pub async fn execute(config_path: &Path) -> Result<()> {
    let config = config::parse_config(config_path)
        .with_context(|| format!("Failed to load config: {}", config_path.display()))?;
    println!("Config structure:  OK");

    let batch_dir_ok = config.source.batch_dir.is_dir();
    println!(
        "Batch directory:   {}",
        if batch_dir_ok { "OK" } else { "MISSING" }
    );

    let profile = ResourceProfiler::profile(&config.resources.sizing_hints());
    let store_config = StoreConfig {
        uri: config.store.uri.clone(),
        user: config.store.user.clone(),
        password: config.store.password.clone(),
        database: config.store.database.clone(),
    };
    let store_ok = match BoltStore::connect(&store_config, &profile).await {
        Ok(store) => store.verify_connectivity().await.is_ok(),
        Err(err) => {
            tracing::error!(%err, "Store connection failed");
            false
        }
    };
    println!("Store:             {}", if store_ok { "OK" } else { "FAILED" });

    if batch_dir_ok && store_ok {
        println!("\nAll checks passed.");
        Ok(())
    } else {
        anyhow::bail!("One or more checks failed")
    }
}
