use tracing_subscriber::EnvFilter;

/// Initialize logging for an import run.
///
/// `RUST_LOG` wins when set. Otherwise the requested level applies to this
/// workspace while the Bolt driver is pinned to `warn`: at `debug` a large
/// run emits one line per chunk, and per-query driver chatter would bury
/// the chunk and retry records an operator actually reads.
pub fn init(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{log_level},neo4rs=warn"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
