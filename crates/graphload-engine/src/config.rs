//! Load-config YAML parsing with environment variable substitution.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

/// Top-level run configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoadConfig {
    pub store: StoreSection,
    pub source: SourceSection,
    #[serde(default)]
    pub resources: ResourceSection,
}

/// Graph store connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    pub uri: String,
    pub user: String,
    pub password: String,
    #[serde(default)]
    pub database: Option<String>,
}

/// Where the batch CSVs live.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSection {
    pub batch_dir: PathBuf,
}

/// Optional overrides for the derived sizing; anything left out is
/// auto-detected from the host.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceSection {
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub max_pool_size: Option<u32>,
    #[serde(default)]
    pub base_timeout_secs: Option<u32>,
    #[serde(default)]
    pub contention_record_threshold: Option<u64>,
}

impl ResourceSection {
    /// Profiler hints with any configured overrides applied.
    #[must_use]
    pub fn sizing_hints(&self) -> crate::profiler::SizingHints {
        let mut hints = crate::profiler::SizingHints::default();
        if let Some(chunk_size) = self.chunk_size {
            hints.target_chunk_size = chunk_size;
        }
        if let Some(pool) = self.max_pool_size {
            hints.max_pool_size = pool;
        }
        if let Some(timeout) = self.base_timeout_secs {
            hints.base_timeout_secs = timeout;
        }
        hints
    }
}

/// Substitute `${VAR_NAME}` patterns with environment variable values.
///
/// # Errors
///
/// Returns an error if any referenced environment variable is not set.
pub fn substitute_env_vars(input: &str) -> Result<String> {
    let mut result = input.to_string();
    let mut errors = Vec::new();

    for cap in ENV_VAR_RE.captures_iter(input) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(val) => {
                result = result.replace(&cap[0], &val);
            }
            Err(_) => {
                errors.push(var_name.to_string());
            }
        }
    }

    if !errors.is_empty() {
        anyhow::bail!("Missing environment variable(s): {}", errors.join(", "));
    }

    Ok(result)
}

/// Parse a load-config YAML string (after env var substitution).
///
/// # Errors
///
/// Returns an error if env var substitution fails, the YAML is invalid, or a
/// field fails validation.
pub fn parse_config_str(yaml_str: &str) -> Result<LoadConfig> {
    let substituted = substitute_env_vars(yaml_str)?;
    let config: LoadConfig =
        serde_yaml::from_str(&substituted).context("Failed to parse load config YAML")?;
    validate(&config)?;
    Ok(config)
}

/// Parse a load-config YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the YAML is invalid.
pub fn parse_config(path: &Path) -> Result<LoadConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config_str(&content)
}

fn validate(config: &LoadConfig) -> Result<()> {
    anyhow::ensure!(!config.store.uri.is_empty(), "store.uri must not be empty");
    anyhow::ensure!(!config.store.user.is_empty(), "store.user must not be empty");
    if let Some(chunk_size) = config.resources.chunk_size {
        anyhow::ensure!(chunk_size > 0, "resources.chunk_size must be positive");
    }
    if let Some(pool) = config.resources.max_pool_size {
        anyhow::ensure!(pool > 0, "resources.max_pool_size must be positive");
    }
    Ok(())
}
