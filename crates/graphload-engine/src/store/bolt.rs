//! Bolt-protocol store adapter.
//!
//! Translates the [`GraphStore`] surface into `UNWIND $rows` batch upserts
//! over a pooled `neo4rs` connection. Driver failures are classified by
//! description: the known transient families retry, server-flagged transient
//! errors get the bounded `TransientOther` treatment, and everything else is
//! fatal so an unclassified failure can never loop.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use graphload_types::{ErrorKind, NodeRecord, RelRecord, SizingProfile, StoreError};
use neo4rs::{query, BoltType, ConfigBuilder, Graph};

use crate::query as cypher;
use crate::store::GraphStore;

/// Connection settings for the Bolt adapter.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: Option<String>,
}

/// Production [`GraphStore`] backed by a Bolt connection pool.
pub struct BoltStore {
    graph: Graph,
}

impl BoltStore {
    /// Connect with the pool sized from the host profile.
    ///
    /// # Errors
    ///
    /// Fails when the driver config is invalid or the initial connection is
    /// refused; both are fatal.
    pub async fn connect(config: &StoreConfig, profile: &SizingProfile) -> Result<Self, StoreError> {
        let mut builder = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(profile.pool_size as usize);
        if let Some(db) = &config.database {
            builder = builder.db(db.as_str());
        }
        let driver_config = builder
            .build()
            .map_err(|e| StoreError::fatal(format!("invalid store config: {e}")))?;
        let graph = Graph::connect(driver_config)
            .await
            .map_err(map_driver_error)?;
        tracing::info!(
            uri = %config.uri,
            pool_size = profile.pool_size,
            "Connected to graph store"
        );
        Ok(Self { graph })
    }
}

/// Classify a driver error by its description.
///
/// The known families map to their retryable kinds. Errors the server itself
/// flags as transient but that match no family keep bounded retryability;
/// anything else is fatal.
fn map_driver_error(err: neo4rs::Error) -> StoreError {
    let description = err.to_string();
    match ErrorKind::classify(&description) {
        ErrorKind::TransientOther => {
            if description.to_lowercase().contains("transienterror") {
                StoreError::with_kind(ErrorKind::TransientOther, description)
            } else {
                StoreError::fatal(description)
            }
        }
        kind => StoreError::with_kind(kind, description),
    }
}

fn node_row(record: &NodeRecord) -> HashMap<String, BoltType> {
    let mut row: HashMap<String, BoltType> = HashMap::new();
    row.insert("key".into(), record.key.clone().into());
    row.insert("props".into(), props_map(&record.props, &record.key));
    row
}

fn rel_row(record: &RelRecord) -> HashMap<String, BoltType> {
    let mut row: HashMap<String, BoltType> = HashMap::new();
    row.insert("start".into(), record.start.clone().into());
    row.insert("end".into(), record.end.clone().into());
    let props: HashMap<String, BoltType> = record
        .props
        .iter()
        .map(|(k, v)| (k.clone(), v.clone().into()))
        .collect();
    row.insert("props".into(), props.into());
    row
}

/// Property overlay for a node row; the key rides along so `SET n += props`
/// can never erase it.
fn props_map(props: &BTreeMap<String, String>, key: &str) -> BoltType {
    let mut map: HashMap<String, BoltType> = props
        .iter()
        .map(|(k, v)| (k.clone(), v.clone().into()))
        .collect();
    map.insert("key".into(), key.to_string().into());
    map.into()
}

async fn counts_query(
    graph: &Graph,
    statement: &str,
    name_column: &str,
) -> Result<BTreeMap<String, u64>, StoreError> {
    let mut counts = BTreeMap::new();
    let mut rows = graph
        .execute(query(statement))
        .await
        .map_err(map_driver_error)?;
    while let Some(row) = rows.next().await.map_err(map_driver_error)? {
        let name: String = row
            .get(name_column)
            .map_err(|e| StoreError::fatal(format!("count row missing {name_column}: {e}")))?;
        let count: i64 = row
            .get("count")
            .map_err(|e| StoreError::fatal(format!("count row missing count: {e}")))?;
        counts.insert(name, count.max(0) as u64);
    }
    Ok(counts)
}

#[async_trait]
impl GraphStore for BoltStore {
    async fn verify_connectivity(&self) -> Result<(), StoreError> {
        self.graph
            .run(query("RETURN 1"))
            .await
            .map_err(map_driver_error)
    }

    async fn ensure_constraints(&self, labels: &[String]) -> Result<(), StoreError> {
        for label in labels {
            self.graph
                .run(query(&cypher::key_constraint(label)))
                .await
                .map_err(map_driver_error)?;
            tracing::debug!(label, "Key constraint ensured");
        }
        Ok(())
    }

    async fn apply_nodes(&self, label: &str, records: &[NodeRecord]) -> Result<u64, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        let rows: Vec<HashMap<String, BoltType>> = records.iter().map(node_row).collect();
        self.graph
            .run(query(&cypher::node_upsert(label)).param("rows", rows))
            .await
            .map_err(map_driver_error)?;
        Ok(records.len() as u64)
    }

    async fn apply_relationships(
        &self,
        rel_type: &str,
        records: &[RelRecord],
    ) -> Result<u64, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        let rows: Vec<HashMap<String, BoltType>> = records.iter().map(rel_row).collect();
        // The statement returns how many rows actually merged; ghost-endpoint
        // rows match nothing, so the input length would overcount.
        let mut result = self
            .graph
            .execute(query(&cypher::relationship_upsert(rel_type)).param("rows", rows))
            .await
            .map_err(map_driver_error)?;
        let applied = match result.next().await.map_err(map_driver_error)? {
            Some(row) => {
                let count: i64 = row.get("applied").map_err(|e| {
                    StoreError::fatal(format!("relationship upsert returned no applied count: {e}"))
                })?;
                count.max(0) as u64
            }
            None => 0,
        };
        Ok(applied)
    }

    async fn node_counts_by_label(&self) -> Result<BTreeMap<String, u64>, StoreError> {
        counts_query(&self.graph, cypher::node_counts(), "label").await
    }

    async fn relationship_counts_by_type(&self) -> Result<BTreeMap<String, u64>, StoreError> {
        counts_query(&self.graph, cypher::relationship_counts(), "rel_type").await
    }
}
