//! Cypher statement builders for the Bolt store adapter.
//!
//! All statements are `UNWIND $rows` batch upserts keyed on the `key`
//! property, so replaying a chunk is idempotent. Labels and relationship
//! types arrive from batch headers and are interpolated, so they pass
//! through a backtick sanitizer first.

/// Escape an identifier for backtick quoting in an interpolated position.
///
/// Backticks cannot be parameterized in Cypher; doubling embedded backticks
/// is the documented escape.
#[must_use]
pub fn sanitize_identifier(name: &str) -> String {
    name.replace('`', "``")
}

/// Batch node upsert: merge on `key`, overlay all supplied properties.
#[must_use]
pub fn node_upsert(label: &str) -> String {
    format!(
        "UNWIND $rows AS row \
         MERGE (n:`{}` {{key: row.key}}) \
         SET n += row.props",
        sanitize_identifier(label)
    )
}

/// Batch relationship upsert: match both endpoints by `key`, merge one edge
/// of the given type between them. Rows whose endpoints are missing match
/// nothing and are skipped, so edge batches can never invent nodes; the
/// returned `applied` count therefore reflects merged rows, not input rows.
#[must_use]
pub fn relationship_upsert(rel_type: &str) -> String {
    format!(
        "UNWIND $rows AS row \
         MATCH (a {{key: row.start}}) \
         MATCH (b {{key: row.end}}) \
         MERGE (a)-[r:`{}`]->(b) \
         SET r += row.props \
         RETURN count(r) AS applied",
        sanitize_identifier(rel_type)
    )
}

/// Uniqueness constraint on `key` for one label. `IF NOT EXISTS` keeps the
/// bootstrap idempotent across runs.
#[must_use]
pub fn key_constraint(label: &str) -> String {
    let label = sanitize_identifier(label);
    format!(
        "CREATE CONSTRAINT `key_{label}` IF NOT EXISTS \
         FOR (n:`{label}`) REQUIRE n.key IS UNIQUE"
    )
}

/// Node counts grouped by label.
#[must_use]
pub fn node_counts() -> &'static str {
    "MATCH (n) UNWIND labels(n) AS label RETURN label, count(n) AS count"
}

/// Relationship counts grouped by type.
#[must_use]
pub fn relationship_counts() -> &'static str {
    "MATCH ()-[r]->() RETURN type(r) AS rel_type, count(r) AS count"
}
