//! Batch file contract: CSV layout, header sniffing, and record parsing.
//!
//! Node files carry a `<name>:ID` key column and a `:LABEL` column;
//! relationship files carry `:START_ID`, `:END_ID`, and `:TYPE`. Property
//! headers may carry a type suffix (`cas:string`) which is stripped; empty
//! and `"nan"` cells are treated as absent. Column-name normalization beyond
//! this is the producer's responsibility.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use graphload_types::{NodeRecord, RelRecord};

pub const LABEL_COLUMN: &str = ":LABEL";
pub const START_COLUMN: &str = ":START_ID";
pub const END_COLUMN: &str = ":END_ID";
pub const TYPE_COLUMN: &str = ":TYPE";

/// Semantic kind of one batch file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Nodes,
    Relationships,
}

/// One discovered batch file.
#[derive(Debug, Clone)]
pub struct BatchFile {
    pub path: PathBuf,
    pub kind: BatchKind,
}

/// Column positions resolved from a header row.
#[derive(Debug, Clone)]
pub struct HeaderLayout {
    pub kind: BatchKind,
    key: usize,
    label: usize,
    start: usize,
    end: usize,
    rel_type: usize,
    /// (column index, property name) for the remaining columns.
    props: Vec<(usize, String)>,
}

impl HeaderLayout {
    /// Resolve a header row, sniffing whether this is a node or relationship
    /// file.
    pub fn resolve(headers: &csv::StringRecord) -> Result<Self> {
        let mut key = None;
        let mut label = None;
        let mut start = None;
        let mut end = None;
        let mut rel_type = None;
        let mut props = Vec::new();

        for (idx, name) in headers.iter().enumerate() {
            match name {
                LABEL_COLUMN => label = Some(idx),
                START_COLUMN => start = Some(idx),
                END_COLUMN => end = Some(idx),
                TYPE_COLUMN => rel_type = Some(idx),
                _ if name.ends_with(":ID") && key.is_none() => key = Some(idx),
                _ => props.push((idx, property_name(name))),
            }
        }

        if let (Some(start), Some(end), Some(rel_type)) = (start, end, rel_type) {
            return Ok(Self {
                kind: BatchKind::Relationships,
                key: 0,
                label: 0,
                start,
                end,
                rel_type,
                props,
            });
        }
        match (key, label) {
            (Some(key), Some(label)) => Ok(Self {
                kind: BatchKind::Nodes,
                key,
                label,
                start: 0,
                end: 0,
                rel_type: 0,
                props,
            }),
            _ => anyhow::bail!(
                "unrecognized batch header: need either ':START_ID'/':END_ID'/':TYPE' \
                 or a '*:ID' key column plus ':LABEL'"
            ),
        }
    }

    /// Parse one node row; `None` when the key or label cell is unusable.
    pub fn node_record(&self, row: &csv::StringRecord) -> Option<NodeRecord> {
        let key = present(row.get(self.key)?)?;
        let label = present(row.get(self.label)?)?;
        Some(NodeRecord {
            key: key.to_string(),
            label: label.to_string(),
            props: self.collect_props(row),
        })
    }

    /// Parse one relationship row; `None` when an endpoint or type is
    /// missing.
    pub fn rel_record(&self, row: &csv::StringRecord) -> Option<RelRecord> {
        let start = present(row.get(self.start)?)?;
        let end = present(row.get(self.end)?)?;
        let rel_type = present(row.get(self.rel_type)?)?;
        Some(RelRecord {
            start: start.to_string(),
            end: end.to_string(),
            rel_type: rel_type.to_string(),
            props: self.collect_props(row),
        })
    }

    /// Label cell of one node row, for cheap scans that skip the rest of
    /// the row.
    pub fn label_of<'a>(&self, row: &'a csv::StringRecord) -> Option<&'a str> {
        present(row.get(self.label)?)
    }

    /// Type cell of one relationship row, for cheap scans.
    pub fn type_of<'a>(&self, row: &'a csv::StringRecord) -> Option<&'a str> {
        present(row.get(self.rel_type)?)
    }

    fn collect_props(&self, row: &csv::StringRecord) -> BTreeMap<String, String> {
        let mut props = BTreeMap::new();
        for (idx, name) in &self.props {
            if let Some(value) = row.get(*idx).and_then(present) {
                props.insert(name.clone(), value.to_string());
            }
        }
        props
    }
}

/// Strip the `:type` suffix from a property header.
fn property_name(header: &str) -> String {
    match header.split_once(':') {
        Some((name, _)) if !name.is_empty() => name.to_string(),
        _ => header.to_string(),
    }
}

/// Empty and `"nan"` cells count as absent.
fn present(cell: &str) -> Option<&str> {
    let trimmed = cell.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        None
    } else {
        Some(trimmed)
    }
}

/// Read and parse every node record in a batch or chunk file.
pub fn read_node_records(path: &Path) -> Result<Vec<NodeRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open batch file {}", path.display()))?;
    let layout = HeaderLayout::resolve(reader.headers()?)?;
    anyhow::ensure!(
        layout.kind == BatchKind::Nodes,
        "{} is not a node batch",
        path.display()
    );
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.with_context(|| format!("malformed row in {}", path.display()))?;
        if let Some(record) = layout.node_record(&row) {
            records.push(record);
        }
    }
    Ok(records)
}

/// Read and parse every relationship record in a batch or chunk file.
pub fn read_rel_records(path: &Path) -> Result<Vec<RelRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open batch file {}", path.display()))?;
    let layout = HeaderLayout::resolve(reader.headers()?)?;
    anyhow::ensure!(
        layout.kind == BatchKind::Relationships,
        "{} is not a relationship batch",
        path.display()
    );
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.with_context(|| format!("malformed row in {}", path.display()))?;
        if let Some(record) = layout.rel_record(&row) {
            records.push(record);
        }
    }
    Ok(records)
}

/// Discover batch CSVs in a directory, sniffing each header. Files are
/// returned in name order so re-runs see a stable sequence; chunk artifact
/// directories from earlier runs are skipped.
pub fn discover_batches(dir: &Path) -> Result<Vec<BatchFile>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read batch directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "csv"))
        .collect();
    paths.sort();

    let mut batches = Vec::new();
    for path in paths {
        let mut reader = csv::Reader::from_path(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        match HeaderLayout::resolve(reader.headers()?) {
            Ok(layout) => batches.push(BatchFile {
                path,
                kind: layout.kind,
            }),
            Err(err) => {
                tracing::warn!(file = %path.display(), %err, "Skipping unrecognized CSV");
            }
        }
    }
    Ok(batches)
}
