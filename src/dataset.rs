//! Dataset model - normalized tabular rows plus a discovered column schema

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single tabular row: column name → trimmed string value.
///
/// Every key is guaranteed to be one of the owning dataset's headers.
pub type Row = HashMap<String, String>;

/// Partition of a dataset's headers into analysis roles.
///
/// Invariant: the three lists are disjoint and together cover every header.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatasetSchema {
    /// Columns whose sampled values all coerce to finite numbers
    pub numerical: Vec<String>,

    /// Columns whose sampled values all parse as dates
    pub temporal: Vec<String>,

    /// Everything else (also the default for fully-empty columns)
    pub categorical: Vec<String>,
}

impl DatasetSchema {
    /// A dataset supports coordinate analysis only when it carries at least
    /// one numeric column and at least one categorical or temporal column.
    pub fn supports_coordinates(&self) -> bool {
        !self.numerical.is_empty() && !(self.categorical.is_empty() && self.temporal.is_empty())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatasetMeta {
    /// Size of the source file, when known
    pub size_bytes: Option<u64>,

    /// Row count after normalization
    pub row_count: usize,

    /// Ingestion timestamp (unix millis)
    pub ingested_at: i64,
}

/// An admitted dataset: normalized rows, ordered unique headers, discovered
/// schema, and a change-detection fingerprint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    pub name: String,
    pub rows: Vec<Row>,
    pub headers: Vec<String>,
    pub schema: DatasetSchema,
    pub content_hash: String,
    pub meta: DatasetMeta,
}

impl DatasetMeta {
    pub fn new(size_bytes: Option<u64>, row_count: usize) -> Self {
        Self {
            size_bytes,
            row_count,
            ingested_at: Utc::now().timestamp_millis(),
        }
    }
}

/// Normalize decoded rows: trim every value, keep only keys that are known
/// headers, and drop rows that are entirely empty after trimming.
pub fn normalize_rows(headers: &[String], raw_rows: Vec<Row>) -> Vec<Row> {
    raw_rows
        .into_iter()
        .filter_map(|raw| {
            let mut row = Row::with_capacity(raw.len());
            for header in headers {
                if let Some(value) = raw.get(header) {
                    row.insert(header.clone(), value.trim().to_string());
                }
            }
            let all_empty = row.values().all(|v| v.is_empty());
            if row.is_empty() || all_empty {
                None
            } else {
                Some(row)
            }
        })
        .collect()
}
