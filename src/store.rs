//! Collection Store - insertion-ordered dataset registry, working row set
//! derivation, and cross-dataset reconciliation
//!
//! The in-memory collection is the source of truth for the running session;
//! the persistence collaborator is written through best-effort only.

use crate::activity::ActivityLog;
use crate::dataset::{Dataset, DatasetSchema, Row};
use crate::persistence::{PersistenceStore, StoreCollection};
use crate::stats;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// How the working row set combines the collection's datasets.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum CombineMode {
    /// Most recently added dataset only
    #[default]
    Single,
    /// Every dataset's rows, dataset insertion order then row order
    Union,
    /// Currently behaves like `Single`
    Compare,
}

/// Cross-dataset reconciliation summary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconciledView {
    /// First-seen union of every dataset's headers
    pub all_headers: Vec<String>,
    /// Intersection across all datasets, ordered like the first dataset
    pub shared_headers: Vec<String>,
    /// Row count of the working set under the requested mode
    pub total_rows: usize,
    /// Serialized-size heuristic
    pub estimated_memory_mb: f64,
    pub schemas_by_id: HashMap<String, DatasetSchema>,
}

/// Suggested coordinate mapping for a fresh analysis.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoordinateCandidates {
    pub x: Option<String>,
    pub y: Option<String>,
    pub z: Option<String>,
}

/// Rows consulted when ranking numeric columns by variance.
pub const VARIANCE_SAMPLE_ROWS: usize = 100;

pub struct CollectionStore {
    datasets: HashMap<String, Dataset>,
    /// Dataset ids in insertion order
    order: Vec<String>,
    persistence: Arc<dyn PersistenceStore>,
    activity: Arc<ActivityLog>,
}

impl CollectionStore {
    pub fn new(persistence: Arc<dyn PersistenceStore>, activity: Arc<ActivityLog>) -> Self {
        Self {
            datasets: HashMap::new(),
            order: Vec::new(),
            persistence,
            activity,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn get(&self, id: &str) -> Option<&Dataset> {
        self.datasets.get(id)
    }

    /// Datasets in insertion order.
    pub fn get_all(&self) -> Vec<&Dataset> {
        self.order
            .iter()
            .filter_map(|id| self.datasets.get(id))
            .collect()
    }

    pub fn most_recent(&self) -> Option<&Dataset> {
        self.order.last().and_then(|id| self.datasets.get(id))
    }

    /// Admit a dataset. The write-through to the persistence collaborator is
    /// best-effort; a failure there is logged and the in-memory admission
    /// stands.
    pub async fn add(&mut self, dataset: Dataset) {
        let id = dataset.id.clone();
        let record = serde_json::to_value(&dataset).ok();

        if !self.datasets.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.datasets.insert(id.clone(), dataset);

        match record {
            Some(record) => {
                if let Err(e) = self.persistence.put(StoreCollection::Datasets, record).await {
                    warn!(dataset = %id, error = %e, "dataset write-through failed");
                    self.activity
                        .warn(format!("Could not persist dataset {id}: {e}"));
                }
            }
            None => {
                warn!(dataset = %id, "dataset could not be serialized for persistence");
            }
        }
    }

    /// Remove a dataset; returns whether it existed. Best-effort delete on
    /// the persistence side.
    pub async fn remove(&mut self, id: &str) -> bool {
        let existed = self.datasets.remove(id).is_some();
        self.order.retain(|entry| entry != id);

        if existed {
            if let Err(e) = self.persistence.delete(StoreCollection::Datasets, id).await {
                warn!(dataset = %id, error = %e, "dataset delete propagation failed");
                self.activity
                    .warn(format!("Could not delete persisted dataset {id}: {e}"));
            }
        }
        existed
    }

    /// Derive the working row set for a combination mode. Recomputed on
    /// demand, never stored.
    pub fn select_working_set(&self, mode: CombineMode) -> Vec<Row> {
        match mode {
            CombineMode::Single | CombineMode::Compare => self
                .most_recent()
                .map(|ds| ds.rows.clone())
                .unwrap_or_default(),
            CombineMode::Union => self
                .get_all()
                .iter()
                .flat_map(|ds| ds.rows.iter().cloned())
                .collect(),
        }
    }

    /// Reconcile the collection into shared/union header sets and a memory
    /// footprint estimate.
    pub fn reconcile(&self, mode: CombineMode) -> ReconciledView {
        let datasets = self.get_all();

        let all_headers: Vec<String> = datasets
            .iter()
            .flat_map(|ds| ds.headers.iter().cloned())
            .unique()
            .collect();

        let shared_headers: Vec<String> = match datasets.first() {
            Some(first) => first
                .headers
                .iter()
                .filter(|h| datasets.iter().all(|ds| ds.headers.contains(h)))
                .cloned()
                .collect(),
            None => Vec::new(),
        };

        let serialized_bytes: usize = datasets
            .iter()
            .map(|ds| {
                serde_json::to_string(&ds.rows)
                    .map(|s| s.len())
                    .unwrap_or(0)
            })
            .sum();

        let schemas_by_id = datasets
            .iter()
            .map(|ds| (ds.id.clone(), ds.schema.clone()))
            .collect();

        ReconciledView {
            all_headers,
            shared_headers,
            total_rows: self.select_working_set(mode).len(),
            estimated_memory_mb: serialized_bytes as f64 / (1024.0 * 1024.0),
            schemas_by_id,
        }
    }

    /// Suggest a coordinate mapping: X prefers temporal then categorical
    /// columns, Y is the numeric column with the largest variance over the
    /// first [`VARIANCE_SAMPLE_ROWS`] working rows (first-encountered wins a
    /// tie), Z is any other numeric column.
    pub fn coordinate_candidates(&self, mode: CombineMode) -> CoordinateCandidates {
        let recent = match self.most_recent() {
            Some(ds) => ds,
            None => {
                return CoordinateCandidates {
                    x: None,
                    y: None,
                    z: None,
                }
            }
        };
        let schema = &recent.schema;

        let x = schema
            .temporal
            .first()
            .or_else(|| schema.categorical.first())
            .or_else(|| recent.headers.first())
            .cloned();

        let working = self.select_working_set(mode);
        let sample = &working[..working.len().min(VARIANCE_SAMPLE_ROWS)];

        let mut y: Option<(&String, f64)> = None;
        for column in &schema.numerical {
            let variance = stats::compute_column_statistics(sample, column)
                .map(|s| s.variance)
                .unwrap_or(0.0);
            match y {
                Some((_, best)) if variance <= best => {}
                _ => y = Some((column, variance)),
            }
        }
        let y = y.map(|(column, _)| column.clone());

        let z = schema
            .numerical
            .iter()
            .find(|column| Some(column.as_str()) != y.as_deref())
            .cloned();

        CoordinateCandidates { x, y, z }
    }
}
