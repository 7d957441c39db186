//! Audit History - recency-ordered past results, lazily loaded from
//! persistence and cached for the session lifetime

use crate::activity::ActivityLog;
use crate::analysis::AnalysisResult;
use crate::persistence::{PersistenceStore, StoreCollection};
use std::sync::Arc;
use tracing::warn;

/// How many past results the delta comparison may consult. Storage itself
/// is unbounded.
pub const DELTA_HISTORY_DEPTH: usize = 5;

pub struct AuditHistory {
    persistence: Arc<dyn PersistenceStore>,
    activity: Arc<ActivityLog>,
    /// `None` until first loaded; newest first afterwards
    cache: Option<Vec<AnalysisResult>>,
}

impl AuditHistory {
    pub fn new(persistence: Arc<dyn PersistenceStore>, activity: Arc<ActivityLog>) -> Self {
        Self {
            persistence,
            activity,
            cache: None,
        }
    }

    /// Load the persisted history on first use. A persistence failure
    /// degrades to an empty history; the failure is logged, never surfaced.
    pub async fn ensure_loaded(&mut self) -> &[AnalysisResult] {
        if self.cache.is_none() {
            let loaded = match self.persistence.get_all(StoreCollection::Audits).await {
                Ok(records) => records
                    .into_iter()
                    .filter_map(|record| match serde_json::from_value(record) {
                        Ok(result) => Some(result),
                        Err(e) => {
                            warn!(error = %e, "skipping undecodable audit record");
                            None
                        }
                    })
                    .collect(),
                Err(e) => {
                    warn!(error = %e, "audit history load failed");
                    self.activity
                        .warn(format!("Could not load audit history: {e}"));
                    Vec::new()
                }
            };
            self.cache = Some(loaded);
        }
        self.cache.as_deref().unwrap_or_default()
    }

    /// The most recent prior result, if any.
    pub async fn latest(&mut self) -> Option<AnalysisResult> {
        self.ensure_loaded().await.first().cloned()
    }

    /// The consultable window for delta comparison, newest first.
    pub async fn recent(&mut self) -> Vec<AnalysisResult> {
        self.ensure_loaded()
            .await
            .iter()
            .take(DELTA_HISTORY_DEPTH)
            .cloned()
            .collect()
    }

    /// Prepend a freshly produced result unless the head already carries the
    /// same timestamp (guards duplicate insertion on retries). Requires the
    /// cache to be loaded, which every produced result already forced.
    pub async fn prepend_if_new(&mut self, result: &AnalysisResult) {
        self.ensure_loaded().await;
        let cache = self.cache.get_or_insert_with(Vec::new);
        if cache.first().map(|head| head.timestamp) != Some(result.timestamp) {
            cache.insert(0, result.clone());
        }
    }

    /// Number of cached results, loading first if needed.
    pub async fn len(&mut self) -> usize {
        self.ensure_loaded().await.len()
    }

    /// Drop the cached and the persisted history.
    pub async fn clear(&mut self) {
        let keys: Vec<String> = match self.persistence.get_all(StoreCollection::Audits).await {
            Ok(records) => records
                .iter()
                .filter_map(|r| crate::persistence::record_key(StoreCollection::Audits, r))
                .collect(),
            Err(e) => {
                warn!(error = %e, "audit history enumeration failed during clear");
                Vec::new()
            }
        };
        for key in keys {
            if let Err(e) = self
                .persistence
                .delete(StoreCollection::Audits, &key)
                .await
            {
                warn!(key = %key, error = %e, "audit record delete failed");
            }
        }
        self.cache = Some(Vec::new());
    }
}
