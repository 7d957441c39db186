//! Persistence collaborator - key-value store boundary for datasets, audit
//! results, and configuration
//!
//! The storage backend itself is external; this module only fixes the
//! contract and ships an in-memory reference implementation.

use crate::error::{EngineError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

/// The three record collections the engine persists into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreCollection {
    /// Keyed by `id`
    Datasets,
    /// Keyed by `timestamp`
    Audits,
    /// Keyed by `key`
    Config,
}

impl StoreCollection {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreCollection::Datasets => "datasets",
            StoreCollection::Audits => "audits",
            StoreCollection::Config => "config",
        }
    }

    /// Name of the field that keys records in this collection.
    pub fn key_field(&self) -> &'static str {
        match self {
            StoreCollection::Datasets => "id",
            StoreCollection::Audits => "timestamp",
            StoreCollection::Config => "key",
        }
    }
}

/// Extract the key a record is stored under in the given collection.
pub fn record_key(collection: StoreCollection, record: &Value) -> Option<String> {
    let field = record.get(collection.key_field())?;
    match field {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// External key-value persistence capability.
///
/// Failures from any of these operations are treated as best-effort cache
/// misses by the engine: logged and swallowed, never allowed to corrupt the
/// in-memory state they accompanied.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn put(&self, collection: StoreCollection, record: Value) -> Result<()>;

    /// Fetch every record in a collection. `Audits` must come back ordered by
    /// timestamp descending (newest first).
    async fn get_all(&self, collection: StoreCollection) -> Result<Vec<Value>>;

    async fn delete(&self, collection: StoreCollection, key: &str) -> Result<()>;

    /// Drop every record in every collection.
    async fn clear(&self) -> Result<()>;
}

/// In-memory reference implementation backing tests and headless sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    datasets: DashMap<String, Value>,
    audits: DashMap<String, Value>,
    config: DashMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, collection: StoreCollection) -> &DashMap<String, Value> {
        match collection {
            StoreCollection::Datasets => &self.datasets,
            StoreCollection::Audits => &self.audits,
            StoreCollection::Config => &self.config,
        }
    }
}

#[async_trait]
impl PersistenceStore for MemoryStore {
    async fn put(&self, collection: StoreCollection, record: Value) -> Result<()> {
        let key = record_key(collection, &record).ok_or_else(|| {
            EngineError::Persistence(format!(
                "record for '{}' lacks its '{}' key field",
                collection.as_str(),
                collection.key_field()
            ))
        })?;
        self.map(collection).insert(key, record);
        Ok(())
    }

    async fn get_all(&self, collection: StoreCollection) -> Result<Vec<Value>> {
        let mut records: Vec<Value> = self
            .map(collection)
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        match collection {
            StoreCollection::Audits => {
                // Newest first, per the retrieval contract.
                records.sort_by_key(|r| {
                    std::cmp::Reverse(r.get("timestamp").and_then(Value::as_i64).unwrap_or(0))
                });
            }
            _ => {
                records.sort_by_key(|r| record_key(collection, r).unwrap_or_default());
            }
        }

        Ok(records)
    }

    async fn delete(&self, collection: StoreCollection, key: &str) -> Result<()> {
        self.map(collection).remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.datasets.clear();
        self.audits.clear();
        self.config.clear();
        Ok(())
    }
}
