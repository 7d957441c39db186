//! Computation capability - one analysis pass over a working row set,
//! runnable in-process or on a background blocking task

use crate::dataset::Row;
use crate::error::{EngineError, Result};
use crate::stats::{self, CategoryTotal, ColumnStatistics};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Input for one analysis pass.
#[derive(Clone, Debug)]
pub struct ComputationInput {
    pub rows: Vec<Row>,
    pub chosen_x: String,
    pub chosen_y: String,
    /// Numeric columns to compute statistics for
    pub numeric_columns: Vec<String>,
}

/// Raw numeric output of one analysis pass, before interpretation.
#[derive(Clone, Debug)]
pub struct ComputationOutput {
    pub statistics_by_column: HashMap<String, ColumnStatistics>,
    pub main_statistics: ColumnStatistics,
    pub correlation: f64,
    pub categorical_aggregation: Vec<CategoryTotal>,
    pub content_hash: String,
}

/// Synchronous analysis pass shared by every [`Computation`] implementation
/// and by the timeout fallback path.
pub fn compute(input: &ComputationInput) -> Result<ComputationOutput> {
    let mut statistics_by_column = HashMap::new();
    for column in &input.numeric_columns {
        if let Some(column_stats) = stats::compute_column_statistics(&input.rows, column) {
            statistics_by_column.insert(column.clone(), column_stats);
        }
    }

    let main_statistics = statistics_by_column
        .get(&input.chosen_y)
        .cloned()
        .or_else(|| stats::compute_column_statistics(&input.rows, &input.chosen_y))
        .ok_or_else(|| {
            EngineError::Computation(format!(
                "no coercible values in Y column '{}'",
                input.chosen_y
            ))
        })?;

    Ok(ComputationOutput {
        correlation: stats::correlation(&input.rows, &input.chosen_x, &input.chosen_y),
        categorical_aggregation: stats::categorical_aggregation(
            &input.rows,
            &input.chosen_x,
            &input.chosen_y,
        ),
        content_hash: stats::content_hash(&input.rows),
        statistics_by_column,
        main_statistics,
    })
}

/// Where an analysis pass executes. The orchestrator depends only on this
/// interface and races it against a timer.
#[async_trait]
pub trait Computation: Send + Sync {
    async fn run(&self, input: ComputationInput) -> Result<ComputationOutput>;

    /// Advisory only: a timed-out run is abandoned, not interrupted.
    fn cancel(&self);
}

/// Runs the pass inline on the calling task.
pub struct InProcessComputation;

#[async_trait]
impl Computation for InProcessComputation {
    async fn run(&self, input: ComputationInput) -> Result<ComputationOutput> {
        compute(&input)
    }

    fn cancel(&self) {}
}

/// Offloads the pass to the blocking thread pool.
#[derive(Default)]
pub struct BackgroundComputation {
    cancelled: AtomicBool,
}

impl BackgroundComputation {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Computation for BackgroundComputation {
    async fn run(&self, input: ComputationInput) -> Result<ComputationOutput> {
        if self.cancelled.swap(false, Ordering::SeqCst) {
            return Err(EngineError::Computation(
                "background computation cancelled before start".to_string(),
            ));
        }

        tokio::task::spawn_blocking(move || compute(&input))
            .await
            .map_err(|e| EngineError::Computation(format!("background task failed: {e}")))?
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}
