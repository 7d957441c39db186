//! Rendering collaborator - consumes finished results, hands snapshot
//! images back to the export flow

use crate::analysis::AnalysisResult;
use crate::dataset::Row;
use serde::{Deserialize, Serialize};

/// A captured image of a rendered chart.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChartSnapshot {
    pub mime_type: String,
    pub data_base64: String,
}

/// The rendering layer. Chart and table construction happen outside the
/// engine; the engine only pushes results in and pulls snapshots out.
pub trait Renderer: Send + Sync {
    fn render(&self, result: &AnalysisResult, rows: &[Row]);

    /// Snapshot of the most recently rendered chart, when one exists.
    fn chart_snapshot(&self) -> Option<ChartSnapshot>;
}

/// Headless renderer: renders nothing and never has a snapshot.
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render(&self, _result: &AnalysisResult, _rows: &[Row]) {}

    fn chart_snapshot(&self) -> Option<ChartSnapshot> {
        None
    }
}
