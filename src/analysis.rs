//! Analysis Result - the immutable record produced by one orchestrated
//! audit run

use crate::advisory::{AdvisoryEntry, ImpactEntry, Interpretation, NarrativeSection};
use crate::stats::{CategoryTotal, ColumnStatistics};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Percentage change of the main statistics against the most recent prior
/// result. Both components are `0.0` when no prior result exists.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Deltas {
    /// Change of the Y-column sum, percent
    pub volume_shift_pct: f64,
    /// Change of the Y-column max, percent
    pub peak_shift_pct: f64,
}

/// Percentage change from `prior` to `current`; `0.0` when there is no
/// usable baseline.
pub fn percent_change(current: f64, prior: f64) -> f64 {
    if prior == 0.0 {
        return 0.0;
    }
    ((current - prior) / prior) * 100.0
}

impl Deltas {
    /// Deltas of a fresh main-statistics record against a prior one.
    pub fn between(current: &ColumnStatistics, prior: &ColumnStatistics) -> Self {
        Self {
            volume_shift_pct: percent_change(current.sum, prior.sum),
            peak_shift_pct: percent_change(current.max, prior.max),
        }
    }
}

/// Everything one audit run produced. Created once, immutable thereafter;
/// superseded (never mutated) by the next run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Opaque unique token for this run
    pub track_id: String,

    /// Unix millis at completion
    pub timestamp: i64,

    /// Fingerprint of the working row set the run saw
    pub content_hash: String,

    pub chosen_x: String,
    pub chosen_y: String,

    /// Per-column statistics for every numeric column
    pub statistics_by_column: HashMap<String, ColumnStatistics>,

    /// Statistics of the chosen Y column
    pub main_statistics: ColumnStatistics,

    /// Pearson correlation between the chosen columns, -1..1
    pub correlation: f64,

    /// Metric summed per category, descending
    pub categorical_aggregation: Vec<CategoryTotal>,

    pub deltas: Deltas,
    pub interpretation: Interpretation,
    pub impact_matrix: Vec<ImpactEntry>,
    pub advisory: Vec<AdvisoryEntry>,
    pub narrative_sections: Vec<NarrativeSection>,
}

impl AnalysisResult {
    /// Top category of the aggregation, when one exists.
    pub fn top_category(&self) -> Option<&str> {
        self.categorical_aggregation.first().map(|c| c.key.as_str())
    }
}
