//! Advisory/Interpretation Engine - threshold rules over statistics,
//! correlation, and deltas producing operational labels, an impact matrix,
//! and prioritized recommendations

use crate::analysis::Deltas;
use crate::stats::ColumnStatistics;
use serde::{Deserialize, Serialize};
use std::fmt;

// Interpretation thresholds. Fixed values; downstream consumers assert on
// them literally.
pub const CONCENTRATION_DOMINANT_PCT: f64 = 50.0;
pub const CONCENTRATION_RISK_PCT: f64 = 40.0;
pub const STEADY_SHIFT_LIMIT_PCT: f64 = 10.0;
pub const EFFICIENCY_CV_LIMIT: f64 = 0.5;
pub const DOMINANCE_PEAK_MULTIPLIER: f64 = 5.0;
pub const STABILITY_CV_CRITICAL: f64 = 0.8;
pub const CORRELATION_LOCK_LIMIT: f64 = 0.7;
pub const MONITOR_SHIFT_LIMIT_PCT: f64 = 15.0;
pub const REDUCE_CV_LIMIT: f64 = 1.2;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImpactSeverity {
    Critical,
    High,
    Medium,
    Stable,
    Weak,
}

impl fmt::Display for ImpactSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ImpactSeverity::Critical => "Critical",
            ImpactSeverity::High => "High",
            ImpactSeverity::Medium => "Medium",
            ImpactSeverity::Stable => "Stable",
            ImpactSeverity::Weak => "Weak",
        };
        write!(f, "{label}")
    }
}

/// One dimension of the fixed three-entry impact matrix.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImpactEntry {
    pub label: String,
    pub severity: ImpactSeverity,
    /// Human-readable detail interpolating the live numbers
    pub detail: String,
    /// Description of the threshold that governs this dimension
    pub trigger: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum AdvisoryAction {
    Diversify,
    Monitor,
    Reduce,
    Maintain,
}

impl fmt::Display for AdvisoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AdvisoryAction::Diversify => "DIVERSIFY",
            AdvisoryAction::Monitor => "MONITOR",
            AdvisoryAction::Reduce => "REDUCE",
            AdvisoryAction::Maintain => "MAINTAIN",
        };
        write!(f, "{label}")
    }
}

/// One threshold-triggered recommendation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdvisoryEntry {
    pub action: AdvisoryAction,
    /// The metric the action targets
    pub metric: String,
    /// Explanatory text
    pub context: String,
}

/// Operational-state labels derived from the thresholds above.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Interpretation {
    pub operational_state: String,
    pub concentration_risk: String,
    pub stability_assessment: String,
    pub efficiency_observation: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NarrativeSection {
    pub title: String,
    pub content: String,
}

/// Output of one interpretation pass.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Assessment {
    pub interpretation: Interpretation,
    pub impact_matrix: Vec<ImpactEntry>,
    pub advisory: Vec<AdvisoryEntry>,
}

/// Share of the total attributable to the single largest value, as a
/// percentage. A zero sum falls back to a denominator of 1.
pub fn concentration_pct(stats: &ColumnStatistics) -> f64 {
    let denominator = if stats.sum == 0.0 { 1.0 } else { stats.sum };
    (stats.max / denominator) * 100.0
}

fn coefficient_of_variation(stats: &ColumnStatistics) -> f64 {
    let denominator = if stats.mean == 0.0 { 1.0 } else { stats.mean };
    stats.std_dev / denominator
}

/// Convert statistics, correlation, and prior-run deltas into labels, the
/// impact matrix, and the advisory list. Pure; no side effects.
pub fn interpret(
    stats: &ColumnStatistics,
    correlation: f64,
    deltas: &Deltas,
    label_x: &str,
    label_y: &str,
    top_category: Option<&str>,
) -> Assessment {
    let concentration = concentration_pct(stats);
    let cv = coefficient_of_variation(stats);

    let interpretation = Interpretation {
        operational_state: if concentration > CONCENTRATION_DOMINANT_PCT {
            "Highly Concentrated".to_string()
        } else {
            "Balanced".to_string()
        },
        concentration_risk: if concentration > CONCENTRATION_RISK_PCT {
            "Critical Dependency".to_string()
        } else {
            "Stable Diversification".to_string()
        },
        stability_assessment: if deltas.volume_shift_pct.abs() < STEADY_SHIFT_LIMIT_PCT {
            "Steady Flow".to_string()
        } else {
            "Volatile Movement".to_string()
        },
        efficiency_observation: if cv < EFFICIENCY_CV_LIMIT {
            "Precise Operations".to_string()
        } else {
            "Dispersed Performance".to_string()
        },
    };

    let top = top_category.unwrap_or("the leading segment");
    let impact_matrix = vec![
        ImpactEntry {
            label: "Category Dominance".to_string(),
            severity: if stats.max > stats.mean * DOMINANCE_PEAK_MULTIPLIER {
                ImpactSeverity::High
            } else {
                ImpactSeverity::Medium
            },
            detail: format!(
                "Peak {label_y} of {:.2} against a mean of {:.2}; {top} accounts for {:.1}% of the total.",
                stats.max, stats.mean, concentration
            ),
            trigger: "concentration > 40%".to_string(),
        },
        ImpactEntry {
            label: "Distribution Stability".to_string(),
            severity: if cv.abs() > STABILITY_CV_CRITICAL {
                ImpactSeverity::Critical
            } else {
                ImpactSeverity::Stable
            },
            detail: format!(
                "Standard deviation {:.2} against a mean of {:.2} (ratio {:.2}).",
                stats.std_dev, stats.mean, cv
            ),
            trigger: "variance within threshold".to_string(),
        },
        ImpactEntry {
            label: "Relational Lock".to_string(),
            severity: if correlation.abs() > CORRELATION_LOCK_LIMIT {
                ImpactSeverity::Critical
            } else {
                ImpactSeverity::Weak
            },
            detail: format!(
                "Correlation between {label_x} and {label_y} measured at {:.2}.",
                correlation
            ),
            trigger: "correlation > 0.7".to_string(),
        },
    ];

    // Rules are independent and accumulate; MAINTAIN only when none fired.
    let mut advisory = Vec::new();
    if concentration > CONCENTRATION_RISK_PCT {
        advisory.push(AdvisoryEntry {
            action: AdvisoryAction::Diversify,
            metric: label_y.to_string(),
            context: format!(
                "{top} holds {:.1}% of total {label_y}; spread exposure across additional segments.",
                concentration
            ),
        });
    }
    if deltas.volume_shift_pct.abs() > MONITOR_SHIFT_LIMIT_PCT {
        advisory.push(AdvisoryEntry {
            action: AdvisoryAction::Monitor,
            metric: label_y.to_string(),
            context: format!(
                "Total {label_y} shifted {:.1}% against the previous audit; watch the trend before committing changes.",
                deltas.volume_shift_pct
            ),
        });
    }
    if cv > REDUCE_CV_LIMIT {
        advisory.push(AdvisoryEntry {
            action: AdvisoryAction::Reduce,
            metric: label_y.to_string(),
            context: format!(
                "Dispersion is high (standard deviation {:.2} vs mean {:.2}); tighten variance in {label_y}.",
                stats.std_dev, stats.mean
            ),
        });
    }
    if advisory.is_empty() {
        advisory.push(AdvisoryEntry {
            action: AdvisoryAction::Maintain,
            metric: label_y.to_string(),
            context: "Indicators within thresholds; maintain the current baseline and re-audit on the next cycle.".to_string(),
        });
    }

    Assessment {
        interpretation,
        impact_matrix,
        advisory,
    }
}

/// Assemble the ordered report prose for one assessment.
pub fn build_narrative(
    assessment: &Assessment,
    stats: &ColumnStatistics,
    label_x: &str,
    label_y: &str,
    top_category: Option<&str>,
) -> Vec<NarrativeSection> {
    let interp = &assessment.interpretation;
    let top = top_category.unwrap_or("the leading segment");
    let actions = assessment
        .advisory
        .iter()
        .map(|a| format!("{} {}", a.action, a.metric))
        .collect::<Vec<_>>()
        .join("; ");

    vec![
        NarrativeSection {
            title: "Executive Summary".to_string(),
            content: format!(
                "Across {} observed rows, {label_y} totals {:.2} with a mean of {:.2}. The operation reads as {} with {}.",
                stats.count, stats.sum, stats.mean,
                interp.operational_state.to_lowercase(),
                interp.concentration_risk.to_lowercase()
            ),
        },
        NarrativeSection {
            title: "Concentration Profile".to_string(),
            content: format!(
                "{top} leads {label_y} grouped by {label_x}, with the peak value reaching {:.1}% of the total.",
                concentration_pct(stats)
            ),
        },
        NarrativeSection {
            title: "Stability Outlook".to_string(),
            content: format!(
                "{}; {}.",
                interp.stability_assessment, interp.efficiency_observation
            ),
        },
        NarrativeSection {
            title: "Recommended Actions".to_string(),
            content: actions,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(count: usize, sum: f64, mean: f64, std_dev: f64, max: f64) -> ColumnStatistics {
        ColumnStatistics {
            count,
            sum,
            mean,
            median: mean,
            variance: std_dev * std_dev,
            std_dev,
            min: 0.0,
            max,
            range: max,
        }
    }

    #[test]
    fn concentration_below_risk_threshold_does_not_diversify() {
        // mean=100, max=250, sum=1000 -> concentration = 25%
        let s = stats(10, 1000.0, 100.0, 10.0, 250.0);
        let assessment = interpret(&s, 0.0, &Deltas::default(), "region", "revenue", Some("East"));

        assert_eq!(concentration_pct(&s), 25.0);
        assert!(!assessment
            .advisory
            .iter()
            .any(|a| a.action == AdvisoryAction::Diversify));
        assert_eq!(assessment.interpretation.operational_state, "Balanced");
        assert_eq!(
            assessment.interpretation.concentration_risk,
            "Stable Diversification"
        );
    }

    #[test]
    fn concentration_at_fifty_percent_is_highly_concentrated() {
        // max=500, sum=1000 -> concentration = 50%: DIVERSIFY fires (50 > 40)
        // but the dominant label needs strictly more than 50.
        let s = stats(10, 1000.0, 100.0, 10.0, 500.0);
        let assessment = interpret(&s, 0.0, &Deltas::default(), "region", "revenue", Some("East"));

        assert_eq!(concentration_pct(&s), 50.0);
        assert!(assessment
            .advisory
            .iter()
            .any(|a| a.action == AdvisoryAction::Diversify));
        assert_eq!(assessment.interpretation.operational_state, "Balanced");

        let s = stats(10, 1000.0, 100.0, 10.0, 501.0);
        let assessment = interpret(&s, 0.0, &Deltas::default(), "region", "revenue", Some("East"));
        assert_eq!(
            assessment.interpretation.operational_state,
            "Highly Concentrated"
        );
    }

    #[test]
    fn zero_sum_guard_uses_unit_denominator() {
        let s = stats(3, 0.0, 0.0, 0.0, 0.0);
        assert_eq!(concentration_pct(&s), 0.0);
        // Must not panic or produce NaN anywhere downstream.
        let assessment = interpret(&s, 0.0, &Deltas::default(), "x", "y", None);
        assert_eq!(assessment.impact_matrix.len(), 3);
    }

    #[test]
    fn monitor_fires_above_fifteen_percent_shift() {
        let s = stats(10, 1000.0, 100.0, 10.0, 100.0);
        let deltas = Deltas {
            volume_shift_pct: -16.0,
            peak_shift_pct: 0.0,
        };
        let assessment = interpret(&s, 0.0, &deltas, "region", "revenue", None);

        assert!(assessment
            .advisory
            .iter()
            .any(|a| a.action == AdvisoryAction::Monitor));
        assert_eq!(
            assessment.interpretation.stability_assessment,
            "Volatile Movement"
        );

        let calm = Deltas {
            volume_shift_pct: 9.9,
            peak_shift_pct: 0.0,
        };
        let assessment = interpret(&s, 0.0, &calm, "region", "revenue", None);
        assert!(!assessment
            .advisory
            .iter()
            .any(|a| a.action == AdvisoryAction::Monitor));
        assert_eq!(assessment.interpretation.stability_assessment, "Steady Flow");
    }

    #[test]
    fn reduce_fires_above_dispersion_limit() {
        let s = stats(10, 1000.0, 100.0, 121.0, 100.0);
        let assessment = interpret(&s, 0.0, &Deltas::default(), "region", "revenue", None);
        assert!(assessment
            .advisory
            .iter()
            .any(|a| a.action == AdvisoryAction::Reduce));

        let s = stats(10, 1000.0, 100.0, 119.0, 100.0);
        let assessment = interpret(&s, 0.0, &Deltas::default(), "region", "revenue", None);
        assert!(!assessment
            .advisory
            .iter()
            .any(|a| a.action == AdvisoryAction::Reduce));
    }

    #[test]
    fn maintain_is_the_sole_fallback() {
        let s = stats(10, 1000.0, 100.0, 10.0, 100.0);
        let assessment = interpret(&s, 0.0, &Deltas::default(), "region", "revenue", None);

        assert_eq!(assessment.advisory.len(), 1);
        assert_eq!(assessment.advisory[0].action, AdvisoryAction::Maintain);
    }

    #[test]
    fn rules_accumulate_independently() {
        // concentration 60%, shift 20%, cv 1.5 -> all three fire, no MAINTAIN.
        let s = stats(10, 1000.0, 100.0, 150.0, 600.0);
        let deltas = Deltas {
            volume_shift_pct: 20.0,
            peak_shift_pct: 0.0,
        };
        let assessment = interpret(&s, 0.0, &deltas, "region", "revenue", Some("East"));

        let actions: Vec<AdvisoryAction> = assessment.advisory.iter().map(|a| a.action).collect();
        assert_eq!(
            actions,
            vec![
                AdvisoryAction::Diversify,
                AdvisoryAction::Monitor,
                AdvisoryAction::Reduce
            ]
        );
    }

    #[test]
    fn impact_matrix_severities() {
        // max > mean*5 -> High dominance; cv > 0.8 -> Critical stability;
        // |corr| > 0.7 -> Critical relational lock.
        let s = stats(10, 1000.0, 100.0, 90.0, 600.0);
        let assessment = interpret(&s, -0.75, &Deltas::default(), "region", "revenue", None);

        assert_eq!(assessment.impact_matrix.len(), 3);
        assert_eq!(assessment.impact_matrix[0].severity, ImpactSeverity::High);
        assert_eq!(assessment.impact_matrix[1].severity, ImpactSeverity::Critical);
        assert_eq!(assessment.impact_matrix[2].severity, ImpactSeverity::Critical);

        let s = stats(10, 1000.0, 100.0, 10.0, 200.0);
        let assessment = interpret(&s, 0.3, &Deltas::default(), "region", "revenue", None);
        assert_eq!(assessment.impact_matrix[0].severity, ImpactSeverity::Medium);
        assert_eq!(assessment.impact_matrix[1].severity, ImpactSeverity::Stable);
        assert_eq!(assessment.impact_matrix[2].severity, ImpactSeverity::Weak);
    }

    #[test]
    fn diversify_context_references_top_category() {
        let s = stats(10, 1000.0, 100.0, 10.0, 600.0);
        let assessment = interpret(&s, 0.0, &Deltas::default(), "region", "revenue", Some("East"));
        let diversify = assessment
            .advisory
            .iter()
            .find(|a| a.action == AdvisoryAction::Diversify)
            .unwrap();
        assert!(diversify.context.contains("East"));
    }

    #[test]
    fn narrative_has_four_ordered_sections() {
        let s = stats(10, 1000.0, 100.0, 10.0, 600.0);
        let assessment = interpret(&s, 0.0, &Deltas::default(), "region", "revenue", Some("East"));
        let narrative = build_narrative(&assessment, &s, "region", "revenue", Some("East"));

        let titles: Vec<&str> = narrative.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Executive Summary",
                "Concentration Profile",
                "Stability Outlook",
                "Recommended Actions"
            ]
        );
        assert!(narrative[1].content.contains("East"));
        assert!(narrative[3].content.contains("DIVERSIFY"));
    }
}
