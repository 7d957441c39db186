//! Export surface - completeness-gated assembly of a standalone printable
//! report

use crate::analysis::AnalysisResult;
use crate::error::{EngineError, Result};
use crate::render::ChartSnapshot;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A finished, self-contained report ready for printing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportDocument {
    pub title: String,
    /// Unix millis
    pub generated_at: i64,
    pub result: AnalysisResult,
    pub snapshot: ChartSnapshot,
}

/// The pieces a result must carry before a report may be produced. An
/// incomplete result blocks the export with a user-visible reason, it never
/// crashes.
pub fn completeness_gaps(
    result: &AnalysisResult,
    snapshot: Option<&ChartSnapshot>,
) -> Vec<&'static str> {
    let mut gaps = Vec::new();
    if result.narrative_sections.is_empty() {
        gaps.push("narrative sections");
    }
    if result.statistics_by_column.is_empty() {
        gaps.push("statistics model");
    }
    if snapshot.is_none() {
        gaps.push("chart snapshot");
    }
    if result.impact_matrix.is_empty() {
        gaps.push("impact matrix entries");
    }
    if result.advisory.is_empty() {
        gaps.push("advisory list");
    }
    gaps
}

/// Build the printable report, or fail with `ExportBlocked` naming every
/// missing piece.
pub fn build_report(
    result: &AnalysisResult,
    snapshot: Option<ChartSnapshot>,
) -> Result<ReportDocument> {
    let gaps = completeness_gaps(result, snapshot.as_ref());
    let snapshot = match (gaps.is_empty(), snapshot) {
        (true, Some(snapshot)) => snapshot,
        _ => return Err(EngineError::ExportBlocked(gaps.join(", "))),
    };

    Ok(ReportDocument {
        title: format!("Audit Report: {} by {}", result.chosen_y, result.chosen_x),
        generated_at: Utc::now().timestamp_millis(),
        result: result.clone(),
        snapshot,
    })
}

impl ReportDocument {
    /// Render the report as a minimal standalone printable HTML document.
    pub fn to_html(&self) -> String {
        let result = &self.result;
        let mut body = String::new();

        for section in &result.narrative_sections {
            body.push_str(&format!(
                "<section><h2>{}</h2><p>{}</p></section>\n",
                section.title, section.content
            ));
        }

        body.push_str("<section><h2>Impact Matrix</h2><ul>\n");
        for entry in &result.impact_matrix {
            body.push_str(&format!(
                "<li><strong>{}</strong> [{}]: {}</li>\n",
                entry.label, entry.severity, entry.detail
            ));
        }
        body.push_str("</ul></section>\n");

        body.push_str("<section><h2>Advisory</h2><ol>\n");
        for entry in &result.advisory {
            body.push_str(&format!(
                "<li><strong>{}</strong> {}: {}</li>\n",
                entry.action, entry.metric, entry.context
            ));
        }
        body.push_str("</ol></section>\n");

        let stats = &result.main_statistics;
        body.push_str(&format!(
            "<section><h2>Key Figures</h2><table>\
             <tr><td>Rows</td><td>{}</td></tr>\
             <tr><td>Total</td><td>{:.2}</td></tr>\
             <tr><td>Mean</td><td>{:.2}</td></tr>\
             <tr><td>Median</td><td>{:.2}</td></tr>\
             <tr><td>Std Dev</td><td>{:.2}</td></tr>\
             <tr><td>Range</td><td>{:.2}</td></tr>\
             </table></section>\n",
            stats.count, stats.sum, stats.mean, stats.median, stats.std_dev, stats.range
        ));

        body.push_str(&format!(
            "<section><h2>Chart</h2><img alt=\"chart\" src=\"data:{};base64,{}\"/></section>\n",
            self.snapshot.mime_type, self.snapshot.data_base64
        ));

        format!(
            "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n<h1>{}</h1>\n{}</body></html>\n",
            self.title, self.title, body
        )
    }
}
