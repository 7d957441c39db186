//! Statistics Engine - descriptive statistics, Pearson correlation,
//! categorical aggregation, and the row-set content fingerprint

use crate::dataset::Row;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

lazy_static! {
    /// Everything that is not a digit, a decimal point, or a minus sign.
    static ref NON_NUMERIC: Regex = Regex::new(r"[^0-9.\-]+").unwrap();
}

/// Descriptive statistics for one numeric column over a working row set.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ColumnStatistics {
    /// Number of rows carrying the column (coerced values, see [`coerce_numeric`])
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    pub median: f64,
    pub variance: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
}

/// One aggregated category bucket: key plus summed metric.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CategoryTotal {
    pub key: String,
    pub total: f64,
}

/// Coerce a cell value to a number.
///
/// A direct float parse wins; otherwise every character except digits, `.`
/// and `-` is stripped and the remainder parsed. Anything still unparseable
/// coerces to `0.0`.
///
/// Known quirk carried over from the source system: a genuinely non-numeric
/// cell silently contributes a zero, so it inflates `count` without
/// inflating `sum`. Callers that need a stricter reading must filter before
/// coercing.
pub fn coerce_numeric(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if let Ok(v) = trimmed.parse::<f64>() {
        if v.is_finite() {
            return v;
        }
    }

    let stripped = NON_NUMERIC.replace_all(trimmed, "");
    stripped
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Whether a cell value survives coercion without falling back to zero,
/// i.e. it genuinely looks numeric after stripping.
pub fn is_numeric_like(raw: &str) -> bool {
    let stripped = NON_NUMERIC.replace_all(raw.trim(), "");
    !stripped.is_empty()
        && stripped
            .parse::<f64>()
            .map(|v| v.is_finite())
            .unwrap_or(false)
}

/// Full descriptive statistics for `column`, or `None` when no row carries
/// the column at all. Variance is the population variance.
pub fn compute_column_statistics(rows: &[Row], column: &str) -> Option<ColumnStatistics> {
    let values: Vec<f64> = rows
        .iter()
        .filter_map(|row| row.get(column))
        .map(|v| coerce_numeric(v))
        .collect();

    if values.is_empty() {
        return None;
    }

    let count = values.len();
    let n = count as f64;
    let sum: f64 = values.iter().sum();
    let mean = sum / n;

    let mut sorted = values.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let median = if count % 2 == 0 {
        (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
    } else {
        sorted[count / 2]
    };

    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();
    let min = sorted[0];
    let max = sorted[count - 1];

    Some(ColumnStatistics {
        count,
        sum,
        mean,
        median,
        variance,
        std_dev,
        min,
        max,
        range: max - min,
    })
}

/// Pearson product-moment correlation between two columns.
///
/// Returns exactly `0.0` for fewer than 2 rows and whenever either column
/// has zero variance; never raises a division error. Symmetric in `x`/`y`.
pub fn correlation(rows: &[Row], x: &str, y: &str) -> f64 {
    if rows.len() < 2 {
        return 0.0;
    }

    let n = rows.len() as f64;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_x2 = 0.0;
    let mut sum_y2 = 0.0;

    for row in rows {
        let xv = coerce_numeric(row.get(x).map(String::as_str).unwrap_or(""));
        let yv = coerce_numeric(row.get(y).map(String::as_str).unwrap_or(""));
        sum_x += xv;
        sum_y += yv;
        sum_xy += xv * yv;
        sum_x2 += xv * xv;
        sum_y2 += yv * yv;
    }

    let var_x = n * sum_x2 - sum_x * sum_x;
    let var_y = n * sum_y2 - sum_y * sum_y;
    if var_x <= 0.0 || var_y <= 0.0 {
        return 0.0;
    }

    (n * sum_xy - sum_x * sum_y) / (var_x * var_y).sqrt()
}

/// Sum `metric` per distinct `category` value, descending by total.
///
/// Keys are trimmed; rows whose key is empty or case-insensitively `"null"`
/// are excluded entirely. Ties keep encounter order (the sort is stable).
pub fn categorical_aggregation(rows: &[Row], category: &str, metric: &str) -> Vec<CategoryTotal> {
    let mut totals: Vec<CategoryTotal> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let key = row.get(category).map(|v| v.trim()).unwrap_or("");
        if key.is_empty() || key.eq_ignore_ascii_case("null") {
            continue;
        }

        let value = coerce_numeric(row.get(metric).map(String::as_str).unwrap_or(""));
        match index.get(key) {
            Some(&pos) => totals[pos].total += value,
            None => {
                index.insert(key.to_string(), totals.len());
                totals.push(CategoryTotal {
                    key: key.to_string(),
                    total: value,
                });
            }
        }
    }

    totals.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(Ordering::Equal));
    totals
}

/// Cheap deterministic fingerprint of a row set, used only as a
/// "did anything change" signal between runs. A 32-bit rolling hash of the
/// canonical serialization; collisions are tolerated.
pub fn content_hash(rows: &[Row]) -> String {
    let canonical: Vec<BTreeMap<&String, &String>> =
        rows.iter().map(|row| row.iter().collect()).collect();
    let serialized = serde_json::to_string(&canonical).unwrap_or_default();

    let mut hash: i32 = 0;
    for byte in serialized.bytes() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(byte as i32);
    }
    format!("{:08x}", hash as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn revenue_rows(values: &[&str]) -> Vec<Row> {
        values.iter().map(|v| row(&[("revenue", v)])).collect()
    }

    #[test]
    fn coercion_strips_currency_formatting() {
        assert_eq!(coerce_numeric("$1,234.56"), 1234.56);
        assert_eq!(coerce_numeric("  42 "), 42.0);
        assert_eq!(coerce_numeric("-7"), -7.0);
    }

    #[test]
    fn coercion_defaults_unparseable_to_zero() {
        assert_eq!(coerce_numeric("n/a"), 0.0);
        assert_eq!(coerce_numeric(""), 0.0);
        assert_eq!(coerce_numeric("--"), 0.0);
    }

    #[test]
    fn non_numeric_cells_inflate_count_but_not_sum() {
        let rows = revenue_rows(&["10", "garbage", "20"]);
        let stats = compute_column_statistics(&rows, "revenue").unwrap();

        assert_eq!(stats.count, 3);
        assert_eq!(stats.sum, 30.0);
        assert_eq!(stats.min, 0.0);
    }

    #[test]
    fn statistics_ordering_invariants() {
        let rows = revenue_rows(&["5", "1", "9", "3", "7"]);
        let stats = compute_column_statistics(&rows, "revenue").unwrap();

        assert!(stats.min <= stats.median && stats.median <= stats.max);
        assert_eq!(stats.range, stats.max - stats.min);
        assert!(stats.std_dev >= 0.0);
        assert_eq!(stats.count, rows.len());
        assert_eq!(stats.median, 5.0);
    }

    #[test]
    fn even_length_median_averages_midpoints() {
        let rows = revenue_rows(&["1", "2", "3", "4"]);
        let stats = compute_column_statistics(&rows, "revenue").unwrap();
        assert_eq!(stats.median, 2.5);
    }

    #[test]
    fn missing_column_yields_none() {
        let rows = revenue_rows(&["1", "2"]);
        assert!(compute_column_statistics(&rows, "absent").is_none());
        assert!(compute_column_statistics(&[], "revenue").is_none());
    }

    #[test]
    fn correlation_is_symmetric() {
        let rows = vec![
            row(&[("a", "1"), ("b", "2")]),
            row(&[("a", "2"), ("b", "4")]),
            row(&[("a", "3"), ("b", "5")]),
        ];
        let ab = correlation(&rows, "a", "b");
        let ba = correlation(&rows, "b", "a");
        assert_eq!(ab, ba);
        assert!(ab > 0.9);
    }

    #[test]
    fn correlation_zero_cases() {
        let one = vec![row(&[("a", "1"), ("b", "2")])];
        assert_eq!(correlation(&one, "a", "b"), 0.0);
        assert_eq!(correlation(&[], "a", "b"), 0.0);

        let constant = vec![
            row(&[("a", "5"), ("b", "1")]),
            row(&[("a", "5"), ("b", "2")]),
        ];
        assert_eq!(correlation(&constant, "a", "b"), 0.0);
    }

    #[test]
    fn perfect_linear_correlation() {
        let rows: Vec<Row> = (1..=10)
            .map(|i| row(&[("a", &i.to_string()), ("b", &(i * 3).to_string())]))
            .collect();
        let r = correlation(&rows, "a", "b");
        assert!((r - 1.0).abs() < 1e-9);
    }

    #[test]
    fn aggregation_sorts_descending_and_excludes_null_keys() {
        let rows = vec![
            row(&[("region", "East"), ("revenue", "10")]),
            row(&[("region", "West"), ("revenue", "50")]),
            row(&[("region", "East"), ("revenue", "15")]),
            row(&[("region", ""), ("revenue", "100")]),
            row(&[("region", "NULL"), ("revenue", "100")]),
            row(&[("region", "null"), ("revenue", "100")]),
        ];

        let agg = categorical_aggregation(&rows, "region", "revenue");
        assert_eq!(agg.len(), 2);
        assert_eq!(agg[0].key, "West");
        assert_eq!(agg[0].total, 50.0);
        assert_eq!(agg[1].key, "East");
        assert_eq!(agg[1].total, 25.0);

        let total: f64 = agg.iter().map(|c| c.total).sum();
        assert_eq!(total, 75.0);
    }

    #[test]
    fn aggregation_ties_keep_encounter_order() {
        let rows = vec![
            row(&[("region", "North"), ("revenue", "30")]),
            row(&[("region", "South"), ("revenue", "30")]),
        ];
        let agg = categorical_aggregation(&rows, "region", "revenue");
        assert_eq!(agg[0].key, "North");
        assert_eq!(agg[1].key, "South");
    }

    #[test]
    fn content_hash_is_stable_and_change_sensitive() {
        let rows = vec![row(&[("a", "1")]), row(&[("a", "2")])];
        let again = vec![row(&[("a", "1")]), row(&[("a", "2")])];
        assert_eq!(content_hash(&rows), content_hash(&again));

        let changed = vec![row(&[("a", "1")]), row(&[("a", "3")])];
        assert_ne!(content_hash(&rows), content_hash(&changed));
    }
}
