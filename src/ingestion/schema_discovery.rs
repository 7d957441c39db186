//! Schema Discovery - deterministic column classification by sampling

use crate::dataset::{DatasetSchema, Row};
use crate::stats::is_numeric_like;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// How many rows each column samples during classification.
pub const SCHEMA_SAMPLE_ROWS: usize = 10;

/// Minimum length a value must have to qualify as a date. Filters out
/// short tokens like "1/2" that would otherwise parse.
const TEMPORAL_MIN_LEN: usize = 5;

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%b %d, %Y",
    "%d %b %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Whether a trimmed value parses as a calendar date in any accepted shape.
pub fn parses_as_date(value: &str) -> bool {
    if DateTime::parse_from_rfc3339(value).is_ok() {
        return true;
    }
    if DATE_FORMATS
        .iter()
        .any(|fmt| NaiveDate::parse_from_str(value, fmt).is_ok())
    {
        return true;
    }
    DATETIME_FORMATS
        .iter()
        .any(|fmt| NaiveDateTime::parse_from_str(value, fmt).is_ok())
}

/// Classify every header into numeric, temporal, or categorical.
///
/// Each column samples its first [`SCHEMA_SAMPLE_ROWS`] non-empty values:
/// numeric when every sample coerces to a finite number, else temporal when
/// every sample parses as a date longer than 5 characters, else
/// categorical. Columns with no sampled values default to categorical.
pub fn discover_schema(headers: &[String], rows: &[Row]) -> DatasetSchema {
    let mut schema = DatasetSchema::default();

    for header in headers {
        let sample: Vec<&str> = rows
            .iter()
            .take(SCHEMA_SAMPLE_ROWS)
            .filter_map(|row| row.get(header))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .collect();

        if sample.is_empty() {
            schema.categorical.push(header.clone());
        } else if sample.iter().all(|v| is_numeric_like(v)) {
            schema.numerical.push(header.clone());
        } else if sample
            .iter()
            .all(|v| v.len() > TEMPORAL_MIN_LEN && parses_as_date(v))
        {
            schema.temporal.push(header.clone());
        } else {
            schema.categorical.push(header.clone());
        }
    }

    schema
}
