//! Table Decoders - pluggable file-format decoding behind a capability trait
//!
//! The delimited-text decoder ships with the engine; the spreadsheet slot is
//! filled by an external collaborator. Requesting a format with no
//! registered decoder is a reportable dependency failure, never a silent
//! degradation.

use crate::dataset::Row;
use crate::error::{EngineError, Result};
use anyhow::Context;
use csv::ReaderBuilder;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TableFormat {
    /// CSV and friends
    Delimited,
    /// XLSX/XLS workbooks; decoded first sheet only, absent cells map to
    /// empty strings
    Spreadsheet,
}

impl TableFormat {
    /// Pick the decoder family from the file name extension. Anything that
    /// is not a known workbook extension is treated as delimited text.
    pub fn from_file_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
            TableFormat::Spreadsheet
        } else {
            TableFormat::Delimited
        }
    }
}

/// Decoded but not yet normalized tabular content.
#[derive(Clone, Debug)]
pub struct DecodedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

/// A file-format decoder. Implementations must tolerate ragged records and
/// default absent cells to the empty string.
pub trait TableDecoder: Send + Sync {
    fn format(&self) -> TableFormat;

    fn decode(&self, bytes: &[u8], file_name: &str) -> anyhow::Result<DecodedTable>;
}

/// Built-in delimited-text decoder over the `csv` crate: header-row
/// inference, blank-line skipping, flexible record lengths.
pub struct CsvDecoder;

impl TableDecoder for CsvDecoder {
    fn format(&self) -> TableFormat {
        TableFormat::Delimited
    }

    fn decode(&self, bytes: &[u8], file_name: &str) -> anyhow::Result<DecodedTable> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let headers: Vec<String> = reader
            .headers()
            .with_context(|| format!("failed to read headers from '{file_name}'"))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record =
                record.with_context(|| format!("failed to read a record from '{file_name}'"))?;
            let mut row = HashMap::with_capacity(headers.len());
            for (idx, header) in headers.iter().enumerate() {
                let cell = record.get(idx).unwrap_or("");
                row.insert(header.clone(), cell.to_string());
            }
            rows.push(row);
        }

        Ok(DecodedTable { headers, rows })
    }
}

/// Format → decoder lookup. The delimited decoder is pre-registered;
/// spreadsheet support arrives by registering an external decoder.
pub struct DecoderRegistry {
    decoders: HashMap<TableFormat, Box<dyn TableDecoder>>,
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderRegistry {
    pub fn new() -> Self {
        let mut decoders: HashMap<TableFormat, Box<dyn TableDecoder>> = HashMap::new();
        decoders.insert(TableFormat::Delimited, Box::new(CsvDecoder));
        Self { decoders }
    }

    /// A registry with no decoders at all; every decode reports its missing
    /// dependency.
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    pub fn register(&mut self, decoder: Box<dyn TableDecoder>) {
        self.decoders.insert(decoder.format(), decoder);
    }

    pub fn supports(&self, format: TableFormat) -> bool {
        self.decoders.contains_key(&format)
    }

    pub fn decode_file(&self, bytes: &[u8], file_name: &str) -> Result<DecodedTable> {
        let format = TableFormat::from_file_name(file_name);
        let decoder = self.decoders.get(&format).ok_or_else(|| {
            EngineError::DependencyMissing(format!(
                "no {:?} decoder registered for '{file_name}'",
                format
            ))
        })?;

        decoder
            .decode(bytes, file_name)
            .map_err(|e| EngineError::Decode(format!("{e:#}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_detection_by_extension() {
        assert_eq!(TableFormat::from_file_name("q3.csv"), TableFormat::Delimited);
        assert_eq!(TableFormat::from_file_name("Q3.XLSX"), TableFormat::Spreadsheet);
        assert_eq!(TableFormat::from_file_name("plain.txt"), TableFormat::Delimited);
    }

    #[test]
    fn csv_decoder_handles_ragged_records() {
        let csv = "a,b,c\n1,2,3\n4,5\n";
        let table = CsvDecoder.decode(csv.as_bytes(), "ragged.csv").unwrap();

        assert_eq!(table.headers, vec!["a", "b", "c"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1]["c"], "");
    }

    #[test]
    fn csv_decoder_skips_blank_lines() {
        let csv = "a,b\n1,2\n\n3,4\n";
        let table = CsvDecoder.decode(csv.as_bytes(), "blank.csv").unwrap();
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn missing_spreadsheet_decoder_is_reported() {
        let registry = DecoderRegistry::new();
        let err = registry.decode_file(b"", "book.xlsx").unwrap_err();
        assert!(matches!(err, EngineError::DependencyMissing(_)));
        assert!(err.to_string().contains("book.xlsx"));
    }

    #[test]
    fn empty_registry_reports_delimited_too() {
        let registry = DecoderRegistry::empty();
        let err = registry.decode_file(b"a,b\n1,2\n", "data.csv").unwrap_err();
        assert!(matches!(err, EngineError::DependencyMissing(_)));
    }
}
