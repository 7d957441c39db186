//! Dataset Loader - decode, normalize, classify, admit

use crate::dataset::{normalize_rows, Dataset, DatasetMeta};
use crate::error::{EngineError, Result};
use crate::ingestion::decoder::DecoderRegistry;
use crate::ingestion::schema_discovery::discover_schema;
use crate::stats;
use itertools::Itertools;
use tracing::debug;
use uuid::Uuid;

/// An uploaded file: its name (drives decoder selection) and raw bytes.
#[derive(Clone, Debug)]
pub struct IngestFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl IngestFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Turns uploaded files into admitted datasets.
pub struct DatasetLoader {
    registry: DecoderRegistry,
}

impl Default for DatasetLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetLoader {
    pub fn new() -> Self {
        Self {
            registry: DecoderRegistry::new(),
        }
    }

    pub fn with_registry(registry: DecoderRegistry) -> Self {
        Self { registry }
    }

    pub fn registry_mut(&mut self) -> &mut DecoderRegistry {
        &mut self.registry
    }

    /// Decode a file into an admitted dataset.
    ///
    /// Fails with `DependencyMissing` when the needed decoder is absent,
    /// `Decode` on malformed content, and `SchemaUnsupported` when the
    /// discovered schema cannot back an X/Y coordinate analysis (no numeric
    /// column, or neither a categorical nor a temporal one).
    pub fn load(&self, file: &IngestFile) -> Result<Dataset> {
        let decoded = self.registry.decode_file(&file.bytes, &file.name)?;

        // Headers must be unique; first occurrence wins.
        let headers: Vec<String> = decoded.headers.into_iter().unique().collect();
        let rows = normalize_rows(&headers, decoded.rows);
        let schema = discover_schema(&headers, &rows);

        if !schema.supports_coordinates() {
            return Err(EngineError::SchemaUnsupported(format!(
                "dataset '{}' lacks the numeric plus categorical/temporal column pairing",
                file.name
            )));
        }

        let content_hash = stats::content_hash(&rows);
        debug!(
            name = %file.name,
            rows = rows.len(),
            numeric = schema.numerical.len(),
            "dataset admitted"
        );

        Ok(Dataset {
            id: Uuid::new_v4().to_string(),
            name: file.name.clone(),
            meta: DatasetMeta::new(Some(file.bytes.len() as u64), rows.len()),
            rows,
            headers,
            schema,
            content_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_file(name: &str, content: &str) -> IngestFile {
        IngestFile::new(name, content.as_bytes().to_vec())
    }

    #[test]
    fn load_admits_a_mixed_schema_csv() {
        let loader = DatasetLoader::new();
        let file = csv_file(
            "sales.csv",
            "region,date,revenue\nEast,2024-01-05,1200\nWest,2024-01-06,950\n",
        );

        let dataset = loader.load(&file).unwrap();
        assert_eq!(dataset.name, "sales.csv");
        assert_eq!(dataset.rows.len(), 2);
        assert_eq!(dataset.schema.numerical, vec!["revenue"]);
        assert_eq!(dataset.schema.temporal, vec!["date"]);
        assert_eq!(dataset.meta.row_count, 2);
        assert!(!dataset.content_hash.is_empty());
    }

    #[test]
    fn load_rejects_numeric_only_schema() {
        let loader = DatasetLoader::new();
        let file = csv_file("numbers.csv", "a,b\n1,2\n3,4\n");

        let err = loader.load(&file).unwrap_err();
        assert!(matches!(err, EngineError::SchemaUnsupported(_)));
    }

    #[test]
    fn load_rejects_text_only_schema() {
        let loader = DatasetLoader::new();
        let file = csv_file("words.csv", "a,b\nfoo,bar\nbaz,qux\n");

        let err = loader.load(&file).unwrap_err();
        assert!(matches!(err, EngineError::SchemaUnsupported(_)));
    }

    #[test]
    fn duplicate_headers_keep_first_occurrence() {
        let loader = DatasetLoader::new();
        let file = csv_file("dup.csv", "region,revenue,region\nEast,10,ignored\n");

        let dataset = loader.load(&file).unwrap();
        assert_eq!(dataset.headers, vec!["region", "revenue"]);
    }

    #[test]
    fn spreadsheet_without_decoder_fails_loudly() {
        let loader = DatasetLoader::new();
        let file = IngestFile::new("book.xlsx", vec![0x50, 0x4b]);

        let err = loader.load(&file).unwrap_err();
        assert!(matches!(err, EngineError::DependencyMissing(_)));
    }
}
