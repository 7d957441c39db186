//! Ingestion - file decoding, schema discovery, dataset admission

pub mod decoder;
pub mod loader;
pub mod schema_discovery;

pub use decoder::{CsvDecoder, DecodedTable, DecoderRegistry, TableDecoder, TableFormat};
pub use loader::{DatasetLoader, IngestFile};
pub use schema_discovery::{discover_schema, parses_as_date, SCHEMA_SAMPLE_ROWS};
