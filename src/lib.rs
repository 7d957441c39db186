//! tabaudit - embeddable analysis engine for tabular business data
//!
//! Ingests delimited-text and spreadsheet files into in-memory datasets,
//! classifies columns, computes descriptive statistics, correlation,
//! categorical aggregation and deltas against past runs, derives a
//! rule-based advisory, and assembles a printable report. Storage,
//! rendering, and spreadsheet decoding stay behind collaborator traits.

pub mod activity;
pub mod advisory;
pub mod analysis;
pub mod audit;
pub mod dataset;
pub mod error;
pub mod export;
pub mod history;
pub mod ingestion;
pub mod persistence;
pub mod render;
pub mod session;
pub mod stats;
pub mod store;

pub use activity::{ActivityEntry, ActivityLevel, ActivityLog};
pub use advisory::{
    interpret, Assessment, AdvisoryAction, AdvisoryEntry, ImpactEntry, ImpactSeverity,
    Interpretation, NarrativeSection,
};
pub use analysis::{AnalysisResult, Deltas};
pub use audit::{
    AuditOrchestrator, AuditOutcome, AuditState, CoordinateSelection, EngineOptions,
};
pub use dataset::{Dataset, DatasetMeta, DatasetSchema, Row};
pub use error::{EngineError, Result, ValidationFailure};
pub use export::{build_report, ReportDocument};
pub use history::{AuditHistory, DELTA_HISTORY_DEPTH};
pub use ingestion::{DatasetLoader, DecoderRegistry, IngestFile, TableDecoder, TableFormat};
pub use persistence::{MemoryStore, PersistenceStore, StoreCollection};
pub use render::{ChartSnapshot, NullRenderer, Renderer};
pub use session::{init_logging, IngestOutcome, Session};
pub use stats::{CategoryTotal, ColumnStatistics};
pub use store::{CollectionStore, CombineMode, CoordinateCandidates, ReconciledView};
