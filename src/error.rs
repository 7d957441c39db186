use thiserror::Error;

/// Distinct, user-reportable reasons an audit trigger can be blocked
/// during validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    #[error("No dataset loaded")]
    NoDatasetLoaded,

    #[error("No X column selected")]
    XUnselected,

    #[error("No Y column selected")]
    YUnselected,

    #[error("Working row set is empty")]
    EmptyWorkingSet,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationFailure),

    #[error("Required decoder missing: {0}")]
    DependencyMissing(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Unsupported schema: {0}")]
    SchemaUnsupported(String),

    #[error("Computation error: {0}")]
    Computation(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Export blocked, incomplete: {0}")]
    ExportBlocked(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
