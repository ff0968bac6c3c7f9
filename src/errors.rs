//! Error types for testimpact operations.
//!
//! Errors are grouped the way the selection pipeline treats them:
//!
//! - **Analysis-level** (`Parse`): absorbed locally. The affected file is
//!   scored as a whole-file change and the rest of the change set continues.
//! - **Model-level** (`SchemaMismatch`, `ModelFormat`): propagated to the
//!   orchestrator, which retrains once before surfacing the failure.
//! - **Request-level** (`InsufficientData`, `ConstraintUnsatisfiable`):
//!   fatal to the request, never to the process.
//! - **Invariant violations** (`EmptySelection`, `HistoryOrder`): reported,
//!   never swallowed.
//!
//! # Error Codes
//!
//! - E001-E009: I/O and serialization
//! - E010-E019: Parse errors
//! - E020-E029: Configuration errors
//! - E030-E039: Model lifecycle errors
//! - E040-E049: Selection errors
//! - E050-E059: History errors

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for testimpact operations
#[derive(Debug, Error)]
pub enum Error {
    /// A source version could not be parsed into a syntax tree
    #[error("Parse error in {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// Too little history to train or validate a model
    #[error("Insufficient data: {message} (have {available}, need {required})")]
    InsufficientData {
        message: String,
        available: usize,
        required: usize,
    },

    /// Feature layout and model layout disagree
    #[error("Feature schema mismatch: model expects {expected}, got {found}")]
    SchemaMismatch { expected: String, found: String },

    /// Selection constraints cannot be satisfied together
    #[error("Constraints cannot be satisfied: {0}")]
    ConstraintUnsatisfiable(String),

    /// Selection produced no tests
    #[error("Selection produced an empty test set: {0}")]
    EmptySelection(String),

    /// An append would break the chronological order of a test's history
    #[error("History for '{test_id}' is at run {last_run}, cannot append run {attempted_run}")]
    HistoryOrder {
        test_id: String,
        last_run: u64,
        attempted_run: u64,
    },

    /// A freshly trained model scored below the validation gate
    #[error("Model rejected: validation accuracy {accuracy:.3} is below {required:.3}")]
    ValidationGate { accuracy: f64, required: f64 },

    /// A persisted model artifact could not be decoded
    #[error("Invalid model artifact {}: {message}", path.display())]
    ModelFormat { path: PathBuf, message: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },

    /// IO errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// TOML errors
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Create a parse error for a file
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn insufficient_data(message: impl Into<String>, available: usize, required: usize) -> Self {
        Self::InsufficientData {
            message: message.into(),
            available,
            required,
        }
    }

    pub fn schema_mismatch(expected: impl ToString, found: impl ToString) -> Self {
        Self::SchemaMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with context layers stripped.
    pub fn root(&self) -> &Error {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Stable error code for programmatic handling.
    pub fn code(&self) -> &'static str {
        match self.root() {
            Self::Io(_) => "E001",
            Self::Json(_) => "E002",
            Self::Parse { .. } => "E010",
            Self::Toml(_) => "E020",
            Self::Config(_) => "E021",
            Self::InsufficientData { .. } => "E030",
            Self::SchemaMismatch { .. } => "E031",
            Self::ModelFormat { .. } => "E032",
            Self::ValidationGate { .. } => "E033",
            Self::ConstraintUnsatisfiable(_) => "E040",
            Self::EmptySelection(_) => "E041",
            Self::HistoryOrder { .. } => "E050",
            Self::WithContext { .. } => "E009",
        }
    }

    /// Whether retraining the risk model can clear this error.
    pub fn is_recoverable_by_retrain(&self) -> bool {
        matches!(
            self.root(),
            Self::SchemaMismatch { .. } | Self::ModelFormat { .. }
        )
    }

    pub fn is_insufficient_data(&self) -> bool {
        matches!(self.root(), Self::InsufficientData { .. })
    }
}

/// Result type alias using our error type
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_see_through_context() {
        let err = Error::schema_mismatch("v1", "v2").with_context("loading model");
        assert_eq!(err.code(), "E031");
        assert!(err.is_recoverable_by_retrain());
    }

    #[test]
    fn test_insufficient_data_is_not_recoverable() {
        let err = Error::insufficient_data("training set too small", 3, 50);
        assert!(!err.is_recoverable_by_retrain());
        assert!(err.is_insufficient_data());
        assert!(err.to_string().contains("have 3, need 50"));
    }

    #[test]
    fn test_result_ext_wraps_io_errors() {
        let res: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        let err = res.context("reading history").unwrap_err();
        assert_eq!(err.code(), "E001");
        assert!(err.to_string().starts_with("reading history"));
    }
}
