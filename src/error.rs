//! Error taxonomy for the feature pipeline.
//!
//! Every failure the pipeline can report is a [`PipelineError`] variant. The
//! variants split into two groups:
//!
//! - **Startup errors** ([`PipelineError::ConfigLoad`], [`PipelineError::EmptyTable`]):
//!   bad or degenerate configuration. The process should refuse to serve.
//! - **Request errors** (everything else): the request is rejected and the
//!   caller gets enough detail to find the offending field.
//!
//! The transform is deterministic, so none of these are worth retrying.
//!
//! ```
//! use housing_features::error::PipelineError;
//!
//! let err = PipelineError::UnknownCategory {
//!     column: "town".to_owned(),
//!     value: "Atlantis".to_owned(),
//! };
//! assert_eq!(err.field(), Some("town"));
//! assert!(!err.is_fatal());
//! ```
//!
//! Serving shells that answer over JSON can use [`PipelineError::to_report`]
//! to get a serializable [`ErrorReport`].

use serde::Serialize;
use std::fmt;

/// Main error type for pipeline operations.
#[derive(Debug)]
pub enum PipelineError {
    /// A configuration source is missing, malformed, or inconsistent with the pipeline
    ConfigLoad { source: String, reason: String },

    /// A column required by a stage is absent from the input
    MissingColumn { column: String },

    /// A category value has no entry in the scalar encoding table
    UnknownCategory { column: String, value: String },

    /// A value cannot be coerced to the declared numeric type
    TypeCast {
        column: String,
        dtype: String,
        reason: String,
    },

    /// An encoding table has no entries
    EmptyTable { table: String },

    /// The request payload could not be decoded into records
    Payload(String),

    /// Failure inside the dataframe engine
    Data(String),
}

impl PipelineError {
    pub fn config(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            source: source.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_column(column: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
        }
    }

    pub fn type_cast(
        column: impl Into<String>,
        dtype: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::TypeCast {
            column: column.into(),
            dtype: dtype.into(),
            reason: reason.into(),
        }
    }

    /// Name of the input field or table the error is about, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingColumn { column }
            | Self::UnknownCategory { column, .. }
            | Self::TypeCast { column, .. } => Some(column),
            Self::EmptyTable { table } => Some(table),
            Self::ConfigLoad { source, .. } => Some(source),
            Self::Payload(_) | Self::Data(_) => None,
        }
    }

    /// Startup errors: the configuration itself is unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConfigLoad { .. } | Self::EmptyTable { .. })
    }

    /// Stable machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigLoad { .. } => "config_load",
            Self::MissingColumn { .. } => "missing_column",
            Self::UnknownCategory { .. } => "unknown_category",
            Self::TypeCast { .. } => "type_cast",
            Self::EmptyTable { .. } => "empty_table",
            Self::Payload(_) => "payload",
            Self::Data(_) => "data",
        }
    }

    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            field: self.field().map(ToOwned::to_owned),
            message: self.to_string(),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigLoad { source, reason } => {
                write!(f, "Configuration error in {source}: {reason}")
            }
            Self::MissingColumn { column } => write!(f, "Missing required column '{column}'"),
            Self::UnknownCategory { column, value } => {
                write!(f, "Unknown category '{value}' in column '{column}'")
            }
            Self::TypeCast {
                column,
                dtype,
                reason,
            } => write!(f, "Cannot cast column '{column}' to {dtype}: {reason}"),
            Self::EmptyTable { table } => write!(f, "Encoding table '{table}' has no entries"),
            Self::Payload(msg) => write!(f, "Invalid payload: {msg}"),
            Self::Data(msg) => write!(f, "Data processing error: {msg}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Payload(format!("JSON error: {err}"))
    }
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        Self::Data(err.to_string())
    }
}

/// Serializable failure description handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub kind: &'static str,
    pub field: Option<String>,
    pub message: String,
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
