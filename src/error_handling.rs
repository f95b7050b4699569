//! Standardized error handling for the report pipeline
//! Provides the error taxonomy, result alias and context helpers

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Serializable error summary used in run summaries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorSummary {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Error types for the report pipeline
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Timestamp column not found: tried {tried:?}")]
    SchemaMissing { tried: Vec<String> },

    #[error("No data found in column: {column}")]
    EmptyAggregate { column: String },

    #[error("Invalid record: {message}")]
    InvalidRecord { message: String },

    #[error("Malformed record at {source_name}:{line}: {message}")]
    MalformedRecord {
        source_name: String,
        line: usize,
        message: String,
    },

    #[error("Column {column} holds lists and must be exploded before aggregation")]
    ListColumn { column: String },

    #[error("Unknown column: {column}")]
    UnknownColumn { column: String },

    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

impl ReportError {
    /// Create a schema-missing error from the candidate column names
    pub fn schema_missing<I, S>(tried: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::SchemaMissing {
            tried: tried.into_iter().map(Into::into).collect(),
        }
    }

    /// Create an empty-aggregate warning for a column
    pub fn empty_aggregate<S: Into<String>>(column: S) -> Self {
        Self::EmptyAggregate {
            column: column.into(),
        }
    }

    /// Create an invalid-record error for a document without location
    pub fn invalid_record<S: Into<String>>(message: S) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Create a malformed-record error with its location
    pub fn malformed<S: Into<String>, M: Into<String>>(
        source_name: S,
        line: usize,
        message: M,
    ) -> Self {
        Self::MalformedRecord {
            source_name: source_name.into(),
            line,
            message: message.into(),
        }
    }

    /// Attach a stream location to an invalid-record error
    pub fn at_line<S: Into<String>>(self, source_name: S, line: usize) -> Self {
        match self {
            Self::InvalidRecord { message } => Self::malformed(source_name, line, message),
            other => other,
        }
    }

    /// Create a list-column contract violation
    pub fn list_column<S: Into<String>>(column: S) -> Self {
        Self::ListColumn {
            column: column.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with source
    pub fn configuration_with_source<S: Into<String>>(message: S, source: anyhow::Error) -> Self {
        Self::Configuration {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Wrap an IO error with the operation that failed
    pub fn io<S: Into<String>>(message: S, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Get the stable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SchemaMissing { .. } => "SCHEMA_MISSING",
            Self::EmptyAggregate { .. } => "EMPTY_AGGREGATE",
            Self::InvalidRecord { .. } => "INVALID_RECORD",
            Self::MalformedRecord { .. } => "MALFORMED_RECORD",
            Self::ListColumn { .. } => "LIST_COLUMN",
            Self::UnknownColumn { .. } => "UNKNOWN_COLUMN",
            Self::Configuration { .. } => "CONFIG_ERROR",
            Self::Io { .. } => "IO_ERROR",
        }
    }

    /// Whether the error only skips the affected unit of work
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            Self::SchemaMissing { .. }
                | Self::EmptyAggregate { .. }
                | Self::InvalidRecord { .. }
                | Self::MalformedRecord { .. }
        )
    }

    /// Emit the error with the level matching its severity
    pub fn log(&self) {
        match self {
            Self::EmptyAggregate { .. }
            | Self::InvalidRecord { .. }
            | Self::MalformedRecord { .. } => info!("{}", self),
            Self::SchemaMissing { .. } | Self::ListColumn { .. } | Self::UnknownColumn { .. } => {
                warn!("{}", self)
            }
            Self::Configuration { .. } | Self::Io { .. } => {
                error!("{}", self)
            }
        }
    }

    /// Convert to a serializable summary
    pub fn to_summary(&self) -> ErrorSummary {
        ErrorSummary {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.get_details(),
        }
    }

    fn get_details(&self) -> Option<serde_json::Value> {
        match self {
            Self::SchemaMissing { tried } => Some(serde_json::json!({ "tried": tried })),
            Self::MalformedRecord { source_name, line, .. } => {
                Some(serde_json::json!({ "source": source_name, "line": line }))
            }
            _ => None,
        }
    }
}

/// Result type alias for report operations
pub type ReportResult<T> = std::result::Result<T, ReportError>;

/// Trait for adding context to foreign errors
pub trait ErrorContext<T> {
    fn with_io_context<F>(self, f: F) -> ReportResult<T>
    where
        F: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::result::Result<T, std::io::Error> {
    fn with_io_context<F>(self, f: F) -> ReportResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| ReportError::io(f(), e))
    }
}
