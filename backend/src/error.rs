//! Error types for the tabclean pipeline.
//!
//! This module defines the error hierarchy used across the crate:
//!
//! - [`IngestionError`] - Malformed, empty or rejected input
//! - [`ReadError`] - Underlying file/stream read failures
//! - [`TableError`] - Column lookups and table shape violations
//! - [`TransformError`] - Invalid transform specs and rename collisions
//! - [`ExportError`] - CSV serialization failures
//! - [`ValidationError`] - Dashboard configuration checks
//! - [`SessionError`] - Session lookup and upload sequencing
//! - [`PipelineError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.
//!
//! Every error exposes a short [`title`](PipelineError::title) for user
//! notifications; the `Display` text is the description.

use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// Ingestion Errors
// =============================================================================

/// Errors while turning CSV text into a table, or a JSON file into a catalog.
///
/// Ingestion is all-or-nothing: when one of these is returned no table exists.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Header present but no data rows.
    #[error("The CSV file doesn't contain any rows of data")]
    Empty,

    /// No usable header line.
    #[error("No headers found in CSV")]
    NoHeaders,

    /// Two header fields share a name.
    #[error("Duplicate column name in header: {0}")]
    DuplicateColumn(String),

    /// File name does not look like a CSV file.
    #[error("Only CSV files are accepted (got '{0}')")]
    NotCsv(String),

    /// Input exceeds the configured size limit.
    #[error("File too large: {size} bytes (maximum is {limit} bytes)")]
    TooLarge { size: usize, limit: usize },

    /// Bytes could not be decoded.
    #[error("Failed to decode content: {0}")]
    Encoding(String),

    /// The CSV reader rejected a record.
    #[error("Line {line}: {message}")]
    Malformed { line: u64, message: String },

    /// A JSON input file did not parse.
    #[error("Invalid JSON in '{path}': {source}")]
    InvalidJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

// =============================================================================
// Read Errors
// =============================================================================

/// Failures of the underlying read operation, reported apart from parse errors.
#[derive(Debug, Error)]
pub enum ReadError {
    /// Failed to read a file from disk.
    #[error("Cannot read file '{path}': {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to read an uploaded stream.
    #[error("Cannot read upload: {0}")]
    Stream(String),
}

// =============================================================================
// Table Errors
// =============================================================================

/// Errors from table construction and column lookups.
#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    /// Referenced column is not part of the table.
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// Column list is not a set.
    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),
}

// =============================================================================
// Transformation Errors
// =============================================================================

/// Errors that abort a transform before any row is touched.
///
/// Per-cell conversion failures are not errors; they are reported as
/// [`ConversionWarning`](crate::transform::ConversionWarning)s.
#[derive(Debug, Error)]
pub enum TransformError {
    /// Spec references a column the table does not have.
    #[error("Missing source column: {0}")]
    UnknownColumn(String),

    /// Two columns would end up with the same name after renaming.
    #[error("Columns {sources:?} would all be named '{target}'")]
    RenameCollision { target: String, sources: Vec<String> },

    /// Spec could not be parsed.
    #[error("Invalid transform spec: {0}")]
    InvalidSpec(#[from] serde_json::Error),
}

impl From<TableError> for TransformError {
    fn from(err: TableError) -> Self {
        match err {
            TableError::UnknownColumn(c) | TableError::DuplicateColumn(c) => {
                TransformError::UnknownColumn(c)
            }
        }
    }
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while serializing a table back to CSV.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV writer failure.
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error while flushing or writing the output file.
    #[error("Export IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Writer produced bytes that are not UTF-8.
    #[error("Export produced invalid UTF-8")]
    Utf8,
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors from dashboard configuration checks.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Dashboard saved without a name.
    #[error("Please enter a name for your dashboard")]
    MissingName,

    /// Chart axis does not name a table column.
    #[error("Chart '{chart}' references unknown column '{column}'")]
    UnknownAxis { chart: String, column: String },
}

// =============================================================================
// Session Errors
// =============================================================================

/// Errors from the in-memory session store.
#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    /// No session with this id.
    #[error("Session not found: {0}")]
    NotFound(Uuid),

    /// A newer upload was started before this one finished.
    #[error("Upload #{ticket} was superseded by upload #{latest}")]
    StaleUpload { ticket: u64, latest: u64 },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the main error type returned by
/// [`crate::transform::pipeline::clean_csv_file`]. It wraps all lower-level
/// errors so that ingestion and read failures stay distinguishable.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// CSV ingestion error.
    #[error("Ingestion error: {0}")]
    Ingestion(#[from] IngestionError),

    /// Read error.
    #[error("Read error: {0}")]
    Read(#[from] ReadError),

    /// Table error.
    #[error("Table error: {0}")]
    Table(#[from] TableError),

    /// Transformation error.
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Export error.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Session error.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

impl PipelineError {
    /// Short notification title for this error.
    pub fn title(&self) -> &'static str {
        match self {
            PipelineError::Ingestion(IngestionError::Empty) => "Empty Data",
            PipelineError::Ingestion(IngestionError::NotCsv(_)) => "Invalid File Format",
            PipelineError::Ingestion(IngestionError::TooLarge { .. }) => "File Too Large",
            PipelineError::Ingestion(_) => "Error Parsing File",
            PipelineError::Read(_) => "Error Reading File",
            PipelineError::Table(_) => "Unknown Column",
            PipelineError::Transform(_) => "Transformation Failed",
            PipelineError::Export(_) => "Export Failed",
            PipelineError::Validation(ValidationError::MissingName) => "Dashboard Name Required",
            PipelineError::Validation(_) => "Invalid Dashboard",
            PipelineError::Session(SessionError::StaleUpload { .. }) => "Upload Superseded",
            PipelineError::Session(_) => "Session Expired",
        }
    }
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

macro_rules! server_error_from {
    ($($err:ty),* $(,)?) => {
        $(
            impl From<$err> for ServerError {
                fn from(err: $err) -> Self {
                    ServerError::Pipeline(err.into())
                }
            }
        )*
    };
}

server_error_from!(
    IngestionError,
    ReadError,
    TableError,
    TransformError,
    ExportError,
    ValidationError,
    SessionError,
);

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for ingestion operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Result type for transformation operations.
pub type TransformResult<T> = Result<T, TransformError>;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // IngestionError -> PipelineError
        let err: PipelineError = IngestionError::Empty.into();
        assert!(err.to_string().contains("rows of data"));
        assert_eq!(err.title(), "Empty Data");

        // TransformError -> PipelineError
        let err: PipelineError = TransformError::UnknownColumn("price".into()).into();
        assert!(err.to_string().contains("price"));
    }

    #[test]
    fn test_read_and_ingestion_are_distinct() {
        let read: PipelineError = ReadError::Stream("connection reset".into()).into();
        let parse: PipelineError = IngestionError::NoHeaders.into();

        assert!(matches!(read, PipelineError::Read(_)));
        assert!(matches!(parse, PipelineError::Ingestion(_)));
        assert_ne!(read.title(), parse.title());
    }

    #[test]
    fn test_rename_collision_format() {
        let err = TransformError::RenameCollision {
            target: "amount".into(),
            sources: vec!["price".into(), "cost".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("amount"));
        assert!(msg.contains("price"));
        assert!(msg.contains("cost"));
    }

    #[test]
    fn test_table_error_maps_to_transform_error() {
        let err: TransformError = TableError::UnknownColumn("qty".into()).into();
        assert!(matches!(err, TransformError::UnknownColumn(c) if c == "qty"));
    }
}
