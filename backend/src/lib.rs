//! # Tabclean - CSV cleaning and exploration
//!
//! Tabclean ingests CSV files, profiles every column, applies cleaning
//! transforms (rename, fill, outlier removal, type conversion), filters and
//! projects the result, and exports it back to CSV.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│  Transform  │────▶│  CSV Export │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │  (spec/IQR) │     │  (RFC 4180) │
//! └─────────────┘     └──────┬──────┘     └──────┬──────┘     └─────────────┘
//!                            │                   │
//!                     ┌──────▼──────┐     ┌──────▼──────┐
//!                     │    Stats    │     │   Filter    │
//!                     │ (types/IQR) │     │ (rows/cols) │
//!                     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tabclean::{clean_csv_file, to_csv_string, CleanOptions};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let result = clean_csv_file(Path::new("sales.csv"), &CleanOptions::auto())?;
//!     print!("{}", to_csv_string(&result.outcome.table)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`config`] - Environment configuration
//! - [`models`] - Table, Row and Cell
//! - [`parser`] - CSV ingestion with encoding/delimiter detection
//! - [`stats`] - Column statistics and IQR outliers
//! - [`transform`] - Transform specs, executor, suggestions and pipeline
//! - [`filter`] - Row filtering, projection, search and paging
//! - [`export`] - CSV serialization
//! - [`session`] - Working table with restore point, upload sequencing
//! - [`charts`] - Chart data and dashboards
//! - [`catalog`] - Dataset catalog search
//! - [`api`] - HTTP API server and log broadcaster

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Ingestion
pub mod parser;

// Analysis
pub mod stats;

// Transformation
pub mod filter;
pub mod transform;

// Output
pub mod export;

// Working state
pub mod session;

// Presentation
pub mod catalog;
pub mod charts;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ExportError,
    IngestionError,
    PipelineError,
    PipelineResult,
    ReadError,
    ServerError,
    SessionError,
    TableError,
    TransformError,
    ValidationError,
};

// =============================================================================
// Re-exports - Config
// =============================================================================

pub use config::Config;

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Cell, CellType, Row, Table};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    csv_to_table,
    decode_content,
    detect_delimiter,
    detect_encoding,
    parse_bytes,
    parse_csv,
    parse_csv_file,
    IngestOptions,
    ParseResult,
};

// =============================================================================
// Re-exports - Statistics
// =============================================================================

pub use stats::{column_stats, iqr_bounds, table_stats, ColumnStats, IqrBounds};

// =============================================================================
// Re-exports - Transform
// =============================================================================

pub use transform::{
    apply,
    auto_suggest,
    ColumnTransform,
    ConversionWarning,
    TransformOutcome,
    TransformSpec,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    clean_bytes,
    clean_csv_file,
    clean_table,
    format_delimiter,
    CleanOptions,
    CleanResult,
    CsvInfo,
    SpecSource,
};

// =============================================================================
// Re-exports - Filter & Export
// =============================================================================

pub use filter::{apply_filter, paginate, ColumnFilter, FilterSpec, Page};
pub use export::{to_csv_string, write_csv, write_csv_file};

// =============================================================================
// Re-exports - Session, Charts, Catalog
// =============================================================================

pub use session::{Session, SessionStore, UploadTicket, UploadTracker};
pub use charts::{Aggregation, ChartConfig, Dashboard, DataPoint};
pub use catalog::{Catalog, CatalogQuery, DatasetDescriptor};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::logs::{LogEntry, LogLevel, LOG_BROADCASTER};
pub use api::types::{error_response, UploadResponse};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
