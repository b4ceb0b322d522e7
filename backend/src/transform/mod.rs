//! Transformation module.
//!
//! - `spec`: Declarative per-column directives and column selection
//! - `convert`: Cell type conversion
//! - `executor`: Apply a spec to a table
//! - `suggest`: Derive a spec from column statistics
//! - `pipeline`: Ingest, inspect and clean in one call

pub mod convert;
pub mod executor;
pub mod pipeline;
pub mod spec;
pub mod suggest;

pub use convert::{convert_cell, format_timestamp, parse_date};
pub use executor::{apply, ConversionWarning, TransformOutcome};
pub use pipeline::*;
pub use spec::{ColumnTransform, TransformSpec};
pub use suggest::auto_suggest;
