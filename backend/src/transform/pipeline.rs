//! High-level cleaning pipeline.
//!
//! Combines ingestion, statistics, spec selection and the transform
//! executor, logging every step through the log broadcaster.
//!
//! # Example
//!
//! ```rust,ignore
//! use tabclean::transform::pipeline::{clean_csv_file, CleanOptions};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let result = clean_csv_file(Path::new("sales.csv"), &CleanOptions::auto())?;
//!     println!("{}", result.outcome.summary());
//!     Ok(())
//! }
//! ```

use serde::Serialize;
use std::path::Path;

use crate::api::logs::{log_info, log_info_indent, log_success, log_warning, log_warning_indent};
use crate::error::PipelineResult;
use crate::models::Table;
use crate::parser::{parse_bytes, parse_csv_file, IngestOptions, ParseResult};
use crate::stats::{table_stats, ColumnStats};

use super::executor::{apply, ConversionWarning, TransformOutcome};
use super::spec::TransformSpec;
use super::suggest::auto_suggest;

/// Conversion warnings shown individually before the rest are summarized.
const WARNINGS_SHOWN: usize = 3;

/// Where the transform spec comes from.
#[derive(Debug, Clone, Default)]
pub enum SpecSource {
    /// Apply nothing (ingest and report only).
    #[default]
    None,
    /// Use the given spec.
    Explicit(TransformSpec),
    /// Derive the spec with [`auto_suggest`].
    Auto,
}

/// Options for the cleaning pipeline
#[derive(Debug, Clone, Default)]
pub struct CleanOptions {
    pub ingest: IngestOptions,
    pub spec: SpecSource,
}

impl CleanOptions {
    /// Auto-suggested spec with default ingestion.
    pub fn auto() -> Self {
        Self {
            ingest: IngestOptions::default(),
            spec: SpecSource::Auto,
        }
    }

    pub fn with_spec(spec: TransformSpec) -> Self {
        Self {
            ingest: IngestOptions::default(),
            spec: SpecSource::Explicit(spec),
        }
    }

    pub fn with_ingest(mut self, ingest: IngestOptions) -> Self {
        self.ingest = ingest;
        self
    }
}

/// CSV file information
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

impl From<&ParseResult> for CsvInfo {
    fn from(result: &ParseResult) -> Self {
        Self {
            encoding: result.encoding.clone(),
            delimiter: result.delimiter,
            headers: result.headers().to_vec(),
            row_count: result.row_count(),
        }
    }
}

/// Result of a complete cleaning run
#[derive(Debug, Clone)]
pub struct CleanResult {
    /// Parsing metadata (absent when starting from a table)
    pub csv_info: Option<CsvInfo>,
    /// The table as ingested
    pub original: Table,
    /// Column statistics of the ingested table
    pub stats: Vec<ColumnStats>,
    /// The spec that was applied
    pub spec: TransformSpec,
    /// Transformed table and warnings
    pub outcome: TransformOutcome,
}

/// Clean a CSV file.
///
/// 1. Parses the CSV (extension, size, encoding and delimiter checks)
/// 2. Computes column statistics
/// 3. Resolves the spec (explicit, auto-suggested, or none)
/// 4. Applies it
pub fn clean_csv_file(path: &Path, options: &CleanOptions) -> PipelineResult<CleanResult> {
    log_info(format!("Reading {}...", path.display()));
    let parsed = parse_csv_file(path, &options.ingest)?;
    clean_parsed(parsed, options)
}

/// Clean CSV bytes. Same as [`clean_csv_file`] without the file checks.
pub fn clean_bytes(bytes: &[u8], options: &CleanOptions) -> PipelineResult<CleanResult> {
    let parsed = parse_bytes(bytes, &options.ingest)?;
    clean_parsed(parsed, options)
}

/// Clean an already ingested table.
pub fn clean_table(table: Table, spec: &SpecSource) -> PipelineResult<CleanResult> {
    run(None, table, spec)
}

fn clean_parsed(parsed: ParseResult, options: &CleanOptions) -> PipelineResult<CleanResult> {
    log_success(format!("Detected encoding: {}", parsed.encoding));
    log_success(format!("Detected separator: '{}'", format_delimiter(parsed.delimiter)));
    log_success(format!("Read {} rows", parsed.row_count()));

    let info = CsvInfo::from(&parsed);
    run(Some(info), parsed.table, &options.spec)
}

fn run(csv_info: Option<CsvInfo>, table: Table, source: &SpecSource) -> PipelineResult<CleanResult> {
    log_info(format!("CSV has {} columns:", table.column_count()));
    for (i, col) in table.columns().iter().enumerate() {
        log_info_indent(format!("[{:2}] {}", i + 1, col), 1);
    }

    log_info("Computing column statistics...");
    let stats = table_stats(&table);
    print_stats(&stats);

    let spec = match source {
        SpecSource::None => TransformSpec::new(),
        SpecSource::Explicit(spec) => spec.clone(),
        SpecSource::Auto => {
            log_info("Suggesting transformations...");
            let spec = auto_suggest(&table);
            log_success(format!("{} column(s) with suggestions", spec.transforms.len()));
            spec
        }
    };

    log_info("Applying transformations...");
    let outcome = apply(&table, &spec)?;
    print_outcome(&outcome);

    Ok(CleanResult {
        csv_info,
        original: table,
        stats,
        spec,
        outcome,
    })
}

/// Format delimiter for display
pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        other => other.to_string(),
    }
}

fn print_stats(stats: &[ColumnStats]) {
    for s in stats {
        let mut line = format!("{}: {}, {} null, {} unique", s.column, s.inferred_type, s.null_count, s.unique_count);
        if s.has_outliers {
            line.push_str(&format!(", {} outlier(s)", s.outlier_count));
        }
        log_info_indent(line, 1);
    }
}

fn print_outcome(outcome: &TransformOutcome) {
    log_success(outcome.summary());
    if !outcome.is_clean() {
        print_warnings(&outcome.warnings);
    }
}

/// Log conversion warnings, showing only the first few.
fn print_warnings(warnings: &[ConversionWarning]) {
    log_warning(format!("{} value(s) could not be converted", warnings.len()));
    for w in warnings.iter().take(WARNINGS_SHOWN) {
        log_warning_indent(
            format!("row {}, column '{}': '{}' is not a valid {}", w.row + 1, w.column, w.raw, w.target),
            1,
        );
    }
    if warnings.len() > WARNINGS_SHOWN {
        log_warning_indent(format!("... +{} more", warnings.len() - WARNINGS_SHOWN), 1);
    }
}
