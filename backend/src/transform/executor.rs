//! Transform executor
//!
//! Applies a [`TransformSpec`] to a [`Table`] and returns a new table. Steps
//! run in a fixed order:
//!
//! 1. selection (by source column name)
//! 2. type conversion
//! 3. fill-missing
//! 4. outlier removal (drops rows)
//! 5. renaming
//!
//! Within each step, columns are visited in sorted name order. The input
//! table is never modified.

use serde::Serialize;

use crate::error::TransformResult;
use crate::models::{Cell, CellType, Row, Table};
use crate::stats::{infer_type, iqr_bounds, numeric_values};

use super::convert::convert_cell;
use super::spec::{ColumnTransform, TransformSpec};

/// A cell that could not be converted. Not an error: the transform goes on
/// and the cell is left as [`Cell::Invalid`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionWarning {
    /// Row position at conversion time (0-based).
    pub row: usize,
    pub column: String,
    /// Display text of the original cell.
    pub raw: String,
    pub target: CellType,
}

/// Result of applying a transform spec.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutcome {
    pub table: Table,
    pub warnings: Vec<ConversionWarning>,
    /// Rows dropped by outlier removal.
    pub rows_removed: usize,
}

impl TransformOutcome {
    /// True if every conversion succeeded.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Get summary statistics
    pub fn summary(&self) -> String {
        format!(
            "Transformed: {} rows, {} columns, {} removed, {} conversion warnings",
            self.table.row_count(),
            self.table.column_count(),
            self.rows_removed,
            self.warnings.len()
        )
    }
}

/// Apply `spec` to `table`.
///
/// Unknown columns and rename collisions are reported before any row is
/// touched. Conversion failures are collected as warnings.
pub fn apply(table: &Table, spec: &TransformSpec) -> TransformResult<TransformOutcome> {
    spec.validate(table)?;

    let working = match spec.selected_columns() {
        Some(columns) => table.project(&columns)?,
        None => table.clone(),
    };
    let input_rows = working.row_count();
    let (columns, mut rows) = working.into_parts();

    // Directives for columns dropped by the selection are skipped
    let directives: Vec<(usize, &str, &ColumnTransform)> = spec
        .transforms
        .iter()
        .filter_map(|(name, t)| {
            columns
                .iter()
                .position(|c| c == name)
                .map(|idx| (idx, name.as_str(), t))
        })
        .collect();

    let mut warnings = Vec::new();

    for &(idx, name, t) in &directives {
        if let Some(target) = t.convert_type {
            convert_column(&mut rows, idx, name, target, &mut warnings);
        }
    }

    for &(idx, _, t) in &directives {
        if let Some(fill) = t.fill_value() {
            fill_column(&mut rows, idx, fill);
        }
    }

    for &(idx, _, t) in &directives {
        if t.remove_outliers {
            rows = remove_outliers(rows, idx);
        }
    }

    let renamed: Vec<String> = columns
        .iter()
        .map(|c| {
            spec.transforms
                .get(c)
                .and_then(ColumnTransform::rename_target)
                .map(str::to_string)
                .unwrap_or_else(|| c.clone())
        })
        .collect();

    let rows_removed = input_rows - rows.len();

    Ok(TransformOutcome {
        table: Table::from_parts(renamed, rows),
        warnings,
        rows_removed,
    })
}

/// Convert every non-missing cell of a column. Missing cells stay as they
/// are so fill-missing still sees them.
fn convert_column(
    rows: &mut [Row],
    idx: usize,
    column: &str,
    target: CellType,
    warnings: &mut Vec<ConversionWarning>,
) {
    for (i, row) in rows.iter_mut().enumerate() {
        let cell = row.get(idx);
        if cell.is_missing() {
            continue;
        }

        let converted = match convert_cell(cell, target) {
            Some(c) => c,
            None => {
                let raw = cell.to_string();
                warnings.push(ConversionWarning {
                    row: i,
                    column: column.to_string(),
                    raw: raw.clone(),
                    target,
                });
                Cell::Invalid { target, raw }
            }
        };
        row.set(idx, converted);
    }
}

fn fill_column(rows: &mut [Row], idx: usize, fill: &str) {
    for row in rows.iter_mut() {
        if row.get(idx).is_missing() {
            row.set(idx, Cell::text(fill));
        }
    }
}

/// Drop rows whose numeric reading lies outside the IQR fences of the
/// column. Only applies when the column's current cells infer as `number`;
/// rows with a missing cell are kept.
fn remove_outliers(rows: Vec<Row>, idx: usize) -> Vec<Row> {
    if infer_type(rows.iter().map(|r| r.get(idx))) != CellType::Number {
        return rows;
    }

    let values = numeric_values(rows.iter().map(|r| r.get(idx)));
    let Some(bounds) = iqr_bounds(&values) else {
        return rows;
    };

    rows.into_iter()
        .filter(|row| match row.get(idx).as_number() {
            Some(v) => !bounds.is_outlier(v),
            None => true,
        })
        .collect()
}
