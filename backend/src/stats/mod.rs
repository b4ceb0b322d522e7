//! Column statistics.
//!
//! Null and unique counts, type inference and IQR outlier detection for one
//! column at a time. Everything here is a pure function of the table: the
//! same table and column always give the same [`ColumnStats`].
//!
//! Outliers use nearest-rank quartiles (no interpolation):
//!
//! ```text
//! sorted = ascending numeric values, n = len
//! Q1 = sorted[floor(n * 0.25)]      Q3 = sorted[floor(n * 0.75)]
//! bounds = [Q1 - 1.5 * (Q3 - Q1), Q3 + 1.5 * (Q3 - Q1)]
//! ```

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::TableError;
use crate::models::{Cell, CellType, Table};

/// Multiplier applied to the IQR to get the fences.
pub const IQR_MULTIPLIER: f64 = 1.5;

/// Per-column summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnStats {
    pub column: String,
    pub null_count: usize,
    pub unique_count: usize,
    pub inferred_type: CellType,
    pub has_outliers: bool,
    pub outlier_count: usize,
}

/// Quartiles and fences of a numeric sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IqrBounds {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrBounds {
    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }

    /// Strictly outside the fences.
    pub fn is_outlier(&self, value: f64) -> bool {
        value < self.lower || value > self.upper
    }
}

/// Count, range and mean of a numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Compute nearest-rank IQR bounds. `None` for an empty sample.
pub fn iqr_bounds(values: &[f64]) -> Option<IqrBounds> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let q1 = sorted[(n as f64 * 0.25).floor() as usize];
    let q3 = sorted[(n as f64 * 0.75).floor() as usize];
    let iqr = q3 - q1;

    Some(IqrBounds {
        q1,
        q3,
        lower: q1 - IQR_MULTIPLIER * iqr,
        upper: q3 + IQR_MULTIPLIER * iqr,
    })
}

/// Arithmetic mean, `None` for an empty sample.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Whether `s` is a canonical RFC 3339 timestamp.
pub fn is_timestamp(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
}

/// Infer the logical type of a column from its cells.
///
/// `number` when every non-null cell has a numeric reading. Otherwise the
/// first non-null cell decides: booleans give `boolean`, timestamps give
/// `date` (only if every non-null cell is one), anything else `string`.
/// A column without non-null cells is `string`.
pub fn infer_type<'a, I>(cells: I) -> CellType
where
    I: IntoIterator<Item = &'a Cell>,
{
    let non_null: Vec<&Cell> = cells.into_iter().filter(|c| !c.is_missing()).collect();

    let Some(first) = non_null.first() else {
        return CellType::String;
    };

    if non_null.iter().all(|c| c.as_number().is_some()) {
        return CellType::Number;
    }

    match first {
        Cell::Boolean(_) => CellType::Boolean,
        Cell::Text(_) => {
            let all_timestamps = non_null
                .iter()
                .all(|c| matches!(c, Cell::Text(s) if is_timestamp(s)));
            if all_timestamps {
                CellType::Date
            } else {
                CellType::String
            }
        }
        _ => CellType::String,
    }
}

/// Numeric readings of the non-null cells of a column.
pub fn numeric_values<'a, I>(cells: I) -> Vec<f64>
where
    I: IntoIterator<Item = &'a Cell>,
{
    cells.into_iter().filter_map(Cell::as_number).collect()
}

/// Statistics for one column.
pub fn column_stats(table: &Table, column: &str) -> Result<ColumnStats, TableError> {
    let cells = table.column_cells(column)?;

    let null_count = cells.iter().filter(|c| c.is_missing()).count();
    let unique_count = cells
        .iter()
        .map(|c| c.unique_key())
        .collect::<HashSet<_>>()
        .len();
    let inferred_type = infer_type(cells.iter().copied());

    let outlier_count = if inferred_type == CellType::Number {
        let values = numeric_values(cells.iter().copied());
        match iqr_bounds(&values) {
            Some(bounds) => values.iter().filter(|&&v| bounds.is_outlier(v)).count(),
            None => 0,
        }
    } else {
        0
    };

    Ok(ColumnStats {
        column: column.to_string(),
        null_count,
        unique_count,
        inferred_type,
        has_outliers: outlier_count > 0,
        outlier_count,
    })
}

/// Statistics for every column, in column order.
pub fn table_stats(table: &Table) -> Vec<ColumnStats> {
    table
        .columns()
        .iter()
        .filter_map(|c| column_stats(table, c).ok())
        .collect()
}

/// Count, min, max and mean of the numeric readings in a column.
pub fn numeric_summary(table: &Table, column: &str) -> Result<Option<NumericSummary>, TableError> {
    let cells = table.column_cells(column)?;
    let values = numeric_values(cells.iter().copied());

    let Some(avg) = mean(&values) else {
        return Ok(None);
    };

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Ok(Some(NumericSummary {
        count: values.len(),
        min,
        max,
        mean: avg,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(values: &[f64]) -> Table {
        Table::from_cells(&["v"], values.iter().map(|&v| vec![Cell::Number(v)]).collect()).unwrap()
    }

    #[test]
    fn test_iqr_nearest_rank() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 100.0];
        let bounds = iqr_bounds(&values).unwrap();

        assert_eq!(bounds.q1, 3.0);
        assert_eq!(bounds.q3, 8.0);
        assert_eq!(bounds.iqr(), 5.0);
        assert_eq!(bounds.lower, -4.5);
        assert_eq!(bounds.upper, 15.5);
        assert!(bounds.is_outlier(100.0));
        for v in 1..=9 {
            assert!(!bounds.is_outlier(v as f64));
        }
    }

    #[test]
    fn test_iqr_unsorted_input() {
        let bounds = iqr_bounds(&[100.0, 9.0, 1.0, 8.0, 2.0, 7.0, 3.0, 6.0, 4.0, 5.0]).unwrap();
        assert_eq!((bounds.q1, bounds.q3), (3.0, 8.0));
    }

    #[test]
    fn test_iqr_empty() {
        assert!(iqr_bounds(&[]).is_none());
    }

    #[test]
    fn test_outlier_stats() {
        let table = numbers(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 100.0]);
        let stats = column_stats(&table, "v").unwrap();

        assert_eq!(stats.inferred_type, CellType::Number);
        assert!(stats.has_outliers);
        assert_eq!(stats.outlier_count, 1);
        assert_eq!(stats.null_count, 0);
        assert_eq!(stats.unique_count, 10);
    }

    #[test]
    fn test_stats_idempotent() {
        let table = Table::from_cells(
            &["a"],
            vec![vec![Cell::text("x")], vec![Cell::Null], vec![Cell::text("x")], vec![Cell::text("")]],
        )
        .unwrap();

        let first = column_stats(&table, "a").unwrap();
        let second = column_stats(&table, "a").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.null_count, 2);
        // "x", null and "" are three distinct raw values
        assert_eq!(first.unique_count, 3);
    }

    #[test]
    fn test_all_null_column() {
        let table = Table::from_cells(&["a"], vec![vec![Cell::Null], vec![Cell::Null]]).unwrap();
        let stats = column_stats(&table, "a").unwrap();

        assert_eq!(stats.null_count, 2);
        assert_eq!(stats.unique_count, 1);
        assert_eq!(stats.inferred_type, CellType::String);
        assert!(!stats.has_outliers);
    }

    #[test]
    fn test_numeric_text_infers_number() {
        let cells = [Cell::text("1"), Cell::text(" 2.5"), Cell::Null, Cell::Number(4.0)];
        assert_eq!(infer_type(cells.iter()), CellType::Number);
    }

    #[test]
    fn test_infer_boolean_and_string() {
        let bools = [Cell::Boolean(true), Cell::Boolean(false)];
        assert_eq!(infer_type(bools.iter()), CellType::Boolean);

        let mixed = [Cell::text("abc"), Cell::Number(1.0)];
        assert_eq!(infer_type(mixed.iter()), CellType::String);
    }

    #[test]
    fn test_infer_date() {
        let dates = [
            Cell::text("2024-01-05T00:00:00.000Z"),
            Cell::text("2024-02-01T12:30:00.000Z"),
        ];
        assert_eq!(infer_type(dates.iter()), CellType::Date);

        let not_all = [Cell::text("2024-01-05T00:00:00.000Z"), Cell::text("soon")];
        assert_eq!(infer_type(not_all.iter()), CellType::String);
    }

    #[test]
    fn test_non_numeric_column_has_no_outliers() {
        let table = Table::from_cells(
            &["name"],
            vec![vec![Cell::text("a")], vec![Cell::text("b")], vec![Cell::text("zzzzzzzz")]],
        )
        .unwrap();
        let stats = column_stats(&table, "name").unwrap();
        assert_eq!(stats.outlier_count, 0);
    }

    #[test]
    fn test_unknown_column() {
        let table = numbers(&[1.0]);
        assert_eq!(
            column_stats(&table, "nope").unwrap_err(),
            TableError::UnknownColumn("nope".into())
        );
    }

    #[test]
    fn test_table_stats_in_column_order() {
        let table = Table::from_cells(&["b", "a"], vec![vec![Cell::Number(1.0), Cell::text("x")]]).unwrap();
        let stats = table_stats(&table);
        let names: Vec<_> = stats.iter().map(|s| s.column.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_numeric_summary() {
        let table = numbers(&[2.0, 4.0, 9.0]);
        let summary = numeric_summary(&table, "v").unwrap().unwrap();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.min, 2.0);
        assert_eq!(summary.max, 9.0);
        assert_eq!(summary.mean, 5.0);
    }

    #[test]
    fn test_stats_serialize_camel_case() {
        let stats = column_stats(&numbers(&[1.0]), "v").unwrap();
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["nullCount"], 0);
        assert_eq!(json["inferredType"], "number");
        assert_eq!(json["hasOutliers"], false);
    }
}
