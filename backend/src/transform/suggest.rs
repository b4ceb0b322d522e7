//! Automatic transform suggestions.
//!
//! Looks at column statistics and proposes a [`TransformSpec`] without
//! applying it:
//!
//! - partially missing numeric columns are filled with their mean (2 dp)
//! - partially missing other columns are filled with `"Unknown"`
//! - numeric columns with outliers get outlier removal

use crate::models::{format_number, CellType, Table};
use crate::stats::{column_stats, mean, numeric_values};

use super::spec::{ColumnTransform, TransformSpec};

/// Fill value proposed for non-numeric columns.
pub const UNKNOWN_FILL: &str = "Unknown";

/// Propose a transform spec for `table`.
pub fn auto_suggest(table: &Table) -> TransformSpec {
    let rows = table.row_count();
    let mut spec = TransformSpec::new();

    for name in table.columns() {
        let Ok(stats) = column_stats(table, name) else {
            continue;
        };
        let numeric = stats.inferred_type == CellType::Number;
        let mut directive = ColumnTransform::new();

        if stats.null_count > 0 && stats.null_count < rows {
            let fill = if numeric {
                table
                    .column_cells(name)
                    .ok()
                    .and_then(|cells| mean(&numeric_values(cells)))
                    .map(|m| format_number(round_2dp(m)))
            } else {
                None
            };
            directive = directive.fill_na(fill.unwrap_or_else(|| UNKNOWN_FILL.to_string()));
        }

        if numeric && stats.has_outliers {
            directive = directive.remove_outliers();
        }

        if !directive.is_noop() {
            spec = spec.with_transform(name.clone(), directive);
        }
    }

    spec
}

fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;

    #[test]
    fn test_numeric_fill_uses_mean() {
        let table = Table::from_cells(
            &["n"],
            vec![vec![Cell::Number(1.0)], vec![Cell::Number(2.0)], vec![Cell::Null]],
        )
        .unwrap();

        let spec = auto_suggest(&table);
        assert_eq!(spec.transforms["n"].fill_value(), Some("1.5"));
        assert!(!spec.transforms["n"].remove_outliers);
    }

    #[test]
    fn test_mean_rounded_to_two_places() {
        let table = Table::from_cells(
            &["n"],
            vec![
                vec![Cell::Number(1.0)],
                vec![Cell::Number(1.0)],
                vec![Cell::Number(2.0)],
                vec![Cell::text("")],
            ],
        )
        .unwrap();

        let spec = auto_suggest(&table);
        assert_eq!(spec.transforms["n"].fill_value(), Some("1.33"));
    }

    #[test]
    fn test_text_fill_unknown() {
        let table = Table::from_cells(
            &["name"],
            vec![vec![Cell::text("a")], vec![Cell::Null]],
        )
        .unwrap();

        let spec = auto_suggest(&table);
        assert_eq!(spec.transforms["name"].fill_value(), Some(UNKNOWN_FILL));
    }

    #[test]
    fn test_outliers_suggested() {
        let rows = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 100.0]
            .iter()
            .map(|&v| vec![Cell::Number(v)])
            .collect();
        let table = Table::from_cells(&["v"], rows).unwrap();

        let spec = auto_suggest(&table);
        assert!(spec.transforms["v"].remove_outliers);
        assert!(spec.transforms["v"].fill_na.is_none());
    }

    #[test]
    fn test_no_suggestion_for_clean_or_empty_columns() {
        let table = Table::from_cells(
            &["full", "empty"],
            vec![vec![Cell::text("a"), Cell::Null], vec![Cell::text("b"), Cell::Null]],
        )
        .unwrap();

        let spec = auto_suggest(&table);
        assert!(spec.is_empty());
    }
}
