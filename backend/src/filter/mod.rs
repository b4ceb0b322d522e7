//! Row filtering, projection, search and pagination.
//!
//! A [`FilterSpec`] runs three steps in order: substring filter on one
//! column, null-row exclusion, then column projection. None of them change
//! cell values.

use serde::{Deserialize, Serialize};

use crate::error::TableError;
use crate::models::{Cell, Row, Table};

/// Text values treated as null by [`exclude_null_rows`].
const NULL_LITERALS: &[&str] = &["null", "undefined"];

/// Keep rows whose `column` contains `value` (case-insensitive).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFilter {
    pub column: String,
    pub value: String,
}

/// Filter and projection options.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    #[serde(default)]
    pub column_filter: Option<ColumnFilter>,
    #[serde(default)]
    pub exclude_nulls: bool,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column_filter(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.column_filter = Some(ColumnFilter {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    pub fn excluding_nulls(mut self) -> Self {
        self.exclude_nulls = true;
        self
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }
}

/// Apply a filter spec: substring filter, null exclusion, projection.
///
/// An empty column list is no projection.
pub fn apply_filter(table: &Table, spec: &FilterSpec) -> Result<Table, TableError> {
    let mut out = match &spec.column_filter {
        Some(f) => filter_contains(table, &f.column, &f.value)?,
        None => table.clone(),
    };

    if spec.exclude_nulls {
        out = exclude_null_rows(&out);
    }

    match &spec.columns {
        Some(columns) if !columns.is_empty() => out.project(columns),
        _ => Ok(out),
    }
}

/// Rows whose `column` display text contains `needle`, ignoring case.
///
/// An empty needle keeps every row. Missing cells never match.
pub fn filter_contains(table: &Table, column: &str, needle: &str) -> Result<Table, TableError> {
    let idx = table.require_column(column)?;
    if needle.is_empty() {
        return Ok(table.clone());
    }

    let needle = needle.to_lowercase();
    let rows = table
        .rows()
        .iter()
        .filter(|row| cell_contains(row.get(idx), &needle))
        .cloned()
        .collect();

    Ok(table.with_rows(rows))
}

/// Drop every row that has a null, empty, `"null"` or `"undefined"` cell.
pub fn exclude_null_rows(table: &Table) -> Table {
    let width = table.column_count();
    let rows = table
        .rows()
        .iter()
        .filter(|row| !(0..width).any(|i| is_null_like(row.get(i))))
        .cloned()
        .collect();

    table.with_rows(rows)
}

/// Rows where any column contains `query`, ignoring case.
pub fn search(table: &Table, query: &str) -> Table {
    let query = query.trim();
    if query.is_empty() {
        return table.clone();
    }

    let needle = query.to_lowercase();
    let width = table.column_count();
    let rows = table
        .rows()
        .iter()
        .filter(|row| (0..width).any(|i| cell_contains(row.get(i), &needle)))
        .cloned()
        .collect();

    table.with_rows(rows)
}

fn cell_contains(cell: &Cell, lowered_needle: &str) -> bool {
    !cell.is_missing() && cell.to_string().to_lowercase().contains(lowered_needle)
}

fn is_null_like(cell: &Cell) -> bool {
    match cell {
        Cell::Null => true,
        Cell::Text(s) => s.is_empty() || NULL_LITERALS.contains(&s.as_str()),
        _ => false,
    }
}

// =============================================================================
// Pagination
// =============================================================================

/// One page of rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    /// 1-based, clamped to `1..=total_pages`.
    pub page: usize,
    pub total_pages: usize,
    pub total_rows: usize,
}

/// Slice `table` into pages of `per_page` rows and return page `page` (1-based).
///
/// Out-of-range pages clamp to the nearest valid one. An empty table has a
/// single empty page.
pub fn paginate(table: &Table, page: usize, per_page: usize) -> Page {
    let per_page = per_page.max(1);
    let total_rows = table.row_count();
    let total_pages = total_rows.div_ceil(per_page).max(1);
    let page = page.clamp(1, total_pages);

    let start = (page - 1) * per_page;
    let end = (start + per_page).min(total_rows);
    let rows = table.rows().get(start..end).unwrap_or_default().to_vec();

    Page {
        columns: table.columns().to_vec(),
        rows,
        page,
        total_pages,
        total_rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table::from_cells(
            &["a", "b", "c"],
            vec![
                vec![Cell::Number(1.0), Cell::text("Apple"), Cell::text("x")],
                vec![Cell::Number(2.0), Cell::text("banana"), Cell::text("null")],
                vec![Cell::Number(3.0), Cell::Null, Cell::text("z")],
                vec![Cell::Number(4.0), Cell::text("pineapple")],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_empty_projection_keeps_all_columns() {
        let spec = FilterSpec::new().with_columns(Vec::<String>::new());
        let out = apply_filter(&table(), &spec).unwrap();
        assert_eq!(out.columns(), &["a", "b", "c"]);
        assert_eq!(out, table());
    }

    #[test]
    fn test_exclude_nulls_keeps_complete_rows() {
        let table = Table::from_cells(
            &["a", "b"],
            vec![
                vec![Cell::text("1"), Cell::text("")],
                vec![Cell::text("2"), Cell::text("x")],
                vec![Cell::text("null"), Cell::text("y")],
            ],
        )
        .unwrap();

        let out = exclude_null_rows(&table);
        assert_eq!(out.row_count(), 1);
        assert_eq!(out.value(0, "a"), Some(&Cell::text("2")));
        assert_eq!(out.value(0, "b"), Some(&Cell::text("x")));
    }

    #[test]
    fn test_exclude_nulls_drops_sparse_rows() {
        let out = exclude_null_rows(&table());
        assert_eq!(out.row_count(), 1);
        assert_eq!(out.value(0, "b"), Some(&Cell::text("Apple")));
    }

    #[test]
    fn test_filter_contains_case_insensitive() {
        let out = filter_contains(&table(), "b", "APPLE").unwrap();
        assert_eq!(out.row_count(), 2);
        assert_eq!(out.value(1, "b"), Some(&Cell::text("pineapple")));
    }

    #[test]
    fn test_filter_on_numbers_uses_display_text() {
        let out = filter_contains(&table(), "a", "3").unwrap();
        assert_eq!(out.row_count(), 1);
    }

    #[test]
    fn test_empty_needle_keeps_all() {
        assert_eq!(filter_contains(&table(), "b", "").unwrap().row_count(), 4);
    }

    #[test]
    fn test_filter_unknown_column() {
        assert_eq!(
            filter_contains(&table(), "zzz", "a").unwrap_err(),
            TableError::UnknownColumn("zzz".into())
        );
    }

    #[test]
    fn test_projection() {
        let spec = FilterSpec::new().with_columns(["a", "c"]);
        let out = apply_filter(&table(), &spec).unwrap();
        assert_eq!(out.columns(), &["a", "c"]);
        assert!(out.rows().iter().all(|r| r.len() == 2));
    }

    #[test]
    fn test_apply_filter_order() {
        let spec = FilterSpec::new()
            .with_column_filter("b", "an")
            .excluding_nulls()
            .with_columns(["b"]);
        let out = apply_filter(&table(), &spec).unwrap();
        // banana has c = "null" and is excluded
        assert_eq!(out.row_count(), 0);
        assert_eq!(out.columns(), &["b"]);
    }

    #[test]
    fn test_search_across_columns() {
        assert_eq!(search(&table(), "z").row_count(), 1);
        assert_eq!(search(&table(), "  ").row_count(), 4);
        assert_eq!(search(&table(), "APP").row_count(), 2);
    }

    #[test]
    fn test_paginate() {
        let page = paginate(&table(), 2, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.total_rows, 4);
        assert_eq!(page.rows.len(), 1);

        let clamped = paginate(&table(), 9, 3);
        assert_eq!(clamped.page, 2);

        let empty = Table::from_cells(&["a"], vec![]).unwrap();
        let page = paginate(&empty, 1, 10);
        assert_eq!((page.page, page.total_pages, page.rows.len()), (1, 1, 0));
    }

    #[test]
    fn test_filter_spec_json() {
        let spec: FilterSpec = serde_json::from_str(
            r#"{"columnFilter": {"column": "b", "value": "app"}, "excludeNulls": true}"#,
        )
        .unwrap();
        assert!(spec.exclude_nulls);
        assert_eq!(spec.column_filter.unwrap().column, "b");
        assert!(spec.columns.is_none());
    }
}
