//! Tabular data model.
//!
//! - [`Cell`] - Tagged scalar (null, boolean, number, text, invalid)
//! - [`Row`] - Positional cells aligned with the table's columns
//! - [`Table`] - Ordered rows plus an ordered set of column names
//!
//! Tables are values: every pipeline stage builds a new one and leaves its
//! input untouched.

pub mod cell;

pub use cell::{format_number, parse_number, Cell, CellKey, CellType};

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::error::TableError;

static NULL_CELL: Cell = Cell::Null;

// =============================================================================
// Row
// =============================================================================

/// One table row. Cells past the end of a sparse row read as null.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Row {
    cells: Vec<Cell>,
}

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    /// Cell at `index`, or null when the row is shorter.
    pub fn get(&self, index: usize) -> &Cell {
        self.cells.get(index).unwrap_or(&NULL_CELL)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<Cell> {
        self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Replace the cell at `index`, padding sparse rows with nulls.
    pub(crate) fn set(&mut self, index: usize, cell: Cell) {
        if index >= self.cells.len() {
            self.cells.resize(index + 1, Cell::Null);
        }
        self.cells[index] = cell;
    }
}

impl From<Vec<Cell>> for Row {
    fn from(cells: Vec<Cell>) -> Self {
        Self::new(cells)
    }
}

impl FromIterator<Cell> for Row {
    fn from_iter<I: IntoIterator<Item = Cell>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

// =============================================================================
// Table
// =============================================================================

/// An ordered sequence of rows sharing an ordered, duplicate-free column list.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Build a table, rejecting duplicate column names.
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Result<Self, TableError> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(TableError::DuplicateColumn(column.clone()));
            }
        }
        Ok(Self { columns, rows })
    }

    /// Convenience constructor from column names and raw cell vectors.
    pub fn from_cells(columns: &[&str], rows: Vec<Vec<Cell>>) -> Result<Self, TableError> {
        Self::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.into_iter().map(Row::new).collect(),
        )
    }

    /// Build a table from JSON objects keyed by column name.
    ///
    /// Keys missing from a record read as null; keys not in `columns` are ignored.
    pub fn from_records(columns: Vec<String>, records: &[Map<String, Value>]) -> Result<Self, TableError> {
        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|c| record.get(c).cloned().map(Cell::from).unwrap_or_default())
                    .collect()
            })
            .collect();
        Self::new(columns, rows)
    }

    /// Internal constructor for callers that already hold a valid column set.
    pub(crate) fn from_parts(columns: Vec<String>, rows: Vec<Row>) -> Self {
        debug_assert_eq!(
            columns.iter().collect::<HashSet<_>>().len(),
            columns.len(),
            "column list must be a set"
        );
        Self { columns, rows }
    }

    /// Same columns, different rows.
    pub(crate) fn with_rows(&self, rows: Vec<Row>) -> Self {
        Self {
            columns: self.columns.clone(),
            rows,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of `name`, or [`TableError::UnknownColumn`].
    pub fn require_column(&self, name: &str) -> Result<usize, TableError> {
        self.column_index(name)
            .ok_or_else(|| TableError::UnknownColumn(name.to_string()))
    }

    /// Cell by row position and column name.
    pub fn value(&self, row: usize, column: &str) -> Option<&Cell> {
        let col = self.column_index(column)?;
        self.rows.get(row).map(|r| r.get(col))
    }

    /// All cells of one column, in row order.
    pub fn column_cells(&self, name: &str) -> Result<Vec<&Cell>, TableError> {
        let idx = self.require_column(name)?;
        Ok(self.rows.iter().map(|r| r.get(idx)).collect())
    }

    /// Keep only `columns`, in the given order.
    pub fn project(&self, columns: &[String]) -> Result<Table, TableError> {
        let indices = columns
            .iter()
            .map(|c| self.require_column(c))
            .collect::<Result<Vec<_>, _>>()?;

        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row.get(i).clone()).collect())
            .collect();

        Table::new(columns.to_vec(), rows)
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Row>) {
        (self.columns, self.rows)
    }
}
