//! Chart data and dashboard configuration.
//!
//! Chart helpers read a [`Table`] and produce plain data points; rendering
//! is left to clients. Dashboards are saved chart layouts checked against
//! the table they will be drawn from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{TableError, ValidationError};
use crate::models::{Cell, Table};

/// Label used for missing values in category counts.
pub const NULL_LABEL: &str = "null";

// =============================================================================
// Chart data
// =============================================================================

/// One labelled numeric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub label: String,
    pub value: f64,
}

/// How y values sharing an x label are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// One point per row.
    #[default]
    None,
    Sum,
    Average,
    Count,
    Min,
    Max,
}

fn label_of(cell: &Cell) -> String {
    if cell.is_missing() {
        NULL_LABEL.to_string()
    } else {
        cell.to_string()
    }
}

/// Value counts of a column in first-seen order (pie and donut charts).
pub fn category_counts(table: &Table, column: &str) -> Result<Vec<DataPoint>, TableError> {
    let cells = table.column_cells(column)?;

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut points: Vec<DataPoint> = Vec::new();
    for cell in cells {
        let label = label_of(cell);
        match index.get(&label) {
            Some(&i) => points[i].value += 1.0,
            None => {
                index.insert(label.clone(), points.len());
                points.push(DataPoint { label, value: 1.0 });
            }
        }
    }

    Ok(points)
}

/// Raw `(x, y)` points (bar, line and area charts).
///
/// Rows whose y cell has no numeric reading are skipped.
pub fn series(table: &Table, x: &str, y: &str) -> Result<Vec<DataPoint>, TableError> {
    let xi = table.require_column(x)?;
    let yi = table.require_column(y)?;

    Ok(table
        .rows()
        .iter()
        .filter_map(|row| {
            row.get(yi).as_number().map(|value| DataPoint {
                label: label_of(row.get(xi)),
                value,
            })
        })
        .collect())
}

/// Points grouped by x label (first-seen order) and combined with `agg`.
///
/// `Count` counts rows per label whatever the y column holds.
pub fn aggregate(table: &Table, x: &str, y: &str, agg: Aggregation) -> Result<Vec<DataPoint>, TableError> {
    if agg == Aggregation::None {
        return series(table, x, y);
    }

    let xi = table.require_column(x)?;
    let yi = table.require_column(y)?;

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<f64>, usize)> = Vec::new();
    for row in table.rows() {
        let label = label_of(row.get(xi));
        let i = *index.entry(label.clone()).or_insert_with(|| {
            groups.push((label, Vec::new(), 0));
            groups.len() - 1
        });
        groups[i].2 += 1;
        if let Some(v) = row.get(yi).as_number() {
            groups[i].1.push(v);
        }
    }

    Ok(groups
        .into_iter()
        .filter_map(|(label, values, rows)| {
            let value = match agg {
                Aggregation::Count => Some(rows as f64),
                _ if values.is_empty() => None,
                Aggregation::Sum => Some(values.iter().sum()),
                Aggregation::Average => Some(values.iter().sum::<f64>() / values.len() as f64),
                Aggregation::Min => values.iter().copied().reduce(f64::min),
                Aggregation::Max => values.iter().copied().reduce(f64::max),
                Aggregation::None => None,
            };
            value.map(|value| DataPoint { label, value })
        })
        .collect())
}

// =============================================================================
// Dashboards
// =============================================================================

/// A chart on a dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartConfig {
    pub id: String,
    /// `bar`, `line`, `pie`, `donut`, `area`, `scatter`, ...
    #[serde(rename = "type")]
    pub chart_type: String,
    pub title: String,
    pub x_axis: String,
    pub y_axis: String,
    #[serde(default)]
    pub aggregation: Aggregation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl ChartConfig {
    pub fn new(chart_type: impl Into<String>, x_axis: impl Into<String>, y_axis: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            chart_type: chart_type.into(),
            title: String::new(),
            x_axis: x_axis.into(),
            y_axis: y_axis.into(),
            aggregation: Aggregation::None,
            color: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    /// Data points for this chart.
    pub fn data(&self, table: &Table) -> Result<Vec<DataPoint>, TableError> {
        match self.chart_type.as_str() {
            "pie" | "donut" => category_counts(table, &self.x_axis),
            _ => aggregate(table, &self.x_axis, &self.y_axis, self.aggregation),
        }
    }

    fn name(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.id
        } else {
            &self.title
        }
    }

    /// Columns this chart reads.
    fn axes(&self) -> Vec<&str> {
        match self.chart_type.as_str() {
            "pie" | "donut" => vec![self.x_axis.as_str()],
            _ => vec![self.x_axis.as_str(), self.y_axis.as_str()],
        }
    }
}

/// A named set of charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub charts: Vec<ChartConfig>,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl Dashboard {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            charts: Vec::new(),
            created: now,
            last_modified: now,
        }
    }

    pub fn add_chart(&mut self, chart: ChartConfig) {
        self.charts.push(chart);
        self.touch();
    }

    /// Remove a chart by id. Returns whether one was removed.
    pub fn remove_chart(&mut self, chart_id: &str) -> bool {
        let before = self.charts.len();
        self.charts.retain(|c| c.id != chart_id);
        let removed = self.charts.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    /// Copy a chart, appending the copy after the original set.
    pub fn duplicate_chart(&mut self, chart_id: &str) -> Option<&ChartConfig> {
        let mut copy = self.charts.iter().find(|c| c.id == chart_id)?.clone();
        copy.id = Uuid::new_v4().to_string();
        if !copy.title.is_empty() {
            copy.title.push_str(" (Copy)");
        }
        self.charts.push(copy);
        self.touch();
        self.charts.last()
    }

    fn touch(&mut self) {
        self.last_modified = Utc::now();
    }

    /// A dashboard needs a non-blank name before it can be saved.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingName);
        }
        Ok(())
    }

    /// [`validate`](Self::validate) plus a check that every chart axis is a column of `table`.
    pub fn validate_against(&self, table: &Table) -> Result<(), ValidationError> {
        self.validate()?;

        for chart in &self.charts {
            for axis in chart.axes() {
                if table.column_index(axis).is_none() {
                    return Err(ValidationError::UnknownAxis {
                        chart: chart.name().to_string(),
                        column: axis.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales() -> Table {
        Table::from_cells(
            &["region", "amount"],
            vec![
                vec![Cell::text("north"), Cell::Number(10.0)],
                vec![Cell::text("south"), Cell::Number(5.0)],
                vec![Cell::text("north"), Cell::Number(20.0)],
                vec![Cell::Null, Cell::text("n/a")],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_category_counts_first_seen_order() {
        let counts = category_counts(&sales(), "region").unwrap();
        let labels: Vec<_> = counts.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["north", "south", "null"]);
        assert_eq!(counts[0].value, 2.0);
    }

    #[test]
    fn test_series_skips_non_numeric() {
        let points = series(&sales(), "region", "amount").unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[2], DataPoint { label: "north".into(), value: 20.0 });
    }

    #[test]
    fn test_aggregate() {
        let sums = aggregate(&sales(), "region", "amount", Aggregation::Sum).unwrap();
        assert_eq!(sums[0], DataPoint { label: "north".into(), value: 30.0 });
        // The null region has no numeric amount
        assert_eq!(sums.len(), 2);

        let avg = aggregate(&sales(), "region", "amount", Aggregation::Average).unwrap();
        assert_eq!(avg[0].value, 15.0);

        let counts = aggregate(&sales(), "region", "amount", Aggregation::Count).unwrap();
        assert_eq!(counts.len(), 3);

        let max = aggregate(&sales(), "region", "amount", Aggregation::Max).unwrap();
        assert_eq!(max[0].value, 20.0);
    }

    #[test]
    fn test_chart_data_by_type() {
        let pie = ChartConfig::new("pie", "region", "");
        assert_eq!(pie.data(&sales()).unwrap().len(), 3);

        let bar = ChartConfig::new("bar", "region", "amount").with_aggregation(Aggregation::Sum);
        assert_eq!(bar.data(&sales()).unwrap().len(), 2);
    }

    #[test]
    fn test_dashboard_name_required() {
        let dashboard = Dashboard::new("   ");
        assert_eq!(dashboard.validate(), Err(ValidationError::MissingName));
        assert!(Dashboard::new("Sales").validate().is_ok());
    }

    #[test]
    fn test_dashboard_unknown_axis() {
        let mut dashboard = Dashboard::new("Sales");
        dashboard.add_chart(ChartConfig::new("bar", "region", "profit").with_title("Profit"));

        assert_eq!(
            dashboard.validate_against(&sales()),
            Err(ValidationError::UnknownAxis {
                chart: "Profit".into(),
                column: "profit".into()
            })
        );
    }

    #[test]
    fn test_pie_ignores_y_axis() {
        let mut dashboard = Dashboard::new("Sales");
        dashboard.add_chart(ChartConfig::new("donut", "region", ""));
        assert!(dashboard.validate_against(&sales()).is_ok());
    }

    #[test]
    fn test_remove_and_duplicate_chart() {
        let mut dashboard = Dashboard::new("Sales");
        let chart = ChartConfig::new("line", "region", "amount").with_title("Trend");
        let id = chart.id.clone();
        dashboard.add_chart(chart);

        let copy_title = dashboard.duplicate_chart(&id).map(|c| c.title.clone());
        assert_eq!(copy_title.as_deref(), Some("Trend (Copy)"));
        assert_eq!(dashboard.charts.len(), 2);

        assert!(dashboard.remove_chart(&id));
        assert!(!dashboard.remove_chart(&id));
        assert_eq!(dashboard.charts.len(), 1);
    }

    #[test]
    fn test_chart_config_json() {
        let chart: ChartConfig = serde_json::from_str(
            r#"{"id": "c1", "type": "bar", "title": "T", "xAxis": "region", "yAxis": "amount", "aggregation": "sum"}"#,
        )
        .unwrap();
        assert_eq!(chart.chart_type, "bar");
        assert_eq!(chart.aggregation, Aggregation::Sum);
    }
}
