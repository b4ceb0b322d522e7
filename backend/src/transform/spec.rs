//! Declarative transform spec.
//!
//! A spec is an optional column allow-list plus one directive per column.
//! It is plain data: it can be built in code, loaded from JSON, or produced by
//! [`auto_suggest`](super::suggest::auto_suggest).
//!
//! ```json
//! {
//!   "select": ["name", "price"],
//!   "transforms": {
//!     "price": { "convertType": "number", "fillNa": "0", "removeOutliers": true },
//!     "name":  { "rename": "product" }
//!   }
//! }
//! ```
//!
//! A bare mapping of column to directive (without `select`/`transforms`) is
//! accepted too.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{TransformError, TransformResult};
use crate::models::{CellType, Table};

/// Transform directive for a single column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ColumnTransform {
    /// New column name. Empty means no rename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,

    /// Replacement for missing cells, applied as text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_na: Option<String>,

    /// Drop rows whose value lies outside the IQR fences.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub remove_outliers: bool,

    /// Target type for conversion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convert_type: Option<CellType>,
}

impl ColumnTransform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.rename = Some(name.into());
        self
    }

    pub fn fill_na(mut self, value: impl Into<String>) -> Self {
        self.fill_na = Some(value.into());
        self
    }

    pub fn remove_outliers(mut self) -> Self {
        self.remove_outliers = true;
        self
    }

    pub fn convert_to(mut self, target: CellType) -> Self {
        self.convert_type = Some(target);
        self
    }

    /// Rename target, if one is set and non-blank.
    pub fn rename_target(&self) -> Option<&str> {
        self.rename
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Fill value, if one is set and non-empty.
    pub fn fill_value(&self) -> Option<&str> {
        self.fill_na.as_deref().filter(|s| !s.is_empty())
    }

    /// Whether this directive does nothing.
    pub fn is_noop(&self) -> bool {
        self.rename_target().is_none()
            && self.fill_value().is_none()
            && !self.remove_outliers
            && self.convert_type.is_none()
    }
}

/// Column selection plus per-column directives.
///
/// Directives are kept in a `BTreeMap` so every step visits columns in
/// sorted order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformSpec {
    /// Source columns to keep, in output order. `None` keeps all columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Vec<String>>,

    /// Directives keyed by source column name.
    #[serde(default)]
    pub transforms: BTreeMap<String, ColumnTransform>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SpecDocument {
    Full(TransformSpec),
    Bare(BTreeMap<String, ColumnTransform>),
}

impl TransformSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a spec from JSON (full document or bare column mapping).
    pub fn from_json(json: &str) -> TransformResult<Self> {
        let doc: SpecDocument = match serde_json::from_str(json) {
            Ok(doc) => doc,
            // Re-parse as the full form for a useful error message
            Err(_) => SpecDocument::Full(serde_json::from_str(json)?),
        };

        Ok(match doc {
            SpecDocument::Full(spec) => spec,
            SpecDocument::Bare(transforms) => Self {
                select: None,
                transforms,
            },
        })
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn with_select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_transform(mut self, column: impl Into<String>, transform: ColumnTransform) -> Self {
        self.transforms.insert(column.into(), transform);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.selected_columns().is_none() && self.transforms.values().all(ColumnTransform::is_noop)
    }

    /// Selected columns with duplicates removed, keeping first occurrence.
    /// An empty selection keeps every column and reads as `None`.
    pub fn selected_columns(&self) -> Option<Vec<String>> {
        self.select.as_ref().filter(|cols| !cols.is_empty()).map(|cols| {
            let mut out: Vec<String> = Vec::with_capacity(cols.len());
            for c in cols {
                if !out.contains(c) {
                    out.push(c.clone());
                }
            }
            out
        })
    }

    /// Column names after selection and renaming, in output order.
    fn output_columns<'a>(&'a self, kept: &'a [String]) -> Vec<(&'a str, &'a str)> {
        kept.iter()
            .map(|c| {
                let target = self
                    .transforms
                    .get(c)
                    .and_then(ColumnTransform::rename_target)
                    .unwrap_or(c.as_str());
                (c.as_str(), target)
            })
            .collect()
    }

    /// Check the spec against a table before any work is done.
    ///
    /// Fails on columns the table does not have and on renames that would
    /// produce two columns with the same name.
    pub fn validate(&self, table: &Table) -> TransformResult<()> {
        let selected = self.selected_columns();

        for column in selected.iter().flatten().chain(self.transforms.keys()) {
            if table.column_index(column).is_none() {
                return Err(TransformError::UnknownColumn(column.clone()));
            }
        }

        let kept = selected.unwrap_or_else(|| table.columns().to_vec());

        let mut by_target: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut order: Vec<&str> = Vec::new();
        for (source, target) in self.output_columns(&kept) {
            let sources = by_target.entry(target).or_default();
            if sources.is_empty() {
                order.push(target);
            }
            sources.push(source);
        }

        for target in order {
            let sources = &by_target[target];
            if sources.len() > 1 {
                return Err(TransformError::RenameCollision {
                    target: target.to_string(),
                    sources: sources.iter().map(|s| s.to_string()).collect(),
                });
            }
        }

        Ok(())
    }
}
