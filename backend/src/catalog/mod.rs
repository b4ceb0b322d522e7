//! Dataset catalog.
//!
//! Static dataset descriptors loaded from JSON, with the discovery search:
//! free text over title, description and tags, plus exact (case-insensitive)
//! tag matches for categories and payment types.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{IngestionError, PipelineResult, ReadError};

/// Tag marking a paid dataset.
pub const PAID_TAG: &str = "paid";

/// Tag marking a free dataset.
pub const FREE_TAG: &str = "free";

/// Display metadata for one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetDescriptor {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub rows: u64,
    #[serde(default)]
    pub columns: u64,
    /// Creation date as shown (`2023-10-15`).
    #[serde(default)]
    pub created: String,
    /// Human-readable size (`2.3 GB`).
    #[serde(default)]
    pub file_size: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl DatasetDescriptor {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    pub fn is_paid(&self) -> bool {
        self.has_tag(PAID_TAG)
    }

    pub fn is_free(&self) -> bool {
        self.has_tag(FREE_TAG)
    }

    fn matches_text(&self, lowered: &str) -> bool {
        self.title.to_lowercase().contains(lowered)
            || self.description.to_lowercase().contains(lowered)
            || self.tags.iter().any(|t| t.to_lowercase().contains(lowered))
    }
}

/// Search criteria. Empty fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogQuery {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub payment_types: Vec<String>,
}

impl CatalogQuery {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    pub fn with_payment_type(mut self, payment_type: impl Into<String>) -> Self {
        self.payment_types.push(payment_type.into());
        self
    }
}

/// A list of dataset descriptors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    datasets: Vec<DatasetDescriptor>,
}

impl Catalog {
    pub fn new(datasets: Vec<DatasetDescriptor>) -> Self {
        Self { datasets }
    }

    /// Parse a JSON array of descriptors.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load a catalog file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ReadError::File {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content).map_err(|source| {
            IngestionError::InvalidJson {
                path: path.display().to_string(),
                source,
            }
            .into()
        })
    }

    pub fn datasets(&self) -> &[DatasetDescriptor] {
        &self.datasets
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&DatasetDescriptor> {
        self.datasets.iter().find(|d| d.id == id)
    }

    /// Datasets matching every non-empty criterion of `query`, in catalog order.
    pub fn search(&self, query: &CatalogQuery) -> Vec<&DatasetDescriptor> {
        let text = query.text.trim().to_lowercase();

        self.datasets
            .iter()
            .filter(|d| text.is_empty() || d.matches_text(&text))
            .filter(|d| query.categories.is_empty() || query.categories.iter().any(|c| d.has_tag(c)))
            .filter(|d| query.payment_types.is_empty() || query.payment_types.iter().any(|p| d.has_tag(p)))
            .collect()
    }

    /// Number of datasets tagged with `category`.
    pub fn count_in_category(&self, category: &str) -> usize {
        self.datasets.iter().filter(|d| d.has_tag(category)).count()
    }
}
