use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Dataset-derived parameters used to size the input and output layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkParameters {
    pub num_label_classes: usize,
    pub num_cols: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub data_type: String,
    #[serde(default)]
    pub missing_values: u64,
    #[serde(default)]
    pub percent_missing: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSummary {
    pub columns: Vec<String>,
    #[serde(default)]
    pub summary: BTreeMap<String, ColumnSummary>,
    #[serde(default)]
    pub row_count: u64,
}

impl DataSummary {
    /// Per-column rows in the backend's column order.
    pub fn rows(&self) -> impl Iterator<Item = (&str, Option<&ColumnSummary>)> {
        self.columns.iter().map(|c| (c.as_str(), self.summary.get(c)))
    }
}

/// Value counts for one column, as returned by the visualization endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnHistogram {
    pub labels: Vec<Value>,
    pub values: Vec<u64>,
}

impl ColumnHistogram {
    /// Labels as display text; JSON strings lose their quotes.
    pub fn label_text(&self) -> Vec<String> {
        self.labels
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()
    }
}

/// Row counts of each partition after a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSizes {
    pub train_size: u64,
    pub validation_size: u64,
    pub test_size: u64,
    pub total_size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingValueReport {
    #[serde(default)]
    pub missing_values: BTreeMap<String, u64>,
    #[serde(default)]
    pub missing_percentage: BTreeMap<String, f64>,
    #[serde(default)]
    pub num_rows: u64,
    #[serde(default)]
    pub duplicate_rows: u64,
}

/// Dataset quality before and after processing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    #[serde(default)]
    pub before: Option<MissingValueReport>,
    #[serde(default)]
    pub after: Option<MissingValueReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureScaling {
    Normalization,
    Standardization,
}

impl FeatureScaling {
    pub fn parse(s: &str) -> Option<FeatureScaling> {
        match s {
            "normalization" => Some(FeatureScaling::Normalization),
            "standardization" => Some(FeatureScaling::Standardization),
            _ => None,
        }
    }
}

/// Cleaning and feature-processing steps to apply on the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingOptions {
    pub remove_duplicates: bool,
    pub handle_missing_values: bool,
    pub encode_categorical: bool,
    pub feature_scaling: Option<FeatureScaling>,
}

impl ProcessingOptions {
    pub fn any_selected(&self) -> bool {
        self.remove_duplicates
            || self.handle_missing_values
            || self.encode_categorical
            || self.feature_scaling.is_some()
    }
}

/// Generic `{ "message": ... }` acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub message: Option<String>,
}
