//! Request/response client for the dataset and model-configuration backend.

pub mod client;
pub mod multipart;
pub mod types;
pub mod validate;

pub use client::BackendClient;
pub use types::{
    Ack, ColumnHistogram, ColumnSummary, ComparisonSummary, DataSummary, FeatureScaling,
    MissingValueReport, NetworkParameters, ProcessingOptions, SplitSizes,
};
