//! Result records produced by the import pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Project, ProjectSummary};

/// A single violated validation rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldError {
    /// Dotted path into the document, e.g. `steps.0.resources.1.url`
    pub path: String,
    pub message: String,
    pub code: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, message: impl Into<String>, code: &str) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            code: code.to_string(),
        }
    }
}

/// A persisted project plus any warnings raised while repairing its input.
#[derive(Debug, Clone)]
pub struct ImportedProject {
    pub project: Project,
    pub warnings: Vec<String>,
}

/// Successful element of a batch import.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSuccess {
    pub index: usize,
    pub project: ProjectSummary,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Failed element of a batch import, echoing the raw input back.
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub index: usize,
    pub error: String,
    pub details: Vec<FieldError>,
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct BatchResults {
    pub successful: Vec<BatchSuccess>,
    pub failed: Vec<BatchFailure>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

/// Outcome of a whole batch, in input index order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub results: BatchResults,
    pub summary: BatchSummary,
}

impl BatchReport {
    pub fn new(results: BatchResults) -> Self {
        let summary = BatchSummary {
            total: results.total,
            successful: results.successful.len(),
            failed: results.failed.len(),
        };
        Self { results, summary }
    }
}
