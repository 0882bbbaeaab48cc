//! Project import pipeline.
//!
//! Raw uploads are parsed into untyped JSON values, turned into a
//! [`ProjectDocument`](crate::models::ProjectDocument) by either the strict
//! validator or the lenient normalizer, planned by the mapper and persisted
//! atomically by the repository.

pub mod mapper;
pub mod normalize;
pub mod validate;

use serde_json::Value;
use thiserror::Error;

use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{
    BatchFailure, BatchReport, BatchResults, BatchSuccess, FieldError, ImportedProject,
};

use mapper::MappingError;

/// How incoming documents are turned into project documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportMode {
    /// Reject any document that does not conform exactly.
    #[default]
    Strict,
    /// Repair what can be repaired and report warnings.
    Lenient,
}

impl ImportMode {
    pub fn from_lenient_flag(lenient: bool) -> Self {
        if lenient {
            ImportMode::Lenient
        } else {
            ImportMode::Strict
        }
    }
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error("Failed to persist project: {0}")]
    Persistence(#[source] AppError),
}

impl ImportError {
    /// Field-level details reported for a failed batch item.
    pub fn details(&self) -> Vec<FieldError> {
        match self {
            ImportError::Validation(errors) => errors.clone(),
            _ => Vec::new(),
        }
    }
}

impl From<ImportError> for AppError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Validation(errors) => AppError::Validation {
                detail: "Project document failed validation".to_string(),
                errors,
            },
            ImportError::Mapping(MappingError::Serialize { field, source }) => {
                AppError::Internal(format!("Failed to serialize {}: {}", field, source))
            }
            ImportError::Mapping(err) => AppError::Mapping(err.to_string()),
            // constraint violations stay caller-fixable
            ImportError::Persistence(AppError::Conflict(msg)) => AppError::Conflict(msg),
            ImportError::Persistence(err) => {
                AppError::Database(format!("Failed to persist project: {}", err.message()))
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Batch document must be an array of projects")]
    NotAnArray,
    #[error("Batch document contains no projects")]
    Empty,
}

impl From<ParseError> for AppError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Empty => AppError::BadRequest(err.to_string()),
            _ => AppError::Parse(err.to_string()),
        }
    }
}

/// Serialization format of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Pick the format from the upload's file name, then its content type.
    /// Defaults to JSON.
    pub fn detect(filename: Option<&str>, content_type: Option<&str>) -> Self {
        if let Some(name) = filename {
            let name = name.to_ascii_lowercase();
            if name.ends_with(".yaml") || name.ends_with(".yml") {
                return DocumentFormat::Yaml;
            }
            if name.ends_with(".json") {
                return DocumentFormat::Json;
            }
        }

        match content_type {
            Some(ct) if ct.to_ascii_lowercase().contains("yaml") => DocumentFormat::Yaml,
            _ => DocumentFormat::Json,
        }
    }
}

/// Parse one document into an untyped value.
pub fn parse_document(bytes: &[u8], format: DocumentFormat) -> Result<Value, ParseError> {
    let value = match format {
        DocumentFormat::Json => serde_json::from_slice(bytes)?,
        DocumentFormat::Yaml => serde_yaml::from_slice(bytes)?,
    };
    Ok(value)
}

/// Parse a batch upload, which must hold a non-empty array at the top level.
pub fn parse_batch(bytes: &[u8], format: DocumentFormat) -> Result<Vec<Value>, ParseError> {
    match parse_document(bytes, format)? {
        Value::Array(items) if items.is_empty() => Err(ParseError::Empty),
        Value::Array(items) => Ok(items),
        _ => Err(ParseError::NotAnArray),
    }
}

/// Reject uploads larger than `limit` bytes.
pub fn ensure_within_limit(len: usize, limit: usize) -> Result<(), AppError> {
    if len > limit {
        return Err(AppError::PayloadTooLarge(format!(
            "Upload of {} bytes exceeds the {} byte limit",
            len, limit
        )));
    }
    Ok(())
}

/// Import a single raw document.
pub async fn import_document(
    repo: &Repository,
    input: &Value,
    mode: ImportMode,
) -> Result<ImportedProject, ImportError> {
    let (document, warnings) = match mode {
        ImportMode::Strict => (
            validate::validate_document(input).map_err(ImportError::Validation)?,
            Vec::new(),
        ),
        ImportMode::Lenient => {
            let normalized = normalize::normalize_document(input);
            (normalized.document, normalized.warnings)
        }
    };

    let plan = mapper::plan(&document, input)?;
    let id = repo
        .apply_plan(&plan)
        .await
        .map_err(ImportError::Persistence)?;

    let project = repo
        .get_project(&id)
        .await
        .map_err(ImportError::Persistence)?
        .ok_or_else(|| {
            ImportError::Persistence(AppError::Internal(format!(
                "Project {} vanished after import",
                id
            )))
        })?;

    tracing::info!(
        "Imported project {} ({}) with {} warnings",
        project.slug,
        project.id,
        warnings.len()
    );

    Ok(ImportedProject { project, warnings })
}

/// Import documents one after another, isolating failures per item.
///
/// Results keep input indices; a failed item never prevents later items from
/// being attempted.
pub async fn import_documents(
    repo: &Repository,
    documents: Vec<Value>,
    mode: ImportMode,
) -> BatchReport {
    let mut results = BatchResults {
        total: documents.len(),
        ..Default::default()
    };

    for (index, data) in documents.into_iter().enumerate() {
        match import_document(repo, &data, mode).await {
            Ok(imported) => results.successful.push(BatchSuccess {
                index,
                project: imported.project.summary(),
                warnings: imported.warnings,
            }),
            Err(err) => {
                tracing::warn!("Batch item {} failed: {}", index, err);
                results.failed.push(BatchFailure {
                    index,
                    error: err.to_string(),
                    details: err.details(),
                    data,
                });
            }
        }
    }

    let report = BatchReport::new(results);
    tracing::info!(
        "Batch import finished: {} total, {} successful, {} failed",
        report.summary.total,
        report.summary.successful,
        report.summary.failed
    );
    report
}
