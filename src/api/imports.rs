//! Project import endpoints (admin only).

use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{BytesRejection, QueryRejection},
        Multipart, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use super::refresh_search_index;
use crate::errors::AppError;
use crate::import::{self, DocumentFormat, ImportMode};
use crate::models::{BatchReport, ImportedProject, ProjectSummary};
use crate::AppState;

/// Multipart field holding the uploaded document.
const FILE_FIELD: &str = "file";

#[derive(Debug, Default, Deserialize)]
pub struct ImportParams {
    /// Repair invalid documents instead of rejecting them.
    #[serde(default)]
    pub lenient: bool,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub success: bool,
    pub project: ProjectSummary,
    pub warnings: Vec<String>,
}

impl From<ImportedProject> for ImportResponse {
    fn from(imported: ImportedProject) -> Self {
        Self {
            success: true,
            project: imported.project.summary(),
            warnings: imported.warnings,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchImportResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: BatchReport,
}

/// POST /api/projects/import - Import one JSON or YAML file (strict).
pub async fn import_project_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ImportResponse>, AppError> {
    let multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let upload = read_upload(multipart, state.config.max_import_bytes).await?;

    let input = import::parse_document(&upload.bytes, upload.format())?;
    let imported = import::import_document(&state.repo, &input, ImportMode::Strict).await?;

    if let Err(e) = state.search.index_project(&imported.project).await {
        tracing::warn!("Failed to index project {}: {}", imported.project.id, e);
    }

    Ok(Json(imported.into()))
}

/// POST /api/projects/import-json - Import a raw JSON body.
///
/// `?lenient=true` repairs the document and reports what was changed.
pub async fn import_project_json(
    State(state): State<AppState>,
    params: Result<Query<ImportParams>, QueryRejection>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<ImportResponse>, AppError> {
    let Query(params) = params?;
    let body = body.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(e.body_text())
        } else {
            AppError::BadRequest(e.body_text())
        }
    })?;
    import::ensure_within_limit(body.len(), state.config.max_import_bytes)?;

    let input = import::parse_document(&body, DocumentFormat::Json)?;
    let mode = ImportMode::from_lenient_flag(params.lenient);
    let imported = import::import_document(&state.repo, &input, mode).await?;

    if let Err(e) = state.search.index_project(&imported.project).await {
        tracing::warn!("Failed to index project {}: {}", imported.project.id, e);
    }

    Ok(Json(imported.into()))
}

/// POST /api/projects/import-batch - Import a JSON or YAML array of projects.
pub async fn import_project_batch(
    State(state): State<AppState>,
    params: Result<Query<ImportParams>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<BatchImportResponse>, AppError> {
    let Query(params) = params?;
    let multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let upload = read_upload(multipart, state.config.max_batch_bytes).await?;

    let documents = import::parse_batch(&upload.bytes, upload.format())?;
    tracing::info!(
        "Importing batch of {} projects from {}",
        documents.len(),
        upload.filename.as_deref().unwrap_or("upload")
    );

    let mode = ImportMode::from_lenient_flag(params.lenient);
    let report = import::import_documents(&state.repo, documents, mode).await;

    if report.summary.successful > 0 {
        refresh_search_index(&state).await;
    }

    Ok(Json(BatchImportResponse {
        success: true,
        report,
    }))
}

struct Upload {
    filename: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

impl Upload {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::detect(self.filename.as_deref(), self.content_type.as_deref())
    }
}

/// Collect the `file` field, failing with 413 as soon as it grows past `limit`.
async fn read_upload(mut multipart: Multipart, limit: usize) -> Result<Upload, AppError> {
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);

        let mut bytes = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            import::ensure_within_limit(bytes.len() + chunk.len(), limit)?;
            bytes.extend_from_slice(&chunk);
        }

        return Ok(Upload {
            filename,
            content_type,
            bytes,
        });
    }

    Err(AppError::BadRequest(format!(
        "Missing multipart field '{}'",
        FILE_FIELD
    )))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(err.body_text())
    }
}
