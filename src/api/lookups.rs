//! Subject and tag endpoints.

use axum::extract::State;

use super::{success, ApiResult};
use crate::models::{LookupEntry, LookupKind};
use crate::AppState;

/// GET /api/subjects - List all subjects.
pub async fn list_subjects(State(state): State<AppState>) -> ApiResult<Vec<LookupEntry>> {
    success(state.repo.list_lookups(LookupKind::Subject).await?)
}

/// GET /api/tags - List all tags.
pub async fn list_tags(State(state): State<AppState>) -> ApiResult<Vec<LookupEntry>> {
    success(state.repo.list_lookups(LookupKind::Tag).await?)
}
