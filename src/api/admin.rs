//! Admin project management endpoints.

use axum::extract::{rejection::QueryRejection, Path, Query, State};

use super::projects::check_paging;
use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::{AdminProjectPage, AdminProjectsQuery, AdminStats, Project};
use crate::AppState;

/// GET /api/admin/projects - Paginated project table, newest first.
pub async fn list_admin_projects(
    State(state): State<AppState>,
    query: Result<Query<AdminProjectsQuery>, QueryRejection>,
) -> ApiResult<AdminProjectPage> {
    let Query(query) = query?;
    check_paging(query.page, query.page_size)?;

    success(state.repo.list_admin_projects(&query).await?)
}

/// GET /api/admin/projects/{id} - Get a project by ID.
pub async fn get_project_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Project> {
    match state.repo.get_project(&id).await? {
        Some(project) => success(project),
        None => Err(AppError::NotFound(format!("Project {} not found", id))),
    }
}

/// DELETE /api/admin/projects/{id} - Delete a project without enrollments.
pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.repo.delete_project(&id).await?;
    tracing::info!("Deleted project {}", id);

    if let Err(e) = state.search.remove_project(&id).await {
        tracing::warn!("Failed to remove project from index: {}", e);
    }

    success(())
}

/// GET /api/admin/stats - Dashboard counters.
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<AdminStats> {
    success(state.repo.stats().await?)
}
