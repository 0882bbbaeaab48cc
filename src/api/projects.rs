//! Public project browse endpoints.

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::{Project, ProjectPage, ProjectsQuery};
use crate::AppState;

/// Largest page a client may request.
const MAX_PAGE_SIZE: i64 = 100;

/// GET /api/projects - Filtered, paginated project cards.
pub async fn list_projects(
    State(state): State<AppState>,
    query: Result<Query<ProjectsQuery>, QueryRejection>,
) -> Result<Json<ProjectPage>, AppError> {
    let Query(query) = query?;
    check_paging(query.page, query.page_size)?;
    if let Some(class) = query.class {
        if !(1..=12).contains(&class) {
            return Err(AppError::BadRequest(
                "class must be between 1 and 12".to_string(),
            ));
        }
    }

    let page = state.repo.list_projects(&query).await?;
    Ok(Json(page))
}

/// GET /api/projects/{slug} - Full project with steps.
pub async fn get_project(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Project> {
    match state.repo.get_project_by_slug(&slug).await? {
        Some(project) => success(project),
        None => Err(AppError::NotFound(format!("Project {} not found", slug))),
    }
}

/// Reject pages below 1 and page sizes outside `1..=MAX_PAGE_SIZE`.
pub(super) fn check_paging(page: i64, page_size: i64) -> Result<(), AppError> {
    if page < 1 {
        return Err(AppError::BadRequest("page must be at least 1".to_string()));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(AppError::BadRequest(format!(
            "pageSize must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }
    Ok(())
}
