//! REST API module.
//!
//! Public browse/enrollment routes and admin-only import and management routes.

mod admin;
mod enrollments;
mod imports;
mod lookups;
mod projects;
mod search;

pub use admin::*;
pub use enrollments::*;
pub use imports::*;
pub use lookups::*;
pub use projects::*;
pub use search::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::AppState;

/// Success response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, crate::errors::AppError>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data))
}

/// Rebuild the search index from the database. Failures are logged, not
/// returned: the database stays the source of truth.
pub async fn refresh_search_index(state: &AppState) {
    match state.repo.list_all_projects().await {
        Ok(projects) => {
            if let Err(e) = state.search.rebuild(&projects).await {
                tracing::warn!("Failed to rebuild search index: {}", e);
            }
        }
        Err(e) => tracing::warn!("Failed to load projects for indexing: {}", e),
    }
}
