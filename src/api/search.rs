//! Search API endpoints.

use axum::extract::{rejection::QueryRejection, Query, State};
use serde::{Deserialize, Serialize};

use super::{success, ApiResult};
use crate::models::Project;
use crate::AppState;

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Search query string.
    pub q: String,
    /// Maximum number of results (default: 20, clamped to 1..=100).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    20
}

/// Search result with projects and metadata. `total` counts every match.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResultItem>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Single search result item.
#[derive(Debug, Serialize)]
pub struct SearchResultItem {
    pub project: Project,
    pub score: f32,
}

/// Maximum number of search results allowed.
const MAX_SEARCH_LIMIT: usize = 100;

/// GET /api/search - Full-text search over projects.
pub async fn search_projects(
    State(state): State<AppState>,
    params: Result<Query<SearchQuery>, QueryRejection>,
) -> ApiResult<SearchResponse> {
    let Query(params) = params?;
    let limit = params.limit.clamp(1, MAX_SEARCH_LIMIT);

    let hits = state.search.search(&params.q, limit, params.offset)?;

    // Hits for projects deleted since the last commit are skipped
    let mut results = Vec::with_capacity(hits.results.len());
    for hit in hits.results {
        if let Some(project) = state.repo.get_project(&hit.project_id).await? {
            results.push(SearchResultItem {
                project,
                score: hit.score,
            });
        }
    }

    success(SearchResponse {
        results,
        total: hits.total,
        limit,
        offset: params.offset,
    })
}
