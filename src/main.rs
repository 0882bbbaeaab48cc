//! Project Library Backend
//!
//! REST backend for importing, browsing and enrolling in school projects, with
//! SQLite persistence and Tantivy full-text search.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod import;
mod models;
mod search;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use search::SearchIndex;

/// Headroom above the document limit for multipart boundaries and headers.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub search: Arc<SearchIndex>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Project Library Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Index path: {:?}", config.index_path);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!(
        "Upload limits: {} bytes per document, {} bytes per batch",
        config.max_import_bytes,
        config.max_batch_bytes
    );

    if config.admin_key.is_none() {
        tracing::warn!(
            "No admin key configured (PROJECTS_ADMIN_KEY). Import routes are unprotected!"
        );
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    // Initialize search index
    let search = Arc::new(SearchIndex::open(&config.index_path)?);

    // Build initial search index from database
    tracing::info!("Building search index...");
    let projects = repo.list_all_projects().await?;
    search.rebuild(&projects).await?;

    let state = AppState {
        repo,
        search,
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let admin_key = state.config.admin_key.clone();
    let import_limit = state.config.max_import_bytes + MULTIPART_OVERHEAD;
    let batch_limit = state.config.max_batch_bytes + MULTIPART_OVERHEAD;

    // Admin routes: imports and project management
    let admin_routes = Router::new()
        .route(
            "/projects/import",
            post(api::import_project_file).layer(DefaultBodyLimit::max(import_limit)),
        )
        .route(
            "/projects/import-json",
            post(api::import_project_json).layer(DefaultBodyLimit::max(import_limit)),
        )
        .route(
            "/projects/import-batch",
            post(api::import_project_batch).layer(DefaultBodyLimit::max(batch_limit)),
        )
        .route("/admin/projects", get(api::list_admin_projects))
        .route(
            "/admin/projects/{id}",
            get(api::get_project_by_id).delete(api::delete_project),
        )
        .route("/admin/stats", get(api::get_stats))
        .layer(middleware::from_fn(move |req, next| {
            auth::admin_auth_layer(admin_key.clone(), req, next)
        }));

    // Public routes: browsing, search and enrollment
    let public_routes = Router::new()
        .route("/projects", get(api::list_projects))
        .route("/projects/{slug}", get(api::get_project))
        .route("/search", get(api::search_projects))
        .route("/subjects", get(api::list_subjects))
        .route("/tags", get(api::list_tags))
        .route("/enrollments", post(api::create_enrollment))
        .route("/enrollments/{id}", get(api::get_enrollment))
        .route(
            "/enrollments/{id}/checklist",
            patch(api::update_checklist_progress),
        )
        .route("/enrollments/{id}/step", patch(api::update_step_progress));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", public_routes.merge(admin_routes))
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
