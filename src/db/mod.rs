//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for all application data.

mod repository;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            short_desc TEXT NOT NULL,
            long_desc TEXT NOT NULL,
            class_min INTEGER NOT NULL,
            class_max INTEGER NOT NULL,
            level TEXT NOT NULL,
            guidance TEXT NOT NULL,
            prerequisites TEXT NOT NULL DEFAULT '[]',
            duration_hrs INTEGER,
            source_json TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Shared lookups, referenced by name from many projects
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subjects (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS tags (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS project_subjects (
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            subject_id TEXT NOT NULL REFERENCES subjects(id),
            PRIMARY KEY (project_id, subject_id)
        );

        CREATE TABLE IF NOT EXISTS project_tags (
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            tag_id TEXT NOT NULL REFERENCES tags(id),
            PRIMARY KEY (project_id, tag_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tools (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            position INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS steps (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            step_order INTEGER NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            position INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS checklist_items (
            id TEXT PRIMARY KEY,
            step_id TEXT NOT NULL REFERENCES steps(id) ON DELETE CASCADE,
            item_order INTEGER NOT NULL,
            text TEXT NOT NULL,
            position INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS resources (
            id TEXT PRIMARY KEY,
            step_id TEXT NOT NULL REFERENCES steps(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            url TEXT NOT NULL,
            resource_type TEXT NOT NULL,
            position INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS submission_specs (
            project_id TEXT PRIMARY KEY REFERENCES projects(id) ON DELETE CASCADE,
            submission_type TEXT NOT NULL,
            instruction TEXT NOT NULL,
            allowed_types TEXT NOT NULL DEFAULT '[]'
        );
        "#,
    )
    .execute(pool)
    .await?;

    // No cascade: enrollments block project deletion
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS enrollments (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id),
            email TEXT NOT NULL,
            name TEXT NOT NULL,
            school TEXT NOT NULL,
            class_num INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Progress goes away with its enrollment or with the step/item it marks
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS step_progress (
            enrollment_id TEXT NOT NULL REFERENCES enrollments(id) ON DELETE CASCADE,
            step_id TEXT NOT NULL REFERENCES steps(id) ON DELETE CASCADE,
            completed INTEGER NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (enrollment_id, step_id)
        );

        CREATE TABLE IF NOT EXISTS checklist_progress (
            enrollment_id TEXT NOT NULL REFERENCES enrollments(id) ON DELETE CASCADE,
            checklist_item_id TEXT NOT NULL REFERENCES checklist_items(id) ON DELETE CASCADE,
            completed INTEGER NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (enrollment_id, checklist_item_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_projects_title ON projects(title);
        CREATE INDEX IF NOT EXISTS idx_projects_level ON projects(level);
        CREATE INDEX IF NOT EXISTS idx_steps_project ON steps(project_id, step_order);
        CREATE INDEX IF NOT EXISTS idx_checklist_step ON checklist_items(step_id);
        CREATE INDEX IF NOT EXISTS idx_resources_step ON resources(step_id);
        CREATE INDEX IF NOT EXISTS idx_tools_project ON tools(project_id);
        CREATE INDEX IF NOT EXISTS idx_enrollments_project ON enrollments(project_id);
        CREATE INDEX IF NOT EXISTS idx_projects_created ON projects(created_at);
        CREATE INDEX IF NOT EXISTS idx_step_progress_step ON step_progress(step_id);
        CREATE INDEX IF NOT EXISTS idx_checklist_progress_item ON checklist_progress(checklist_item_id);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
