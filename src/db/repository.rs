//! Database repository for project, lookup and enrollment operations.
//!
//! Uses prepared statements and transactions for data integrity.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};

use crate::errors::AppError;
use crate::import::mapper::{ProjectRow, StepKey, WriteCommand, WritePlan};
use crate::models::{
    AdminProjectPage, AdminProjectRow, AdminProjectsQuery, AdminStats, ChecklistItem, ClassRange,
    CreateEnrollmentRequest, Enrollment, EnrollmentProgress, Guidance, Level, LookupEntry,
    LookupKind, Pagination, ProgressTarget, Project, ProjectCard, ProjectPage, ProjectsQuery,
    Resource, Step, SubmissionSpec, SubmissionType,
};

const PROJECT_COLUMNS: &str = "id, slug, title, short_desc, long_desc, class_min, class_max, \
     level, guidance, prerequisites, duration_hrs, created_at, updated_at";

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== IMPORT ====================

    /// Execute a write plan atomically and return the project id.
    ///
    /// An existing project with the same slug is updated in place: its id is
    /// kept, scalar columns are overwritten and every owned collection is
    /// replaced. Any failure rolls back the whole plan.
    pub async fn apply_plan(&self, plan: &WritePlan) -> Result<String, AppError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();

        let project_id = upsert_project_row(&mut tx, &plan.project, &now).await?;
        let mut steps: HashMap<StepKey, String> = HashMap::new();

        for command in &plan.commands {
            match command {
                WriteCommand::LinkLookup { kind, name } => {
                    let lookup_id = fetch_or_create_lookup(&mut tx, *kind, name).await?;
                    let sql = match kind {
                        LookupKind::Subject => {
                            "INSERT INTO project_subjects (project_id, subject_id) VALUES (?, ?)"
                        }
                        LookupKind::Tag => {
                            "INSERT INTO project_tags (project_id, tag_id) VALUES (?, ?)"
                        }
                    };
                    sqlx::query(sql)
                        .bind(&project_id)
                        .bind(&lookup_id)
                        .execute(&mut *tx)
                        .await?;
                }
                WriteCommand::CreateTool { name, position } => {
                    sqlx::query(
                        "INSERT INTO tools (id, project_id, name, position) VALUES (?, ?, ?, ?)",
                    )
                    .bind(new_id())
                    .bind(&project_id)
                    .bind(name)
                    .bind(position)
                    .execute(&mut *tx)
                    .await?;
                }
                WriteCommand::CreateStep {
                    key,
                    order,
                    title,
                    description,
                    position,
                } => {
                    let step_id = new_id();
                    sqlx::query(
                        "INSERT INTO steps (id, project_id, step_order, title, description, position) VALUES (?, ?, ?, ?, ?, ?)"
                    )
                    .bind(&step_id)
                    .bind(&project_id)
                    .bind(order)
                    .bind(title)
                    .bind(description)
                    .bind(position)
                    .execute(&mut *tx)
                    .await?;
                    steps.insert(*key, step_id);
                }
                WriteCommand::CreateChecklistItem {
                    step,
                    order,
                    text,
                    position,
                } => {
                    let step_id = planned_step(&steps, *step)?;
                    sqlx::query(
                        "INSERT INTO checklist_items (id, step_id, item_order, text, position) VALUES (?, ?, ?, ?, ?)"
                    )
                    .bind(new_id())
                    .bind(step_id)
                    .bind(order)
                    .bind(text)
                    .bind(position)
                    .execute(&mut *tx)
                    .await?;
                }
                WriteCommand::CreateResource {
                    step,
                    title,
                    url,
                    kind,
                    position,
                } => {
                    let step_id = planned_step(&steps, *step)?;
                    sqlx::query(
                        "INSERT INTO resources (id, step_id, title, url, resource_type, position) VALUES (?, ?, ?, ?, ?, ?)"
                    )
                    .bind(new_id())
                    .bind(step_id)
                    .bind(title)
                    .bind(url)
                    .bind(kind)
                    .bind(position)
                    .execute(&mut *tx)
                    .await?;
                }
                WriteCommand::CreateSubmission {
                    kind,
                    instruction,
                    allowed_types_json,
                } => {
                    sqlx::query(
                        "INSERT INTO submission_specs (project_id, submission_type, instruction, allowed_types) VALUES (?, ?, ?, ?)"
                    )
                    .bind(&project_id)
                    .bind(kind)
                    .bind(instruction)
                    .bind(allowed_types_json)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;

        Ok(project_id)
    }

    // ==================== PROJECT OPERATIONS ====================

    /// Get a project aggregate by ID.
    pub async fn get_project(&self, id: &str) -> Result<Option<Project>, AppError> {
        let sql = format!("SELECT {} FROM projects WHERE id = ?", PROJECT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.load_project(&row).await?)),
            None => Ok(None),
        }
    }

    /// Get a project aggregate by slug.
    pub async fn get_project_by_slug(&self, slug: &str) -> Result<Option<Project>, AppError> {
        let sql = format!("SELECT {} FROM projects WHERE slug = ?", PROJECT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.load_project(&row).await?)),
            None => Ok(None),
        }
    }

    /// Load every project aggregate, ordered by title.
    pub async fn list_all_projects(&self) -> Result<Vec<Project>, AppError> {
        let sql = format!("SELECT {} FROM projects ORDER BY title, id", PROJECT_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let mut projects = Vec::with_capacity(rows.len());
        for row in &rows {
            projects.push(self.load_project(row).await?);
        }
        Ok(projects)
    }

    /// One page of project cards matching the browse filters.
    pub async fn list_projects(&self, query: &ProjectsQuery) -> Result<ProjectPage, AppError> {
        let tags = query.tag_names();

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM projects p");
        push_project_filters(&mut count, query, &tags);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(
            "SELECT p.id, p.slug, p.title, p.short_desc, p.class_min, p.class_max, p.level, \
             p.guidance, p.duration_hrs, \
             (SELECT COUNT(*) FROM steps s WHERE s.project_id = p.id) AS step_count \
             FROM projects p",
        );
        push_project_filters(&mut select, query, &tags);
        select
            .push(" ORDER BY p.title, p.id LIMIT ")
            .push_bind(query.page_size)
            .push(" OFFSET ")
            .push_bind(page_offset(query.page, query.page_size));
        let rows = select.build().fetch_all(&self.pool).await?;

        let mut data = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.get("id");
            data.push(ProjectCard {
                subjects: self.lookup_names(LookupKind::Subject, &id).await?,
                tags: self.lookup_names(LookupKind::Tag, &id).await?,
                id,
                slug: row.get("slug"),
                title: row.get("title"),
                short_desc: row.get("short_desc"),
                class_min: row.get("class_min"),
                class_max: row.get("class_max"),
                level: parse_level(row.get("level"))?,
                guidance: parse_guidance(row.get("guidance"))?,
                duration_hrs: row.get("duration_hrs"),
                step_count: row.get("step_count"),
            });
        }

        Ok(ProjectPage {
            data,
            page: query.page,
            page_size: query.page_size,
            total,
            total_pages: total_pages(total, query.page_size),
        })
    }

    /// Delete a project and everything it owns.
    ///
    /// Refused while enrollments reference the project.
    pub async fn delete_project(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<String> = sqlx::query_scalar("SELECT id FROM projects WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound(format!("Project {} not found", id)));
        }

        let enrollments: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM enrollments WHERE project_id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if enrollments > 0 {
            return Err(AppError::BadRequest(
                "Cannot delete project with existing enrollments".to_string(),
            ));
        }

        sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn load_project(&self, row: &SqliteRow) -> Result<Project, AppError> {
        let id: String = row.get("id");
        let prerequisites: String = row.get("prerequisites");

        let tools = self.tool_names(&id).await?;

        let submission = sqlx::query(
            "SELECT submission_type, instruction, allowed_types FROM submission_specs WHERE project_id = ?",
        )
        .bind(&id)
        .fetch_optional(&self.pool)
        .await?
        .map(|row| submission_from_row(&row))
        .transpose()?;

        Ok(Project {
            subjects: self.lookup_names(LookupKind::Subject, &id).await?,
            tags: self.lookup_names(LookupKind::Tag, &id).await?,
            steps: self.load_steps(&id).await?,
            id,
            slug: row.get("slug"),
            title: row.get("title"),
            short_desc: row.get("short_desc"),
            long_desc: row.get("long_desc"),
            class_range: ClassRange {
                min: row.get("class_min"),
                max: row.get("class_max"),
            },
            level: parse_level(row.get("level"))?,
            guidance: parse_guidance(row.get("guidance"))?,
            tools,
            prerequisites: parse_json_array("prerequisites", &prerequisites),
            duration_hrs: row.get("duration_hrs"),
            submission,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    /// Steps ascending by order, each with its checklist and resources.
    async fn load_steps(&self, project_id: &str) -> Result<Vec<Step>, AppError> {
        let rows = sqlx::query(
            "SELECT id, step_order, title, description FROM steps WHERE project_id = ? ORDER BY step_order, position",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        let mut steps = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get("id");

            let checklist = sqlx::query(
                "SELECT id, item_order, text FROM checklist_items WHERE step_id = ? ORDER BY item_order, position",
            )
            .bind(&id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|item| ChecklistItem {
                id: item.get("id"),
                order: item.get("item_order"),
                text: item.get("text"),
            })
            .collect();

            let resources = sqlx::query(
                "SELECT id, title, url, resource_type FROM resources WHERE step_id = ? ORDER BY position",
            )
            .bind(&id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|res| Resource {
                id: res.get("id"),
                title: res.get("title"),
                url: res.get("url"),
                kind: res.get("resource_type"),
            })
            .collect();

            steps.push(Step {
                id,
                order: row.get("step_order"),
                title: row.get("title"),
                description: row.get("description"),
                checklist,
                resources,
            });
        }

        Ok(steps)
    }

    async fn tool_names(&self, project_id: &str) -> Result<Vec<String>, AppError> {
        let names =
            sqlx::query_scalar("SELECT name FROM tools WHERE project_id = ? ORDER BY position")
                .bind(project_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(names)
    }

    async fn lookup_names(
        &self,
        kind: LookupKind,
        project_id: &str,
    ) -> Result<Vec<String>, AppError> {
        let sql = match kind {
            LookupKind::Subject => {
                "SELECT s.name FROM subjects s JOIN project_subjects ps ON ps.subject_id = s.id WHERE ps.project_id = ? ORDER BY s.name"
            }
            LookupKind::Tag => {
                "SELECT t.name FROM tags t JOIN project_tags pt ON pt.tag_id = t.id WHERE pt.project_id = ? ORDER BY t.name"
            }
        };
        let names = sqlx::query_scalar(sql)
            .bind(project_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    // ==================== LOOKUP OPERATIONS ====================

    /// List all subjects or tags with their project counts.
    pub async fn list_lookups(&self, kind: LookupKind) -> Result<Vec<LookupEntry>, AppError> {
        let sql = match kind {
            LookupKind::Subject => {
                r#"SELECT s.id, s.name, COUNT(ps.project_id) AS project_count
                   FROM subjects s LEFT JOIN project_subjects ps ON ps.subject_id = s.id
                   GROUP BY s.id, s.name ORDER BY s.name"#
            }
            LookupKind::Tag => {
                r#"SELECT t.id, t.name, COUNT(pt.project_id) AS project_count
                   FROM tags t LEFT JOIN project_tags pt ON pt.tag_id = t.id
                   GROUP BY t.id, t.name ORDER BY t.name"#
            }
        };
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;

        Ok(rows
            .iter()
            .map(|row| LookupEntry {
                id: row.get("id"),
                name: row.get("name"),
                project_count: row.get("project_count"),
            })
            .collect())
    }

    // ==================== ENROLLMENT OPERATIONS ====================

    /// Enroll a student in the project with the given slug.
    pub async fn create_enrollment(
        &self,
        request: &CreateEnrollmentRequest,
    ) -> Result<Enrollment, AppError> {
        let project_id: Option<String> =
            sqlx::query_scalar("SELECT id FROM projects WHERE slug = ?")
                .bind(&request.project_slug)
                .fetch_optional(&self.pool)
                .await?;
        let project_id = project_id.ok_or_else(|| {
            AppError::NotFound(format!("Project {} not found", request.project_slug))
        })?;

        let id = new_id();
        let now = Utc::now().to_rfc3339();
        let email = request.email.trim().to_lowercase();

        sqlx::query(
            "INSERT INTO enrollments (id, project_id, email, name, school, class_num, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&id)
        .bind(&project_id)
        .bind(&email)
        .bind(request.name.trim())
        .bind(request.school.trim())
        .bind(request.class_num)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Enrollment {
            id,
            project_id,
            project_slug: request.project_slug.clone(),
            email,
            name: request.name.trim().to_string(),
            school: request.school.trim().to_string(),
            class_num: request.class_num,
            created_at: now,
            progress: EnrollmentProgress::default(),
        })
    }

    /// Get an enrollment by ID, with its progress.
    pub async fn get_enrollment(&self, id: &str) -> Result<Option<Enrollment>, AppError> {
        let row = sqlx::query(
            r#"SELECT e.id, e.project_id, p.slug, e.email, e.name, e.school, e.class_num, e.created_at
               FROM enrollments e JOIN projects p ON p.id = e.project_id
               WHERE e.id = ?"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Enrollment {
            progress: self.load_progress(id).await?,
            id: row.get("id"),
            project_id: row.get("project_id"),
            project_slug: row.get("slug"),
            email: row.get("email"),
            name: row.get("name"),
            school: row.get("school"),
            class_num: row.get("class_num"),
            created_at: row.get("created_at"),
        }))
    }

    /// Mark a step or checklist item of the enrolled project complete or
    /// incomplete. Returns the enrollment with its updated progress.
    pub async fn record_progress(
        &self,
        enrollment_id: &str,
        target: ProgressTarget,
        item_id: &str,
        completed: bool,
    ) -> Result<Enrollment, AppError> {
        let mut tx = self.pool.begin().await?;

        let project_id: Option<String> =
            sqlx::query_scalar("SELECT project_id FROM enrollments WHERE id = ?")
                .bind(enrollment_id)
                .fetch_optional(&mut *tx)
                .await?;
        let project_id = project_id
            .ok_or_else(|| AppError::NotFound(format!("Enrollment {} not found", enrollment_id)))?;

        let (owner_sql, upsert_sql, label) = match target {
            ProgressTarget::Step => (
                "SELECT COUNT(*) FROM steps WHERE id = ? AND project_id = ?",
                r#"INSERT INTO step_progress (enrollment_id, step_id, completed, updated_at)
                   VALUES (?, ?, ?, ?)
                   ON CONFLICT(enrollment_id, step_id)
                   DO UPDATE SET completed = excluded.completed, updated_at = excluded.updated_at"#,
                "Step",
            ),
            ProgressTarget::ChecklistItem => (
                "SELECT COUNT(*) FROM checklist_items c JOIN steps s ON s.id = c.step_id \
                 WHERE c.id = ? AND s.project_id = ?",
                r#"INSERT INTO checklist_progress (enrollment_id, checklist_item_id, completed, updated_at)
                   VALUES (?, ?, ?, ?)
                   ON CONFLICT(enrollment_id, checklist_item_id)
                   DO UPDATE SET completed = excluded.completed, updated_at = excluded.updated_at"#,
                "Checklist item",
            ),
        };

        // Only items of the enrolled project can be marked
        let owned: i64 = sqlx::query_scalar(owner_sql)
            .bind(item_id)
            .bind(&project_id)
            .fetch_one(&mut *tx)
            .await?;
        if owned == 0 {
            return Err(AppError::NotFound(format!(
                "{} {} not found in the enrolled project",
                label, item_id
            )));
        }

        sqlx::query(upsert_sql)
            .bind(enrollment_id)
            .bind(item_id)
            .bind(completed)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(
            "Enrollment {}: {} {} completed={}",
            enrollment_id,
            label,
            item_id,
            completed
        );

        self.get_enrollment(enrollment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Enrollment {} not found", enrollment_id)))
    }

    async fn load_progress(&self, enrollment_id: &str) -> Result<EnrollmentProgress, AppError> {
        let completed_steps: Vec<String> = sqlx::query_scalar(
            r#"SELECT sp.step_id FROM step_progress sp JOIN steps s ON s.id = sp.step_id
               WHERE sp.enrollment_id = ? AND sp.completed = 1
               ORDER BY s.step_order, s.position"#,
        )
        .bind(enrollment_id)
        .fetch_all(&self.pool)
        .await?;

        let completed_checklist_items: Vec<String> = sqlx::query_scalar(
            r#"SELECT cp.checklist_item_id FROM checklist_progress cp
               JOIN checklist_items c ON c.id = cp.checklist_item_id
               JOIN steps s ON s.id = c.step_id
               WHERE cp.enrollment_id = ? AND cp.completed = 1
               ORDER BY s.step_order, s.position, c.item_order, c.position"#,
        )
        .bind(enrollment_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(EnrollmentProgress {
            completed_steps,
            completed_checklist_items,
        })
    }

    // ==================== ADMIN ====================

    /// Admin project table, newest first.
    pub async fn list_admin_projects(
        &self,
        query: &AdminProjectsQuery,
    ) -> Result<AdminProjectPage, AppError> {
        let search = query.search.as_deref();

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM projects p WHERE 1 = 1");
        push_text_match(&mut count, search);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(
            "SELECT p.id, p.slug, p.title, p.short_desc, p.level, p.guidance, p.created_at, \
             p.updated_at, \
             (SELECT COUNT(*) FROM steps s WHERE s.project_id = p.id) AS step_count, \
             (SELECT COUNT(*) FROM enrollments e WHERE e.project_id = p.id) AS enrollment_count \
             FROM projects p WHERE 1 = 1",
        );
        push_text_match(&mut select, search);
        select
            .push(" ORDER BY p.created_at DESC, p.id LIMIT ")
            .push_bind(query.page_size)
            .push(" OFFSET ")
            .push_bind(page_offset(query.page, query.page_size));
        let rows = select.build().fetch_all(&self.pool).await?;

        let mut projects = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.get("id");
            projects.push(AdminProjectRow {
                subjects: self.lookup_names(LookupKind::Subject, &id).await?,
                tags: self.lookup_names(LookupKind::Tag, &id).await?,
                tools: self.tool_names(&id).await?,
                id,
                slug: row.get("slug"),
                title: row.get("title"),
                short_desc: row.get("short_desc"),
                level: parse_level(row.get("level"))?,
                guidance: parse_guidance(row.get("guidance"))?,
                step_count: row.get("step_count"),
                enrollment_count: row.get("enrollment_count"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            });
        }

        Ok(AdminProjectPage {
            projects,
            pagination: Pagination {
                page: query.page,
                page_size: query.page_size,
                total,
                total_pages: total_pages(total, query.page_size),
            },
        })
    }

    pub async fn stats(&self) -> Result<AdminStats, AppError> {
        let row = sqlx::query(
            r#"SELECT
                 (SELECT COUNT(*) FROM projects) AS total_projects,
                 (SELECT COUNT(*) FROM enrollments) AS total_enrollments,
                 (SELECT COUNT(*) FROM subjects) AS total_subjects,
                 (SELECT COUNT(*) FROM tags) AS total_tags"#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(AdminStats {
            total_projects: row.get("total_projects"),
            total_enrollments: row.get("total_enrollments"),
            total_subjects: row.get("total_subjects"),
            total_tags: row.get("total_tags"),
        })
    }
}

// Helper functions for plan execution

/// Insert the project row, or update it in place when the slug exists.
async fn upsert_project_row(
    conn: &mut SqliteConnection,
    row: &ProjectRow,
    now: &str,
) -> Result<String, AppError> {
    let existing: Option<String> = sqlx::query_scalar("SELECT id FROM projects WHERE slug = ?")
        .bind(&row.slug)
        .fetch_optional(&mut *conn)
        .await?;

    if let Some(id) = existing {
        sqlx::query(
            r#"UPDATE projects SET title = ?, short_desc = ?, long_desc = ?, class_min = ?,
                   class_max = ?, level = ?, guidance = ?, prerequisites = ?, duration_hrs = ?,
                   source_json = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&row.title)
        .bind(&row.short_desc)
        .bind(&row.long_desc)
        .bind(row.class_min)
        .bind(row.class_max)
        .bind(&row.level)
        .bind(&row.guidance)
        .bind(&row.prerequisites_json)
        .bind(row.duration_hrs)
        .bind(&row.source_json)
        .bind(now)
        .bind(&id)
        .execute(&mut *conn)
        .await?;

        clear_project_children(conn, &id).await?;
        tracing::debug!("Replacing contents of project {} ({})", row.slug, id);
        return Ok(id);
    }

    let id = new_id();
    sqlx::query(
        r#"INSERT INTO projects (id, slug, title, short_desc, long_desc, class_min, class_max,
               level, guidance, prerequisites, duration_hrs, source_json, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&id)
    .bind(&row.slug)
    .bind(&row.title)
    .bind(&row.short_desc)
    .bind(&row.long_desc)
    .bind(row.class_min)
    .bind(row.class_max)
    .bind(&row.level)
    .bind(&row.guidance)
    .bind(&row.prerequisites_json)
    .bind(row.duration_hrs)
    .bind(&row.source_json)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(id)
}

/// Drop every collection owned by a project. Shared lookups are untouched.
async fn clear_project_children(
    conn: &mut SqliteConnection,
    project_id: &str,
) -> Result<(), AppError> {
    for sql in [
        "DELETE FROM project_subjects WHERE project_id = ?",
        "DELETE FROM project_tags WHERE project_id = ?",
        "DELETE FROM tools WHERE project_id = ?",
        // checklist items and resources cascade
        "DELETE FROM steps WHERE project_id = ?",
        "DELETE FROM submission_specs WHERE project_id = ?",
    ] {
        sqlx::query(sql)
            .bind(project_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Fetch the id of a subject/tag by name, creating the row if needed.
///
/// Concurrent importers racing on the same name both end up with the row
/// that won the insert.
async fn fetch_or_create_lookup(
    conn: &mut SqliteConnection,
    kind: LookupKind,
    name: &str,
) -> Result<String, AppError> {
    let (insert, select) = match kind {
        LookupKind::Subject => (
            "INSERT INTO subjects (id, name) VALUES (?, ?) ON CONFLICT(name) DO NOTHING",
            "SELECT id FROM subjects WHERE name = ?",
        ),
        LookupKind::Tag => (
            "INSERT INTO tags (id, name) VALUES (?, ?) ON CONFLICT(name) DO NOTHING",
            "SELECT id FROM tags WHERE name = ?",
        ),
    };

    sqlx::query(insert)
        .bind(new_id())
        .bind(name)
        .execute(&mut *conn)
        .await?;

    let id: String = sqlx::query_scalar(select)
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
    Ok(id)
}

fn planned_step(steps: &HashMap<StepKey, String>, key: StepKey) -> Result<&str, AppError> {
    steps
        .get(&key)
        .map(String::as_str)
        .ok_or_else(|| AppError::Internal(format!("Write plan references unknown step {}", key.0)))
}

fn push_project_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &ProjectsQuery, tags: &[String]) {
    qb.push(" WHERE 1 = 1");

    if let Some(class) = query.class {
        qb.push(" AND p.class_min <= ")
            .push_bind(class)
            .push(" AND p.class_max >= ")
            .push_bind(class);
    }

    if let Some(subject) = &query.subject {
        qb.push(
            " AND EXISTS (SELECT 1 FROM project_subjects ps JOIN subjects s ON s.id = ps.subject_id \
             WHERE ps.project_id = p.id AND s.name = ",
        )
        .push_bind(subject.clone())
        .push(")");
    }

    if !tags.is_empty() {
        qb.push(
            " AND EXISTS (SELECT 1 FROM project_tags pt JOIN tags t ON t.id = pt.tag_id \
             WHERE pt.project_id = p.id AND t.name IN (",
        );
        {
            let mut names = qb.separated(", ");
            for tag in tags {
                names.push_bind(tag.clone());
            }
        }
        qb.push("))");
    }

    if let Some(level) = query.level {
        qb.push(" AND p.level = ").push_bind(level.as_str().to_string());
    }

    if let Some(guidance) = query.guidance {
        qb.push(" AND p.guidance = ").push_bind(guidance.as_str().to_string());
    }

    push_text_match(qb, query.q.as_deref());
}

/// Case-insensitive substring match over title, slug and short description.
fn push_text_match(qb: &mut QueryBuilder<'_, Sqlite>, q: Option<&str>) {
    let Some(q) = q.map(str::trim).filter(|q| !q.is_empty()) else {
        return;
    };
    let pattern = format!("%{}%", q.to_lowercase());
    qb.push(" AND (lower(p.title) LIKE ")
        .push_bind(pattern.clone())
        .push(" OR lower(p.slug) LIKE ")
        .push_bind(pattern.clone())
        .push(" OR lower(p.short_desc) LIKE ")
        .push_bind(pattern)
        .push(")");
}

// Helper functions for row conversion

fn submission_from_row(row: &SqliteRow) -> Result<SubmissionSpec, AppError> {
    let kind: String = row.get("submission_type");
    let allowed_types: String = row.get("allowed_types");
    Ok(SubmissionSpec {
        kind: SubmissionType::parse(&kind).ok_or_else(|| {
            AppError::Internal(format!("Unknown submission type {:?} in database", kind))
        })?,
        instruction: row.get("instruction"),
        allowed_types: parse_json_array("allowed_types", &allowed_types),
    })
}

fn parse_level(raw: String) -> Result<Level, AppError> {
    Level::parse(&raw)
        .ok_or_else(|| AppError::Internal(format!("Unknown level {:?} in database", raw)))
}

fn parse_guidance(raw: String) -> Result<Guidance, AppError> {
    Guidance::parse(&raw)
        .ok_or_else(|| AppError::Internal(format!("Unknown guidance {:?} in database", raw)))
}

/// Decode a JSON string-array column. A corrupt value reads as empty and is logged.
fn parse_json_array(column: &str, raw: &str) -> Vec<String> {
    match serde_json::from_str(raw) {
        Ok(values) => values,
        Err(e) => {
            tracing::warn!("Corrupt {} column {:?}: {}", column, raw, e);
            Vec::new()
        }
    }
}

/// Row offset of a 1-based page. Saturates, so absurd pages read as empty.
fn page_offset(page: i64, page_size: i64) -> i64 {
    page.saturating_sub(1)
        .max(0)
        .saturating_mul(page_size.max(0))
}

fn total_pages(total: i64, page_size: i64) -> i64 {
    if page_size < 1 {
        return 0;
    }
    total / page_size + i64::from(total % page_size != 0)
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::mapper::plan;
    use crate::import::validate::validate_document;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    async fn repo() -> (Repository, TempDir) {
        let dir = TempDir::new().unwrap();
        let pool = crate::db::init_database(&dir.path().join("test.sqlite"))
            .await
            .unwrap();
        (Repository::new(pool), dir)
    }

    fn document(slug: &str, subjects: Value) -> Value {
        json!({
            "slug": slug,
            "title": "Water Rocket",
            "shortDesc": "Launch a bottle rocket",
            "longDesc": "Use air pressure and water to launch a rocket.",
            "classRange": { "min": 4, "max": 8 },
            "level": "BEGINNER",
            "guidance": "FULLY_GUIDED",
            "subjects": subjects,
            "tags": ["outdoor"],
            "tools": ["bottle", "pump"],
            "steps": [
                {
                    "order": 2,
                    "title": "Launch",
                    "description": "Pump and release",
                    "checklist": [{ "order": 1, "text": "Clear the area" }]
                },
                {
                    "order": 1,
                    "title": "Build",
                    "description": "Attach the fins",
                    "resources": [{ "title": "Fins", "url": "https://example.org/fins", "type": "video" }]
                }
            ],
            "submission": { "type": "LINK", "instruction": "Share a video", "allowedTypes": [] }
        })
    }

    fn plan_for(input: &Value) -> WritePlan {
        let doc = validate_document(input).unwrap();
        plan(&doc, input).unwrap()
    }

    #[tokio::test]
    async fn test_apply_plan_round_trip() {
        let (repo, _dir) = repo().await;
        let input = document("water-rocket", json!(["Physics"]));

        let id = repo.apply_plan(&plan_for(&input)).await.unwrap();
        let project = repo.get_project(&id).await.unwrap().unwrap();

        assert_eq!(project.slug, "water-rocket");
        assert_eq!(project.subjects, vec!["Physics".to_string()]);
        assert_eq!(project.tools, vec!["bottle".to_string(), "pump".to_string()]);
        assert_eq!(project.steps.len(), 2);
        assert_eq!(project.steps[0].title, "Build");
        assert_eq!(project.steps[0].resources[0].kind, "video");
        assert_eq!(project.steps[1].checklist[0].text, "Clear the area");
        assert_eq!(
            project.submission.map(|s| s.kind),
            Some(SubmissionType::LINK)
        );
    }

    #[tokio::test]
    async fn test_lookups_are_shared_across_projects() {
        let (repo, _dir) = repo().await;
        repo.apply_plan(&plan_for(&document("rocket-a", json!(["Physics"]))))
            .await
            .unwrap();
        repo.apply_plan(&plan_for(&document("rocket-b", json!(["Physics", "Art"]))))
            .await
            .unwrap();

        let subjects = repo.list_lookups(LookupKind::Subject).await.unwrap();
        let names: Vec<_> = subjects.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Art", "Physics"]);
        assert_eq!(subjects[1].project_count, 2);
    }

    #[tokio::test]
    async fn test_fetch_or_create_is_idempotent() {
        let (repo, _dir) = repo().await;
        let mut conn = repo.pool.acquire().await.unwrap();

        let first = fetch_or_create_lookup(&mut conn, LookupKind::Tag, "robots")
            .await
            .unwrap();
        let second = fetch_or_create_lookup(&mut conn, LookupKind::Tag, "robots")
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_failed_plan_leaves_no_trace() {
        let (repo, _dir) = repo().await;
        sqlx::query(
            r#"CREATE TRIGGER reject_second_step BEFORE INSERT ON steps
               WHEN (SELECT COUNT(*) FROM steps WHERE project_id = NEW.project_id) >= 1
               BEGIN SELECT RAISE(ABORT, 'step rejected'); END;"#,
        )
        .execute(&repo.pool)
        .await
        .unwrap();

        let input = document("doomed-rocket", json!(["Chemistry"]));
        assert!(repo.apply_plan(&plan_for(&input)).await.is_err());

        assert!(repo
            .get_project_by_slug("doomed-rocket")
            .await
            .unwrap()
            .is_none());
        assert!(repo
            .list_lookups(LookupKind::Subject)
            .await
            .unwrap()
            .is_empty());
        let stats = repo.stats().await.unwrap();
        assert_eq!(stats.total_projects, 0);
        assert_eq!(stats.total_tags, 0);
    }

    #[tokio::test]
    async fn test_reimport_replaces_contents_in_place() {
        let (repo, _dir) = repo().await;
        let first = repo
            .apply_plan(&plan_for(&document("rocket", json!(["Physics"]))))
            .await
            .unwrap();

        let mut changed = document("rocket", json!(["Engineering"]));
        changed["title"] = json!("Water Rocket v2");
        changed["steps"] = json!([{ "order": 1, "title": "Only", "description": "One step" }]);
        changed.as_object_mut().unwrap().remove("submission");
        let second = repo.apply_plan(&plan_for(&changed)).await.unwrap();
        assert_eq!(first, second);

        let project = repo.get_project(&first).await.unwrap().unwrap();
        assert_eq!(project.title, "Water Rocket v2");
        assert_eq!(project.subjects, vec!["Engineering".to_string()]);
        assert_eq!(project.steps.len(), 1);
        assert!(project.submission.is_none());

        // the old subject row survives, just unlinked
        let subjects = repo.list_lookups(LookupKind::Subject).await.unwrap();
        assert_eq!(subjects.len(), 2);
        assert_eq!(repo.stats().await.unwrap().total_projects, 1);
    }

    #[tokio::test]
    async fn test_delete_refused_while_enrolled() {
        let (repo, _dir) = repo().await;
        let id = repo
            .apply_plan(&plan_for(&document("rocket", json!(["Physics"]))))
            .await
            .unwrap();

        repo.create_enrollment(&CreateEnrollmentRequest {
            project_slug: "rocket".to_string(),
            email: "Kid@Example.org".to_string(),
            name: "Kid".to_string(),
            school: "School 5".to_string(),
            class_num: 6,
        })
        .await
        .unwrap();

        let err = repo.delete_project(&id).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(repo.get_project(&id).await.unwrap().is_some());

        let err = repo.delete_project("missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_projects_filters() {
        let (repo, _dir) = repo().await;
        repo.apply_plan(&plan_for(&document("rocket-a", json!(["Physics"]))))
            .await
            .unwrap();
        let mut other = document("rocket-b", json!(["Art"]));
        other["classRange"] = json!({ "min": 10, "max": 12 });
        other["tags"] = json!(["indoor"]);
        repo.apply_plan(&plan_for(&other)).await.unwrap();

        let page = repo
            .list_projects(&ProjectsQuery {
                class: Some(11),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].slug, "rocket-b");
        assert_eq!(page.data[0].step_count, 2);

        let page = repo
            .list_projects(&ProjectsQuery {
                tags: Some("indoor, outdoor".to_string()),
                page_size: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.data.len(), 1);

        let page = repo
            .list_projects(&ProjectsQuery {
                subject: Some("Physics".to_string()),
                q: Some("ROCKET-A".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_huge_page_reads_as_empty() {
        let (repo, _dir) = repo().await;
        repo.apply_plan(&plan_for(&document("rocket", json!(["Physics"]))))
            .await
            .unwrap();

        let page = repo
            .list_projects(&ProjectsQuery {
                page: i64::MAX,
                page_size: 100,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.total, 1);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn test_paging_arithmetic_saturates() {
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(3, 20), 40);
        assert_eq!(page_offset(i64::MAX, 100), i64::MAX);
        assert_eq!(total_pages(0, 20), 0);
        assert_eq!(total_pages(41, 20), 3);
        assert_eq!(total_pages(i64::MAX, 100), i64::MAX / 100 + 1);
    }

    #[tokio::test]
    async fn test_corrupt_json_column_reads_as_empty() {
        let (repo, _dir) = repo().await;
        let id = repo
            .apply_plan(&plan_for(&document("rocket", json!(["Physics"]))))
            .await
            .unwrap();
        sqlx::query("UPDATE projects SET prerequisites = 'not json' WHERE id = ?")
            .bind(&id)
            .execute(&repo.pool)
            .await
            .unwrap();

        let project = repo.get_project(&id).await.unwrap().unwrap();
        assert!(project.prerequisites.is_empty());
        assert_eq!(parse_json_array("allowed_types", r#"["pdf"]"#), vec!["pdf"]);
    }

    async fn enroll(repo: &Repository, slug: &str) -> Enrollment {
        repo.create_enrollment(&CreateEnrollmentRequest {
            project_slug: slug.to_string(),
            email: "kid@example.org".to_string(),
            name: "Kid".to_string(),
            school: "School 5".to_string(),
            class_num: 6,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_progress_marks_and_unmarks() {
        let (repo, _dir) = repo().await;
        let id = repo
            .apply_plan(&plan_for(&document("rocket", json!(["Physics"]))))
            .await
            .unwrap();
        let project = repo.get_project(&id).await.unwrap().unwrap();
        let enrollment = enroll(&repo, "rocket").await;
        assert_eq!(enrollment.progress, EnrollmentProgress::default());

        // steps come back ordered: "Build" (order 1) then "Launch" (order 2)
        let build = &project.steps[0];
        let launch = &project.steps[1];
        let item = &launch.checklist[0];

        repo.record_progress(&enrollment.id, ProgressTarget::Step, &launch.id, true)
            .await
            .unwrap();
        let updated = repo
            .record_progress(&enrollment.id, ProgressTarget::Step, &build.id, true)
            .await
            .unwrap();
        assert_eq!(
            updated.progress.completed_steps,
            vec![build.id.clone(), launch.id.clone()]
        );

        repo.record_progress(&enrollment.id, ProgressTarget::ChecklistItem, &item.id, true)
            .await
            .unwrap();
        let updated = repo
            .record_progress(&enrollment.id, ProgressTarget::Step, &launch.id, false)
            .await
            .unwrap();
        assert_eq!(updated.progress.completed_steps, vec![build.id.clone()]);
        assert_eq!(
            updated.progress.completed_checklist_items,
            vec![item.id.clone()]
        );

        let reloaded = repo.get_enrollment(&enrollment.id).await.unwrap().unwrap();
        assert_eq!(reloaded.progress, updated.progress);
    }

    #[tokio::test]
    async fn test_progress_rejects_foreign_items() {
        let (repo, _dir) = repo().await;
        repo.apply_plan(&plan_for(&document("rocket-a", json!(["Physics"]))))
            .await
            .unwrap();
        let other = repo
            .apply_plan(&plan_for(&document("rocket-b", json!(["Physics"]))))
            .await
            .unwrap();
        let other_step = repo.get_project(&other).await.unwrap().unwrap().steps[0]
            .id
            .clone();
        let enrollment = enroll(&repo, "rocket-a").await;

        let err = repo
            .record_progress(&enrollment.id, ProgressTarget::Step, &other_step, true)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = repo
            .record_progress(&enrollment.id, ProgressTarget::ChecklistItem, &other_step, true)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = repo
            .record_progress("missing", ProgressTarget::Step, &other_step, true)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_reimport_drops_progress_of_replaced_steps() {
        let (repo, _dir) = repo().await;
        let id = repo
            .apply_plan(&plan_for(&document("rocket", json!(["Physics"]))))
            .await
            .unwrap();
        let step = repo.get_project(&id).await.unwrap().unwrap().steps[0]
            .id
            .clone();
        let enrollment = enroll(&repo, "rocket").await;
        repo.record_progress(&enrollment.id, ProgressTarget::Step, &step, true)
            .await
            .unwrap();

        repo.apply_plan(&plan_for(&document("rocket", json!(["Physics"]))))
            .await
            .unwrap();

        let reloaded = repo.get_enrollment(&enrollment.id).await.unwrap().unwrap();
        assert!(reloaded.progress.completed_steps.is_empty());
    }

    #[tokio::test]
    async fn test_admin_listing_counts_and_search() {
        let (repo, _dir) = repo().await;
        repo.apply_plan(&plan_for(&document("rocket-a", json!(["Physics"]))))
            .await
            .unwrap();
        let mut other = document("kite-b", json!(["Art"]));
        other["title"] = json!("Paper Kite");
        repo.apply_plan(&plan_for(&other)).await.unwrap();
        enroll(&repo, "rocket-a").await;

        let page = repo
            .list_admin_projects(&AdminProjectsQuery::default())
            .await
            .unwrap();
        assert_eq!(page.pagination.total, 2);
        assert_eq!(page.pagination.total_pages, 1);
        let rocket = page
            .projects
            .iter()
            .find(|p| p.slug == "rocket-a")
            .unwrap();
        assert_eq!(rocket.enrollment_count, 1);
        assert_eq!(rocket.step_count, 2);
        assert_eq!(rocket.tools, vec!["bottle".to_string(), "pump".to_string()]);

        let page = repo
            .list_admin_projects(&AdminProjectsQuery {
                search: Some("KITE".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.projects[0].slug, "kite-b");
        assert_eq!(page.projects[0].enrollment_count, 0);
    }
}
