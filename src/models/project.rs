//! Persisted project aggregate and browse/listing shapes.

use serde::{Deserialize, Serialize};

use super::{ClassRange, Guidance, Level, SubmissionType};

/// A project as stored, with all owned collections loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub short_desc: String,
    pub long_desc: String,
    pub class_range: ClassRange,
    pub level: Level,
    pub guidance: Guidance,
    pub subjects: Vec<String>,
    pub tags: Vec<String>,
    pub tools: Vec<String>,
    pub prerequisites: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_hrs: Option<i64>,
    /// Steps sorted by `order` ascending
    pub steps: Vec<Step>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission: Option<SubmissionSpec>,
    pub created_at: String,
    pub updated_at: String,
}

impl Project {
    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary {
            id: self.id.clone(),
            slug: self.slug.clone(),
            title: self.title.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub order: i64,
    pub title: String,
    pub description: String,
    pub checklist: Vec<ChecklistItem>,
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: String,
    pub order: i64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionSpec {
    #[serde(rename = "type")]
    pub kind: SubmissionType,
    pub instruction: String,
    pub allowed_types: Vec<String>,
}

/// Identifying fields returned after an import.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectSummary {
    pub id: String,
    pub slug: String,
    pub title: String,
}

/// Compact project representation for browse listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCard {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub short_desc: String,
    pub class_min: i64,
    pub class_max: i64,
    pub level: Level,
    pub guidance: Guidance,
    pub subjects: Vec<String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_hrs: Option<i64>,
    pub step_count: i64,
}

/// Browse filters for `GET /api/projects`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectsQuery {
    /// School class the project must cover
    #[serde(default)]
    pub class: Option<i64>,
    #[serde(default)]
    pub subject: Option<String>,
    /// Comma-separated tag names; a project matches if it carries any of them
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub level: Option<Level>,
    #[serde(default)]
    pub guidance: Option<Guidance>,
    /// Substring matched against title, slug and short description
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

impl Default for ProjectsQuery {
    fn default() -> Self {
        Self {
            class: None,
            subject: None,
            tags: None,
            level: None,
            guidance: None,
            q: None,
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl ProjectsQuery {
    /// Tag filter split into trimmed, non-empty names.
    pub fn tag_names(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// One page of project cards.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPage {
    pub data: Vec<ProjectCard>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
}

/// Filters for the admin project table, newest first.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminProjectsQuery {
    /// Substring matched against title, slug and short description
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

impl Default for AdminProjectsQuery {
    fn default() -> Self {
        Self {
            search: None,
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

/// One row of the admin project table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminProjectRow {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub short_desc: String,
    pub level: Level,
    pub guidance: Guidance,
    pub subjects: Vec<String>,
    pub tags: Vec<String>,
    pub tools: Vec<String>,
    pub step_count: i64,
    pub enrollment_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminProjectPage {
    pub projects: Vec<AdminProjectRow>,
    pub pagination: Pagination,
}

/// Counters shown on the admin dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_projects: i64,
    pub total_enrollments: i64,
    pub total_subjects: i64,
    pub total_tags: i64,
}
