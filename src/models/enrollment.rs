//! Student enrollment in a project and its step/checklist progress.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: String,
    pub project_id: String,
    pub project_slug: String,
    pub email: String,
    pub name: String,
    pub school: String,
    pub class_num: i64,
    pub created_at: String,
    pub progress: EnrollmentProgress,
}

/// Ids of the steps and checklist items currently marked complete, in
/// project order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentProgress {
    pub completed_steps: Vec<String>,
    pub completed_checklist_items: Vec<String>,
}

/// Request body for enrolling in a project.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEnrollmentRequest {
    pub project_slug: String,
    pub email: String,
    pub name: String,
    pub school: String,
    pub class_num: i64,
}

/// `PATCH /api/enrollments/{id}/checklist` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistUpdateRequest {
    pub checklist_id: String,
    pub completed: bool,
}

/// `PATCH /api/enrollments/{id}/step` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepUpdateRequest {
    pub step_id: String,
    pub completed: bool,
}

/// What a progress update marks complete or incomplete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressTarget {
    Step,
    ChecklistItem,
}
