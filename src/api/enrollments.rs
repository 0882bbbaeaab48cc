//! Enrollment API endpoints.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::import::validate::issue;
use crate::models::{
    ChecklistUpdateRequest, CreateEnrollmentRequest, Enrollment, FieldError, ProgressTarget,
    StepUpdateRequest,
};
use crate::AppState;

/// POST /api/enrollments - Enroll a student in a project.
pub async fn create_enrollment(
    State(state): State<AppState>,
    request: Result<Json<CreateEnrollmentRequest>, JsonRejection>,
) -> ApiResult<Enrollment> {
    let Json(request) = request?;
    let errors = validate_enrollment(&request);
    if !errors.is_empty() {
        return Err(AppError::Validation {
            detail: "Invalid enrollment".to_string(),
            errors,
        });
    }

    let enrollment = state.repo.create_enrollment(&request).await?;
    tracing::info!(
        "Enrollment {} created for project {}",
        enrollment.id,
        enrollment.project_slug
    );
    success(enrollment)
}

/// GET /api/enrollments/{id} - Get a single enrollment.
pub async fn get_enrollment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Enrollment> {
    match state.repo.get_enrollment(&id).await? {
        Some(enrollment) => success(enrollment),
        None => Err(AppError::NotFound(format!("Enrollment {} not found", id))),
    }
}

/// PATCH /api/enrollments/{id}/checklist - Mark a checklist item (in)complete.
pub async fn update_checklist_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Result<Json<ChecklistUpdateRequest>, JsonRejection>,
) -> ApiResult<Enrollment> {
    let Json(request) = request?;
    let enrollment = state
        .repo
        .record_progress(
            &id,
            ProgressTarget::ChecklistItem,
            &request.checklist_id,
            request.completed,
        )
        .await?;
    success(enrollment)
}

/// PATCH /api/enrollments/{id}/step - Mark a step (in)complete.
pub async fn update_step_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Result<Json<StepUpdateRequest>, JsonRejection>,
) -> ApiResult<Enrollment> {
    let Json(request) = request?;
    let enrollment = state
        .repo
        .record_progress(&id, ProgressTarget::Step, &request.step_id, request.completed)
        .await?;
    success(enrollment)
}

fn validate_enrollment(request: &CreateEnrollmentRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if !looks_like_email(request.email.trim()) {
        errors.push(FieldError::new("email", "Invalid email", issue::INVALID_STRING));
    }
    if request.name.trim().chars().count() < 2 {
        errors.push(FieldError::new(
            "name",
            "Name must contain at least 2 character(s)",
            issue::TOO_SMALL,
        ));
    }
    if request.school.trim().chars().count() < 2 {
        errors.push(FieldError::new(
            "school",
            "School must contain at least 2 character(s)",
            issue::TOO_SMALL,
        ));
    }
    if !(1..=12).contains(&request.class_num) {
        let code = if request.class_num < 1 {
            issue::TOO_SMALL
        } else {
            issue::TOO_BIG
        };
        errors.push(FieldError::new(
            "classNum",
            "Class must be between 1 and 12",
            code,
        ));
    }

    errors
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}
