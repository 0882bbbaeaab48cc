//! Error handling module for the project library backend.
//!
//! Provides centralized error types with mapping to HTTP status codes and the
//! problem-details response envelope.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::models::FieldError;

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const PARSE_ERROR: &str = "PARSE_ERROR";
    pub const MAPPING_ERROR: &str = "MAPPING_ERROR";
    pub const CONFLICT: &str = "CONFLICT";
    pub const PAYLOAD_TOO_LARGE: &str = "PAYLOAD_TOO_LARGE";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const SEARCH_ERROR: &str = "SEARCH_ERROR";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Authentication required
    Unauthorized(String),
    /// Resource not found
    NotFound(String),
    /// Structural validation failure with every violated field
    Validation {
        detail: String,
        errors: Vec<FieldError>,
    },
    /// Malformed JSON/YAML syntax
    Parse(String),
    /// Valid document that cannot be turned into entities
    Mapping(String),
    /// Constraint violation the caller can fix
    Conflict(String),
    /// Upload exceeds the configured size cap
    PayloadTooLarge(String),
    /// Database error
    Database(String),
    /// Search index error
    Search(String),
    /// Internal server error
    Internal(String),
    /// Bad request
    BadRequest(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Parse(_) => StatusCode::BAD_REQUEST,
            AppError::Mapping(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Search(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => codes::UNAUTHORIZED,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Validation { .. } => codes::VALIDATION_ERROR,
            AppError::Parse(_) => codes::PARSE_ERROR,
            AppError::Mapping(_) => codes::MAPPING_ERROR,
            AppError::Conflict(_) => codes::CONFLICT,
            AppError::PayloadTooLarge(_) => codes::PAYLOAD_TOO_LARGE,
            AppError::Database(_) => codes::DATABASE_ERROR,
            AppError::Search(_) => codes::SEARCH_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
            AppError::BadRequest(_) => codes::BAD_REQUEST,
        }
    }

    /// Short human-readable title for the problem envelope.
    pub fn title(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::NotFound(_) => "Not Found",
            AppError::Validation { .. } => "Validation Error",
            AppError::Parse(_) => "Invalid Document",
            AppError::Mapping(_) => "Import Failed",
            AppError::Conflict(_) => "Conflict",
            AppError::PayloadTooLarge(_) => "Payload Too Large",
            AppError::Database(_) | AppError::Search(_) | AppError::Internal(_) => "Server Error",
            AppError::BadRequest(_) => "Bad Request",
        }
    }

    /// Problem type URI.
    pub fn problem_type(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "https://docs/errors/auth",
            AppError::NotFound(_) => "https://docs/errors/not-found",
            AppError::Validation { .. } | AppError::Parse(_) | AppError::Mapping(_) => {
                "https://docs/errors/validation"
            }
            AppError::Conflict(_) => "https://docs/errors/conflict",
            AppError::PayloadTooLarge(_) | AppError::BadRequest(_) => "https://docs/errors/client",
            AppError::Database(_) | AppError::Search(_) | AppError::Internal(_) => {
                "https://docs/errors/server"
            }
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::Unauthorized(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Validation { detail, .. } => detail.clone(),
            AppError::Parse(msg) => msg.clone(),
            AppError::Mapping(msg) => msg.clone(),
            AppError::Conflict(msg) => msg.clone(),
            AppError::PayloadTooLarge(msg) => msg.clone(),
            AppError::Database(msg) => msg.clone(),
            AppError::Search(msg) => msg.clone(),
            AppError::Internal(msg) => msg.clone(),
            AppError::BadRequest(msg) => msg.clone(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation()
                || db_err.is_foreign_key_violation()
                || db_err.is_check_violation()
            {
                tracing::warn!("Constraint violation: {}", db_err);
                return AppError::Conflict(format!("Constraint violation: {}", db_err.message()));
            }
        }
        tracing::error!("Database error: {:?}", err);
        AppError::Database(format!("Database error: {}", err))
    }
}

impl From<tantivy::TantivyError> for AppError {
    fn from(err: tantivy::TantivyError) -> Self {
        tracing::error!("Search error: {:?}", err);
        AppError::Search(format!("Search error: {}", err))
    }
}

// Extractor rejections render the same envelope as handler errors.

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(rejection.body_text())
        } else {
            AppError::BadRequest(rejection.body_text())
        }
    }
}

/// Problem-details error envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        let errors = match error {
            AppError::Validation { errors, .. } => Some(errors.clone()),
            _ => None,
        };

        Self {
            success: false,
            problem_type: error.problem_type().to_string(),
            title: error.title().to_string(),
            status: error.status_code().as_u16(),
            detail: error.message(),
            code: error.error_code().to_string(),
            errors,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::new(&self);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_envelope_carries_every_field_error() {
        let error = AppError::Validation {
            detail: "Invalid project document".to_string(),
            errors: vec![
                FieldError::new("slug", "too short", "too_small"),
                FieldError::new("subjects", "empty", "too_small"),
            ],
        };

        let body = ErrorResponse::new(&error);
        assert_eq!(body.status, 400);
        assert_eq!(body.code, codes::VALIDATION_ERROR);
        assert_eq!(body.problem_type, "https://docs/errors/validation");
        assert_eq!(body.errors.as_ref().map(Vec::len), Some(2));

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["type"], "https://docs/errors/validation");
        assert_eq!(json["errors"][1]["path"], "subjects");
    }

    #[test]
    fn test_non_validation_errors_omit_field_list() {
        let body = ErrorResponse::new(&AppError::Parse("Invalid JSON".to_string()));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["code"], "PARSE_ERROR");
        assert!(json.get("errors").is_none());
    }

    #[test]
    fn test_query_rejection_becomes_bad_request() {
        #[derive(Debug, serde::Deserialize)]
        struct Paging {
            #[allow(dead_code)]
            page: i64,
        }

        let uri: axum::http::Uri = "/api/projects?page=abc".parse().unwrap();
        let rejection = axum::extract::Query::<Paging>::try_from_uri(&uri).unwrap_err();
        let error = AppError::from(rejection);
        assert!(matches!(error, AppError::BadRequest(_)));
        assert_eq!(ErrorResponse::new(&error).code, codes::BAD_REQUEST);
    }

    #[test]
    fn test_json_rejection_becomes_bad_request() {
        let rejection = Json::<serde_json::Value>::from_bytes(b"{\"slug\":").unwrap_err();
        let error = AppError::from(rejection);
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert!(!error.message().is_empty());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::PayloadTooLarge(String::new()).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            AppError::Conflict(String::new()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Mapping(String::new()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Database(String::new()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
