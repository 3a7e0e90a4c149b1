//! Shared API types
//!
//! Error envelope and the mapping from domain errors to HTTP statuses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::domain::DomainError;

/// Standard API error response
#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: String, message: String },
    NotFound { code: String, message: String },
    Conflict { code: String, message: String },
    Internal { message: String },
}

impl ApiError {
    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Map a domain error to its HTTP representation
    pub fn from_domain(error: DomainError) -> Self {
        match &error {
            DomainError::Validation(_) => Self::bad_request("VALIDATION_ERROR", error.to_string()),
            DomainError::Conflict(_) => Self::conflict("CONFLICT", error.to_string()),
            DomainError::NotFound { .. } => Self::not_found("NOT_FOUND", error.to_string()),
            DomainError::Serialization(_) => {
                Self::bad_request("SERIALIZATION_ERROR", error.to_string())
            }
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        Self::from_domain(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, code, message) = match self {
            Self::BadRequest { code, message } => {
                (StatusCode::BAD_REQUEST, "bad_request", code, message)
            }
            Self::NotFound { code, message } => {
                (StatusCode::NOT_FOUND, "not_found", code, message)
            }
            Self::Conflict { code, message } => (StatusCode::CONFLICT, "conflict", code, message),
            Self::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "INTERNAL".to_string(),
                message,
            ),
        };
        (
            status,
            Json(serde_json::json!({
                "error": error,
                "code": code,
                "message": message
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::ValidationErrors;

    #[test]
    fn test_domain_error_mapping() {
        assert!(matches!(
            ApiError::from_domain(DomainError::Validation(ValidationErrors::new())),
            ApiError::BadRequest { .. }
        ));
        assert!(matches!(
            ApiError::from_domain(DomainError::conflict("x")),
            ApiError::Conflict { .. }
        ));
        assert!(matches!(
            ApiError::from_domain(DomainError::not_found("span", "id")),
            ApiError::NotFound { .. }
        ));
        assert!(matches!(
            ApiError::from_domain(DomainError::Serialization("bad variant".to_string())),
            ApiError::BadRequest { .. }
        ));
    }
}
