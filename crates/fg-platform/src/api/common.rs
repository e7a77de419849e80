//! Common API types and utilities

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::error::PlatformError;

/// Standard API error response
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    pub error: String,
    pub message: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }

    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

/// Success response with optional message
#[derive(Debug, Serialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }
}

impl PlatformError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthenticationFailed { .. }
            | Self::InvalidCredentials
            | Self::InvalidToken { .. }
            | Self::TokenExpired => StatusCode::UNAUTHORIZED,
            Self::PolicyViolation(_)
            | Self::NotInvited { .. }
            | Self::EmailNotVerified { .. }
            | Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Database(_) | Self::Json(_) | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for PlatformError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Storage details stay in the log
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        ApiError::new(self.code(), message).into_response_with(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            PlatformError::authentication_failed("x").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            PlatformError::domain_not_allowed("gmail.com").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            PlatformError::not_invited("a@b.com", "p").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            PlatformError::conflict("UserIdentity", "email", "a@b.com").status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            PlatformError::not_found("Project", "p").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(PlatformError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            PlatformError::internal("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_api_error_serialization() {
        let json = serde_json::to_value(ApiError::new("NOT_INVITED", "nope")).unwrap();
        assert_eq!(json["error"], "NOT_INVITED");
        assert_eq!(json["message"], "nope");
        assert_eq!(json.as_object().unwrap().len(), 2);
    }
}
