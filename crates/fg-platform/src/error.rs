//! Platform Error Types

use thiserror::Error;

/// Platform policy that rejected an authentication attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    #[error("Email domain '{domain}' is not allowed on this platform")]
    DomainNotAllowed { domain: String },

    #[error("Email authentication is disabled on platform {platform_id}")]
    EmailAuthDisabled { platform_id: String },
}

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Policy violation: {0}")]
    PolicyViolation(PolicyViolation),

    #[error("{email} is not invited to platform {platform_id}")]
    NotInvited { email: String, platform_id: String },

    #[error("Conflict: {entity_type} with {field}={value} already exists")]
    Conflict { entity_type: String, field: String, value: String },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Email {email} is not verified")]
    EmailNotVerified { email: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Invalid token: {message}")]
    InvalidToken { message: String },

    #[error("Token expired")]
    TokenExpired,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PlatformError {
    pub fn authentication_failed(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed { message: message.into() }
    }

    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn conflict(entity_type: impl Into<String>, field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Conflict {
            entity_type: entity_type.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn not_invited(email: impl Into<String>, platform_id: impl Into<String>) -> Self {
        Self::NotInvited {
            email: email.into(),
            platform_id: platform_id.into(),
        }
    }

    pub fn domain_not_allowed(domain: impl Into<String>) -> Self {
        Self::PolicyViolation(PolicyViolation::DomainNotAllowed { domain: domain.into() })
    }

    pub fn email_auth_disabled(platform_id: impl Into<String>) -> Self {
        Self::PolicyViolation(PolicyViolation::EmailAuthDisabled { platform_id: platform_id.into() })
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden { message: message.into() }
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Stable machine-readable code used in API error bodies and metrics labels
    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed { .. } | Self::InvalidCredentials => "AUTHENTICATION",
            Self::PolicyViolation(PolicyViolation::DomainNotAllowed { .. }) => "DOMAIN_NOT_ALLOWED",
            Self::PolicyViolation(PolicyViolation::EmailAuthDisabled { .. }) => "EMAIL_AUTH_DISABLED",
            Self::NotInvited { .. } => "NOT_INVITED",
            Self::Conflict { .. } => "EXISTING_USER",
            Self::NotFound { .. } => "ENTITY_NOT_FOUND",
            Self::EmailNotVerified { .. } => "EMAIL_IS_NOT_VERIFIED",
            Self::Validation { .. } => "VALIDATION",
            Self::Forbidden { .. } => "PERMISSION_DENIED",
            Self::InvalidToken { .. } | Self::TokenExpired => "INVALID_BEARER_TOKEN",
            Self::Database(_) | Self::Json(_) | Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, PlatformError>;
