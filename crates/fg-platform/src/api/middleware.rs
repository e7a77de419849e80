//! API Middleware
//!
//! Bearer token authentication for Axum.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::api::common::ApiError;
use crate::service::{extract_bearer_token, AccessTokenClaims, AuthenticationService};

/// Application state containing shared services
#[derive(Clone)]
pub struct ApiState {
    pub auth: Arc<AuthenticationService>,
}

impl ApiState {
    pub fn new(auth: Arc<AuthenticationService>) -> Self {
        Self { auth }
    }
}

/// Extractor for authenticated requests. Validates the bearer token and
/// exposes its claims.
pub struct Authenticated(pub AccessTokenClaims);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    ApiState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ApiError::new("UNAUTHORIZED", "Missing Authorization header")
                    .into_response_with(StatusCode::UNAUTHORIZED)
            })?;

        let token = extract_bearer_token(auth_header).ok_or_else(|| {
            ApiError::new("UNAUTHORIZED", "Invalid Authorization header format")
                .into_response_with(StatusCode::UNAUTHORIZED)
        })?;

        let app_state = ApiState::from_ref(state);
        let claims = app_state
            .auth
            .tokens()
            .validate(token)
            .map_err(|e| e.into_response())?;

        Ok(Authenticated(claims))
    }
}
