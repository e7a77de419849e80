//! Authentication API Endpoints
//!
//! - POST /v1/authentication/sign-up - Create an account
//! - POST /v1/authentication/sign-in - Email + password sign-in
//! - POST /v1/authentication/federated - Sign in with a provider ID token
//! - POST /v1/authentication/verify-email - Confirm an email challenge
//! - POST /v1/authentication/resend-verification - Re-send the challenge
//! - POST /v1/authentication/switch-platform - Re-issue for another platform
//! - POST /v1/authentication/switch-project - Re-issue for another project
//! - GET /v1/authentication/me - Claims of the current token

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::debug;
use utoipa::ToSchema;

use crate::api::common::SuccessResponse;
use crate::api::middleware::{ApiState, Authenticated};
use crate::domain::AuthenticationResponse;
use crate::error::PlatformError;
use crate::service::{AccessTokenClaims, FederatedProof, SignInParams, SignUpCredential, SignUpParams};

/// Sign-up request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub email: String,

    /// Required unless `federatedProof` is given
    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub first_name: String,

    #[serde(default)]
    pub last_name: String,

    #[serde(default)]
    pub track_events: bool,

    #[serde(default)]
    pub news_letter: bool,

    /// Platform to join by invitation
    #[serde(default)]
    pub platform_id: Option<String>,

    /// Sign up with a provider ID token instead of a password
    #[serde(default)]
    pub federated_proof: Option<FederatedProof>,
}

/// Sign-in request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub platform_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEmailRequest {
    pub identity_id: String,
    pub otp: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResendVerificationRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SwitchPlatformRequest {
    pub platform_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SwitchProjectRequest {
    pub project_id: String,
}

/// Create an account
///
/// Without a platform (and, on self-hosted editions, before any platform
/// exists) a new platform is created. Otherwise the email must have been
/// invited to the platform.
#[utoipa::path(
    post,
    path = "/v1/authentication/sign-up",
    tag = "authentication",
    request_body = SignUpRequest,
    responses(
        (status = 200, description = "Signed up", body = AuthenticationResponse),
        (status = 400, description = "Invalid email or password"),
        (status = 403, description = "Not invited or rejected by platform policy"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn sign_up(
    State(state): State<ApiState>,
    Json(req): Json<SignUpRequest>,
) -> Result<Json<AuthenticationResponse>, PlatformError> {
    let credential = match (req.federated_proof, req.password) {
        (Some(proof), _) => SignUpCredential::Federated(proof),
        (None, Some(password)) => SignUpCredential::Password(password),
        (None, None) => return Err(PlatformError::validation("Password is required")),
    };
    let platform_id = state.auth.resolve_request_platform(req.platform_id).await?;

    let response = state
        .auth
        .sign_up(SignUpParams {
            email: req.email,
            first_name: req.first_name,
            last_name: req.last_name,
            credential,
            track_events: req.track_events,
            news_letter: req.news_letter,
            platform_id,
        })
        .await?;
    Ok(Json(response))
}

/// Sign in with email and password
#[utoipa::path(
    post,
    path = "/v1/authentication/sign-in",
    tag = "authentication",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthenticationResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Email not verified or rejected by platform policy")
    )
)]
pub async fn sign_in(
    State(state): State<ApiState>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<AuthenticationResponse>, PlatformError> {
    let platform_id = state.auth.resolve_request_platform(req.platform_id).await?;
    let response = state
        .auth
        .sign_in_with_password(SignInParams {
            email: req.email,
            password: req.password,
            predefined_platform_id: platform_id,
        })
        .await?;
    Ok(Json(response))
}

/// Sign in with a federated provider ID token
#[utoipa::path(
    post,
    path = "/v1/authentication/federated",
    tag = "authentication",
    request_body = FederatedProof,
    responses(
        (status = 200, description = "Signed in", body = AuthenticationResponse),
        (status = 401, description = "Proof rejected or no platform binding")
    )
)]
pub async fn federated(
    State(state): State<ApiState>,
    Json(proof): Json<FederatedProof>,
) -> Result<Json<AuthenticationResponse>, PlatformError> {
    Ok(Json(state.auth.federated_authn(proof).await?))
}

/// Confirm an email verification challenge
#[utoipa::path(
    post,
    path = "/v1/authentication/verify-email",
    tag = "authentication",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Email verified", body = SuccessResponse),
        (status = 400, description = "Invalid or expired code")
    )
)]
pub async fn verify_email(
    State(state): State<ApiState>,
    Json(req): Json<VerifyEmailRequest>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    state.auth.verify_email(&req.identity_id, &req.otp).await?;
    Ok(Json(SuccessResponse::with_message("Email verified")))
}

/// Re-send the email verification challenge
#[utoipa::path(
    post,
    path = "/v1/authentication/resend-verification",
    tag = "authentication",
    request_body = ResendVerificationRequest,
    responses(
        (status = 200, description = "Challenge sent if the account needs one", body = SuccessResponse)
    )
)]
pub async fn resend_verification(
    State(state): State<ApiState>,
    Json(req): Json<ResendVerificationRequest>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    state.auth.resend_email_verification(&req.email).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// Switch to another platform the caller belongs to
#[utoipa::path(
    post,
    path = "/v1/authentication/switch-platform",
    tag = "authentication",
    request_body = SwitchPlatformRequest,
    responses(
        (status = 200, description = "Switched", body = AuthenticationResponse),
        (status = 401, description = "Not a member, or platform uses SSO or embedding")
    ),
    security(("bearer_auth" = []))
)]
pub async fn switch_platform(
    State(state): State<ApiState>,
    auth: Authenticated,
    Json(req): Json<SwitchPlatformRequest>,
) -> Result<Json<AuthenticationResponse>, PlatformError> {
    let claims = auth.0;
    debug!(user_id = %claims.sub, target = %req.platform_id, "Switch platform requested");
    Ok(Json(
        state
            .auth
            .switch_platform(&claims.identity_id, &req.platform_id)
            .await?,
    ))
}

/// Switch to another project on the current platform
#[utoipa::path(
    post,
    path = "/v1/authentication/switch-project",
    tag = "authentication",
    request_body = SwitchProjectRequest,
    responses(
        (status = 200, description = "Switched", body = AuthenticationResponse),
        (status = 404, description = "Project not on the current platform")
    ),
    security(("bearer_auth" = []))
)]
pub async fn switch_project(
    State(state): State<ApiState>,
    auth: Authenticated,
    Json(req): Json<SwitchProjectRequest>,
) -> Result<Json<AuthenticationResponse>, PlatformError> {
    let claims = auth.0;
    Ok(Json(
        state
            .auth
            .switch_project(&claims.sub, &claims.platform_id, &req.project_id)
            .await?,
    ))
}

/// Claims of the presented token
#[utoipa::path(
    get,
    path = "/v1/authentication/me",
    tag = "authentication",
    responses(
        (status = 200, description = "Current session", body = AccessTokenClaims),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = []))
)]
pub async fn me(auth: Authenticated) -> Json<AccessTokenClaims> {
    Json(auth.0)
}

/// Create the authentication router
pub fn authentication_router(state: ApiState) -> Router {
    Router::new()
        .route("/v1/authentication/sign-up", post(sign_up))
        .route("/v1/authentication/sign-in", post(sign_in))
        .route("/v1/authentication/federated", post(federated))
        .route("/v1/authentication/verify-email", post(verify_email))
        .route("/v1/authentication/resend-verification", post(resend_verification))
        .route("/v1/authentication/switch-platform", post(switch_platform))
        .route("/v1/authentication/switch-project", post(switch_project))
        .route("/v1/authentication/me", get(me))
        .with_state(state)
}
