//! Invitations API
//!
//! - POST /v1/invitations - Invite an email to the caller's platform (ADMIN)
//! - GET /v1/invitations - List invitations of the caller's platform (ADMIN)
//! - POST /v1/invitations/accept - Join a platform the caller was invited to

use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::api::middleware::{ApiState, Authenticated};
use crate::domain::{AuthenticationResponse, PlatformRole, UserInvitation};
use crate::error::PlatformError;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvitationRequest {
    pub email: String,
    #[serde(default)]
    pub platform_role: PlatformRole,
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInvitationRequest {
    pub platform_id: String,
}

/// Invite a user to the current platform
#[utoipa::path(
    post,
    path = "/v1/invitations",
    tag = "invitations",
    request_body = CreateInvitationRequest,
    responses(
        (status = 201, description = "Invitation created or already pending", body = UserInvitation),
        (status = 403, description = "Caller is not a platform admin"),
        (status = 409, description = "Email already belongs to a member")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_invitation(
    State(state): State<ApiState>,
    auth: Authenticated,
    Json(req): Json<CreateInvitationRequest>,
) -> Result<(StatusCode, Json<UserInvitation>), PlatformError> {
    let claims = auth.0;
    if !claims.is_admin() {
        return Err(PlatformError::forbidden("Only platform admins can invite users"));
    }

    let invitation = state
        .auth
        .invitations()
        .invite(
            &claims.sub,
            &claims.platform_id,
            &req.email,
            req.platform_role,
            req.project_id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(invitation)))
}

/// List invitations of the current platform
#[utoipa::path(
    get,
    path = "/v1/invitations",
    tag = "invitations",
    responses(
        (status = 200, description = "Invitations, oldest first", body = Vec<UserInvitation>),
        (status = 403, description = "Caller is not a platform admin")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_invitations(
    State(state): State<ApiState>,
    auth: Authenticated,
) -> Result<Json<Vec<UserInvitation>>, PlatformError> {
    if !auth.0.is_admin() {
        return Err(PlatformError::forbidden("Only platform admins can list invitations"));
    }
    Ok(Json(state.auth.invitations().list(&auth.0.platform_id).await?))
}

/// Accept an invitation to another platform
#[utoipa::path(
    post,
    path = "/v1/invitations/accept",
    tag = "invitations",
    request_body = AcceptInvitationRequest,
    responses(
        (status = 200, description = "Joined platform", body = AuthenticationResponse),
        (status = 403, description = "Not invited"),
        (status = 409, description = "Already a member")
    ),
    security(("bearer_auth" = []))
)]
pub async fn accept_invitation(
    State(state): State<ApiState>,
    auth: Authenticated,
    Json(req): Json<AcceptInvitationRequest>,
) -> Result<Json<AuthenticationResponse>, PlatformError> {
    Ok(Json(
        state
            .auth
            .accept_invitation(&auth.0.identity_id, &req.platform_id)
            .await?,
    ))
}

pub fn invitations_router(state: ApiState) -> Router {
    Router::new()
        .route("/v1/invitations", post(create_invitation).get(list_invitations))
        .route("/v1/invitations/accept", post(accept_invitation))
        .with_state(state)
}
