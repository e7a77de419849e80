//! OpenAPI Documentation
//!
//! Served as JSON at `/q/openapi`.

use axum::{routing::get, Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// FlowGate API OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "FlowGate Authentication API",
        version = "1.0.0",
        description = "Sign-up, sign-in and session switching for platform users"
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "authentication", description = "Sign-up, sign-in and session switching"),
        (name = "invitations", description = "Platform invitations")
    ),
    paths(
        super::auth::sign_up,
        super::auth::sign_in,
        super::auth::federated,
        super::auth::verify_email,
        super::auth::resend_verification,
        super::auth::switch_platform,
        super::auth::switch_project,
        super::auth::me,
        super::invitations::create_invitation,
        super::invitations::list_invitations,
        super::invitations::accept_invitation,
    ),
    components(schemas(super::common::ApiError)),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn openapi_router() -> Router {
    Router::new().route("/q/openapi", get(openapi_json))
}
