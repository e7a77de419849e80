//! API Layer
//!
//! REST endpoints for the authentication flows and invitations.

pub mod common;
pub mod middleware;

pub mod auth;
pub mod invitations;
pub mod openapi;

use axum::Router;

pub use common::*;
pub use middleware::{ApiState, Authenticated};

pub use auth::authentication_router;
pub use invitations::invitations_router;
pub use openapi::{openapi_router, ApiDoc};

/// All API routes; the server adds health, metrics and HTTP layers
pub fn router(state: ApiState) -> Router {
    Router::new()
        .merge(authentication_router(state.clone()))
        .merge(invitations_router(state))
        .merge(openapi_router())
}
