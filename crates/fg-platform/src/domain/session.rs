//! Authentication response
//!
//! What every successful authentication flow returns: a token bound to
//! exactly one (user, platform, project) triple plus the context it was
//! issued for.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Platform, PlatformRole, Project, User, UserIdentity, UserStatus};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub identity_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub platform_role: PlatformRole,
    pub status: UserStatus,
    pub verified: bool,
}

impl SessionUser {
    pub fn from_parts(user: &User, identity: &UserIdentity) -> Self {
        Self {
            id: user.id.clone(),
            identity_id: identity.id.clone(),
            email: identity.email.clone(),
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            platform_role: user.platform_role,
            status: user.status,
            verified: identity.verified,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionPlatform {
    pub id: String,
    pub name: String,
    pub sso_enabled: bool,
    pub embedding_enabled: bool,
}

impl From<&Platform> for SessionPlatform {
    fn from(p: &Platform) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            sso_enabled: p.sso_enabled,
            embedding_enabled: p.embedding_enabled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationResponse {
    /// Bearer access token
    pub token: String,
    pub user: SessionUser,
    pub platform: SessionPlatform,
    pub project: Project,
}
