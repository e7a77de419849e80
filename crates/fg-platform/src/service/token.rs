//! Token Issuer
//!
//! Single choke point every authentication flow funnels through. Resolves
//! the project for a (user, platform) pair and mints an HS256 access token
//! bound to that triple.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;

use crate::domain::{
    AuthenticationResponse, Platform, PlatformRole, Project, SessionPlatform, SessionUser, User,
};
use crate::error::{PlatformError, Result};
use crate::repository::{IdentityRepository, PlatformRepository, ProjectRepository, UserRepository};

pub const USER_TOKEN_TYPE: &str = "USER";

/// Token signing settings
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_token_expiry_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            issuer: "flowgate".to_string(),
            audience: "flowgate".to_string(),
            access_token_expiry_secs: 7 * 24 * 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenClaims {
    /// User id
    pub sub: String,
    pub identity_id: String,
    pub platform_id: String,
    pub project_id: String,
    pub platform_role: PlatformRole,
    #[serde(rename = "type")]
    pub token_type: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl AccessTokenClaims {
    pub fn user_id(&self) -> &str {
        &self.sub
    }

    pub fn is_admin(&self) -> bool {
        self.platform_role == PlatformRole::Admin
    }
}

pub struct TokenIssuer {
    config: AuthConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    users: Arc<dyn UserRepository>,
    identities: Arc<dyn IdentityRepository>,
    platforms: Arc<dyn PlatformRepository>,
    projects: Arc<dyn ProjectRepository>,
}

impl TokenIssuer {
    pub fn new(
        config: AuthConfig,
        users: Arc<dyn UserRepository>,
        identities: Arc<dyn IdentityRepository>,
        platforms: Arc<dyn PlatformRepository>,
        projects: Arc<dyn ProjectRepository>,
    ) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        Self {
            config,
            encoding_key,
            decoding_key,
            users,
            identities,
            platforms,
            projects,
        }
    }

    /// Resolve user, platform and project, then mint the token. Performs no
    /// authorization checks; callers have already established membership.
    pub async fn get_project_and_token(
        &self,
        user_id: &str,
        platform_id: &str,
        project_id: Option<&str>,
    ) -> Result<AuthenticationResponse> {
        let user = self
            .users
            .find_user(user_id)
            .await?
            .filter(|u| u.belongs_to(platform_id))
            .ok_or_else(|| PlatformError::not_found("User", user_id))?;

        let identity = self
            .identities
            .find_identity(&user.identity_id)
            .await?
            .ok_or_else(|| PlatformError::not_found("UserIdentity", &user.identity_id))?;

        let platform = self
            .platforms
            .find_platform(platform_id)
            .await?
            .ok_or_else(|| PlatformError::not_found("Platform", platform_id))?;

        let project = self.resolve_project(&user, &platform.id, project_id).await?;
        let token = self.issue(&user, &platform, &project)?;

        Ok(AuthenticationResponse {
            token,
            user: SessionUser::from_parts(&user, &identity),
            platform: SessionPlatform::from(&platform),
            project,
        })
    }

    /// An explicit project must belong to the platform. Otherwise the oldest
    /// project the user owns on the platform, else the platform's oldest.
    ///
    /// Read-only, so callers can settle the project before persisting a
    /// new user.
    pub async fn resolve_project(
        &self,
        user: &User,
        platform_id: &str,
        project_id: Option<&str>,
    ) -> Result<Project> {
        if let Some(project_id) = project_id {
            return self
                .projects
                .find_project(project_id)
                .await?
                .filter(|p| p.platform_id == platform_id)
                .ok_or_else(|| PlatformError::not_found("Project", project_id));
        }

        let projects = self.projects.list_projects_for_platform(platform_id).await?;
        let owned = projects.iter().position(|p| p.owner_id == user.id);
        let index = owned.unwrap_or(0);
        projects
            .into_iter()
            .nth(index)
            .ok_or_else(|| PlatformError::not_found("Project", format!("default for platform {}", platform_id)))
    }

    fn issue(&self, user: &User, platform: &Platform, project: &Project) -> Result<String> {
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: user.id.clone(),
            identity_id: user.identity_id.clone(),
            platform_id: platform.id.clone(),
            project_id: project.id.clone(),
            platform_role: user.platform_role,
            token_type: USER_TOKEN_TYPE.to_string(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.config.access_token_expiry_secs)).timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| PlatformError::internal(format!("Failed to sign token: {}", e)))?;

        metrics::counter!("fg_auth_tokens_issued_total").increment(1);
        debug!(user_id = %user.id, platform_id = %platform.id, project_id = %project.id, "Access token issued");
        Ok(token)
    }

    /// Verify signature, issuer, audience and expiry
    pub fn validate(&self, token: &str) -> Result<AccessTokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);

        let data = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => PlatformError::TokenExpired,
                _ => PlatformError::invalid_token(e.to_string()),
            }
        })?;

        if data.claims.token_type != USER_TOKEN_TYPE {
            return Err(PlatformError::invalid_token("Unexpected token type"));
        }
        Ok(data.claims)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
