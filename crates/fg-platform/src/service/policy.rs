//! Authentication policy
//!
//! Per-platform rules checked before an identity may authenticate into a
//! platform.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use crate::domain::{email_domain, IdentityProvider, Platform};
use crate::error::{PlatformError, Result};
use crate::repository::PlatformRepository;

#[async_trait]
pub trait AuthPolicy: Send + Sync {
    /// Only the EMAIL provider is subject to the platform's email-auth switch
    async fn assert_email_auth_enabled(&self, platform_id: &str, provider: IdentityProvider) -> Result<()>;

    async fn assert_domain_allowed(&self, email: &str, platform_id: &str) -> Result<()>;
}

/// Reads the rules from the platform record
pub struct PlatformAuthPolicy {
    platforms: Arc<dyn PlatformRepository>,
}

impl PlatformAuthPolicy {
    pub fn new(platforms: Arc<dyn PlatformRepository>) -> Self {
        Self { platforms }
    }

    async fn platform(&self, platform_id: &str) -> Result<Platform> {
        self.platforms
            .find_platform(platform_id)
            .await?
            .ok_or_else(|| PlatformError::not_found("Platform", platform_id))
    }
}

#[async_trait]
impl AuthPolicy for PlatformAuthPolicy {
    async fn assert_email_auth_enabled(&self, platform_id: &str, provider: IdentityProvider) -> Result<()> {
        if provider != IdentityProvider::Email {
            return Ok(());
        }
        let platform = self.platform(platform_id).await?;
        if !platform.email_auth_enabled {
            warn!(platform_id = %platform_id, "Email authentication attempted on platform with it disabled");
            return Err(PlatformError::email_auth_disabled(platform_id));
        }
        Ok(())
    }

    async fn assert_domain_allowed(&self, email: &str, platform_id: &str) -> Result<()> {
        let platform = self.platform(platform_id).await?;
        let domain = email_domain(email);
        if !platform.allows_domain(domain) {
            warn!(platform_id = %platform_id, domain = %domain, "Email domain rejected by platform");
            return Err(PlatformError::domain_not_allowed(domain));
        }
        Ok(())
    }
}
