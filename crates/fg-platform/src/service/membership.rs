//! Platform membership resolution

use std::sync::Arc;

use crate::domain::Platform;
use crate::error::Result;
use crate::repository::PlatformRepository;

pub struct PlatformMembershipResolver {
    platforms: Arc<dyn PlatformRepository>,
}

impl PlatformMembershipResolver {
    pub fn new(platforms: Arc<dyn PlatformRepository>) -> Self {
        Self { platforms }
    }

    /// Platforms the identity has a user in, oldest first
    pub async fn list_platforms(&self, identity_id: &str) -> Result<Vec<Platform>> {
        self.platforms.list_platforms_for_identity(identity_id).await
    }

    /// The identity's default-selectable platform: the oldest membership with
    /// neither SSO nor embedding. `None` if there is no such platform.
    pub async fn personal_platform(&self, identity_id: &str) -> Result<Option<Platform>> {
        let platforms = self.list_platforms(identity_id).await?;
        Ok(platforms.into_iter().find(Platform::is_user_switchable))
    }
}
