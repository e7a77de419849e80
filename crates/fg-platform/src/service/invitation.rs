//! Invitation Service
//!
//! Invitations gate every way of joining an existing platform. Consuming an
//! invitation happens inside the member sign-up unit of work.

use std::sync::Arc;
use tracing::info;

use crate::domain::{normalize_email, PlatformRole, UserInvitation};
use crate::error::{PlatformError, Result};
use crate::repository::{
    IdentityRepository, InvitationRepository, PlatformRepository, ProjectRepository, UserRepository,
};

pub struct InvitationService {
    invitations: Arc<dyn InvitationRepository>,
    identities: Arc<dyn IdentityRepository>,
    users: Arc<dyn UserRepository>,
    platforms: Arc<dyn PlatformRepository>,
    projects: Arc<dyn ProjectRepository>,
}

impl InvitationService {
    pub fn new(
        invitations: Arc<dyn InvitationRepository>,
        identities: Arc<dyn IdentityRepository>,
        users: Arc<dyn UserRepository>,
        platforms: Arc<dyn PlatformRepository>,
        projects: Arc<dyn ProjectRepository>,
    ) -> Self {
        Self {
            invitations,
            identities,
            users,
            platforms,
            projects,
        }
    }

    /// Returns the oldest pending invitation, or `NotInvited`
    pub async fn assert_user_is_invited(&self, email: &str, platform_id: &str) -> Result<UserInvitation> {
        let email = normalize_email(email);
        self.invitations
            .find_pending_invitation(&email, platform_id)
            .await?
            .ok_or_else(|| PlatformError::not_invited(email, platform_id))
    }

    /// Invite an email to a platform on behalf of one of its admins.
    /// Re-inviting while an invitation is pending returns the existing one.
    pub async fn invite(
        &self,
        inviter_user_id: &str,
        platform_id: &str,
        email: &str,
        platform_role: PlatformRole,
        project_id: Option<String>,
    ) -> Result<UserInvitation> {
        let inviter = self
            .users
            .find_user(inviter_user_id)
            .await?
            .filter(|u| u.belongs_to(platform_id))
            .ok_or_else(|| PlatformError::forbidden("Inviter is not a member of this platform"))?;
        if !inviter.is_admin() || !inviter.is_active() {
            return Err(PlatformError::forbidden("Only platform admins can invite users"));
        }

        if self.platforms.find_platform(platform_id).await?.is_none() {
            return Err(PlatformError::not_found("Platform", platform_id));
        }

        // The invitee's first token is bound to this project
        if let Some(project_id) = project_id.as_deref() {
            self.projects
                .find_project(project_id)
                .await?
                .filter(|p| p.platform_id == platform_id)
                .ok_or_else(|| PlatformError::not_found("Project", project_id))?;
        }

        let email = normalize_email(email);
        if let Some(identity) = self.identities.find_identity_by_email(&email).await? {
            let existing = self
                .users
                .find_user_by_identity_and_platform(&identity.id, platform_id)
                .await?;
            if existing.is_some() {
                return Err(PlatformError::conflict("User", "email", email));
            }
        }

        if let Some(pending) = self.invitations.find_pending_invitation(&email, platform_id).await? {
            return Ok(pending);
        }

        let mut invitation = UserInvitation::new(&email, platform_id, platform_role).with_inviter(&inviter.id);
        if let Some(project_id) = project_id {
            invitation = invitation.with_project(project_id);
        }
        self.invitations.insert_invitation(&invitation).await?;

        info!(
            invitation_id = %invitation.id,
            platform_id = %platform_id,
            role = %platform_role,
            "User invited"
        );
        Ok(invitation)
    }

    pub async fn list(&self, platform_id: &str) -> Result<Vec<UserInvitation>> {
        self.invitations.list_invitations_for_platform(platform_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IdentityProvider, Platform, Project, User, UserIdentity};
    use crate::repository::{MemoryStore, RootSignUp, SignUpUnitOfWork};

    async fn seeded() -> (Arc<MemoryStore>, RootSignUp, InvitationService) {
        let store = Arc::new(MemoryStore::new());
        let identity = UserIdentity::new("owner@corp.com", "Olive", "O", IdentityProvider::Email);
        let user = User::new(&identity.id, PlatformRole::Admin);
        let platform = Platform::new(&user.id, "Olive's Platform");
        let user = user.with_platform(&platform.id);
        let project = Project::default_for(&user.id, &platform.id);
        let seed = RootSignUp { identity, user, platform, project };
        store.commit_root_sign_up(&seed).await.unwrap();

        let service = InvitationService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
        );
        (store, seed, service)
    }

    #[tokio::test]
    async fn test_invite_is_idempotent_while_pending() {
        let (_, seed, service) = seeded().await;
        let first = service
            .invite(&seed.user.id, &seed.platform.id, "Bob@corp.com", PlatformRole::Member, None)
            .await
            .unwrap();
        let second = service
            .invite(&seed.user.id, &seed.platform.id, "bob@corp.com", PlatformRole::Member, None)
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(service.list(&seed.platform.id).await.unwrap().len(), 1);

        let found = service
            .assert_user_is_invited("BOB@corp.com", &seed.platform.id)
            .await
            .unwrap();
        assert_eq!(found.id, first.id);
    }

    #[tokio::test]
    async fn test_invite_rejects_foreign_project() {
        let (store, seed, service) = seeded().await;
        let err = service
            .invite(
                &seed.user.id,
                &seed.platform.id,
                "bob@corp.com",
                PlatformRole::Member,
                Some("NOSUCHPROJECT".to_string()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::NotFound { .. }));

        let other = Platform::new(&seed.user.id, "Elsewhere");
        store.put_platform(other.clone());
        let foreign = Project::default_for(&seed.user.id, &other.id);
        store.insert_project(&foreign).await.unwrap();
        let err = service
            .invite(
                &seed.user.id,
                &seed.platform.id,
                "bob@corp.com",
                PlatformRole::Member,
                Some(foreign.id.clone()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::NotFound { .. }));
        assert!(service.list(&seed.platform.id).await.unwrap().is_empty());

        let invitation = service
            .invite(
                &seed.user.id,
                &seed.platform.id,
                "bob@corp.com",
                PlatformRole::Member,
                Some(seed.project.id.clone()),
            )
            .await
            .unwrap();
        assert_eq!(invitation.project_id.as_deref(), Some(seed.project.id.as_str()));
    }

    #[tokio::test]
    async fn test_not_invited() {
        let (_, seed, service) = seeded().await;
        let err = service
            .assert_user_is_invited("eve@corp.com", &seed.platform.id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_INVITED");
    }

    #[tokio::test]
    async fn test_members_cannot_invite() {
        let (store, seed, service) = seeded().await;
        let identity = UserIdentity::new("bob@corp.com", "Bob", "B", IdentityProvider::Email);
        store.insert_identity(&identity).await.unwrap();
        let member = User::new(&identity.id, PlatformRole::Member).with_platform(&seed.platform.id);
        store.insert_user(&member).await.unwrap();

        let err = service
            .invite(&member.id, &seed.platform.id, "eve@corp.com", PlatformRole::Member, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Forbidden { .. }));

        // Existing members cannot be invited again
        let err = service
            .invite(&seed.user.id, &seed.platform.id, "bob@corp.com", PlatformRole::Member, None)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }
}
