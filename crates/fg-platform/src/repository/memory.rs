//! In-memory store
//!
//! One lock guards all maps so multi-entity commits are atomic: every
//! constraint is checked before the first write.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::domain::{
    Flag, InvitationStatus, Otp, OtpType, Platform, Project, User, UserIdentity, UserInvitation,
};
use crate::error::{PlatformError, Result};
use crate::repository::{
    FlagRepository, IdentityRepository, InvitationRepository, MemberSignUp, OtpRepository,
    PlatformRepository, ProjectRepository, RootSignUp, SignUpUnitOfWork, UserRepository,
};

#[derive(Default)]
struct MemoryState {
    identities: HashMap<String, UserIdentity>,
    platforms: HashMap<String, Platform>,
    users: HashMap<String, User>,
    projects: HashMap<String, Project>,
    invitations: HashMap<String, UserInvitation>,
    otps: HashMap<(String, OtpType), Otp>,
    flags: HashMap<String, Flag>,
}

impl MemoryState {
    fn check_identity_insert(&self, identity: &UserIdentity) -> Result<()> {
        if self.identities.values().any(|i| i.email == identity.email) {
            return Err(PlatformError::conflict("UserIdentity", "email", &identity.email));
        }
        if self.identities.contains_key(&identity.id) {
            return Err(PlatformError::conflict("UserIdentity", "id", &identity.id));
        }
        Ok(())
    }

    fn check_user_insert(&self, user: &User) -> Result<()> {
        if self.users.contains_key(&user.id) {
            return Err(PlatformError::conflict("User", "id", &user.id));
        }
        if let Some(platform_id) = user.platform_id.as_deref() {
            let taken = self
                .users
                .values()
                .any(|u| u.identity_id == user.identity_id && u.belongs_to(platform_id));
            if taken {
                return Err(PlatformError::conflict(
                    "User",
                    "identityId+platformId",
                    format!("{}+{}", user.identity_id, platform_id),
                ));
            }
        }
        Ok(())
    }

    fn require_identity(&self, identity_id: &str) -> Result<()> {
        if self.identities.contains_key(identity_id) {
            Ok(())
        } else {
            Err(PlatformError::not_found("UserIdentity", identity_id))
        }
    }

    fn require_platform(&self, platform_id: &str) -> Result<()> {
        if self.platforms.contains_key(platform_id) {
            Ok(())
        } else {
            Err(PlatformError::not_found("Platform", platform_id))
        }
    }
}

fn sort_oldest_first<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> (chrono::DateTime<chrono::Utc>, String),
{
    items.sort_by_key(|item| key(item));
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace a platform directly. Used by tests and dev seeding to
    /// flip platform settings.
    pub fn put_platform(&self, platform: Platform) {
        self.state.write().platforms.insert(platform.id.clone(), platform);
    }

    pub fn identity_count(&self) -> usize {
        self.state.read().identities.len()
    }

    pub fn user_count(&self) -> usize {
        self.state.read().users.len()
    }

    pub fn platform_count(&self) -> usize {
        self.state.read().platforms.len()
    }
}

#[async_trait]
impl IdentityRepository for MemoryStore {
    async fn find_identity(&self, id: &str) -> Result<Option<UserIdentity>> {
        Ok(self.state.read().identities.get(id).cloned())
    }

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<UserIdentity>> {
        let email = crate::domain::normalize_email(email);
        Ok(self
            .state
            .read()
            .identities
            .values()
            .find(|i| i.email == email)
            .cloned())
    }

    async fn insert_identity(&self, identity: &UserIdentity) -> Result<()> {
        let mut state = self.state.write();
        state.check_identity_insert(identity)?;
        state.identities.insert(identity.id.clone(), identity.clone());
        Ok(())
    }

    async fn update_identity(&self, identity: &UserIdentity) -> Result<()> {
        let mut state = self.state.write();
        state.require_identity(&identity.id)?;
        let email_taken = state
            .identities
            .values()
            .any(|i| i.email == identity.email && i.id != identity.id);
        if email_taken {
            return Err(PlatformError::conflict("UserIdentity", "email", &identity.email));
        }
        state.identities.insert(identity.id.clone(), identity.clone());
        Ok(())
    }
}

#[async_trait]
impl PlatformRepository for MemoryStore {
    async fn find_platform(&self, id: &str) -> Result<Option<Platform>> {
        Ok(self.state.read().platforms.get(id).cloned())
    }

    async fn find_oldest_platform(&self) -> Result<Option<Platform>> {
        Ok(self
            .state
            .read()
            .platforms
            .values()
            .min_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)))
            .cloned())
    }

    async fn list_platforms_for_identity(&self, identity_id: &str) -> Result<Vec<Platform>> {
        let state = self.state.read();
        let mut platforms: Vec<Platform> = state
            .users
            .values()
            .filter(|u| u.identity_id == identity_id)
            .filter_map(|u| u.platform_id.as_ref())
            .filter_map(|pid| state.platforms.get(pid).cloned())
            .collect();
        sort_oldest_first(&mut platforms, |p| (p.created_at, p.id.clone()));
        Ok(platforms)
    }

    async fn update_platform(&self, platform: &Platform) -> Result<()> {
        let mut state = self.state.write();
        state.require_platform(&platform.id)?;
        state.platforms.insert(platform.id.clone(), platform.clone());
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_user(&self, id: &str) -> Result<Option<User>> {
        Ok(self.state.read().users.get(id).cloned())
    }

    async fn find_user_by_identity_and_platform(
        &self,
        identity_id: &str,
        platform_id: &str,
    ) -> Result<Option<User>> {
        Ok(self
            .state
            .read()
            .users
            .values()
            .find(|u| u.identity_id == identity_id && u.belongs_to(platform_id))
            .cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut state = self.state.write();
        state.require_identity(&user.identity_id)?;
        if let Some(platform_id) = user.platform_id.as_deref() {
            state.require_platform(platform_id)?;
        }
        state.check_user_insert(user)?;
        state.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let mut state = self.state.write();
        if !state.users.contains_key(&user.id) {
            return Err(PlatformError::not_found("User", &user.id));
        }
        state.users.insert(user.id.clone(), user.clone());
        Ok(())
    }
}

#[async_trait]
impl ProjectRepository for MemoryStore {
    async fn find_project(&self, id: &str) -> Result<Option<Project>> {
        Ok(self.state.read().projects.get(id).cloned())
    }

    async fn list_projects_for_platform(&self, platform_id: &str) -> Result<Vec<Project>> {
        let mut projects: Vec<Project> = self
            .state
            .read()
            .projects
            .values()
            .filter(|p| p.platform_id == platform_id)
            .cloned()
            .collect();
        sort_oldest_first(&mut projects, |p| (p.created_at, p.id.clone()));
        Ok(projects)
    }

    async fn insert_project(&self, project: &Project) -> Result<()> {
        let mut state = self.state.write();
        state.require_platform(&project.platform_id)?;
        if state.projects.contains_key(&project.id) {
            return Err(PlatformError::conflict("Project", "id", &project.id));
        }
        state.projects.insert(project.id.clone(), project.clone());
        Ok(())
    }
}

#[async_trait]
impl InvitationRepository for MemoryStore {
    async fn insert_invitation(&self, invitation: &UserInvitation) -> Result<()> {
        let mut state = self.state.write();
        state.require_platform(&invitation.platform_id)?;
        state.invitations.insert(invitation.id.clone(), invitation.clone());
        Ok(())
    }

    async fn find_pending_invitation(
        &self,
        email: &str,
        platform_id: &str,
    ) -> Result<Option<UserInvitation>> {
        let email = crate::domain::normalize_email(email);
        let state = self.state.read();
        let mut pending: Vec<&UserInvitation> = state
            .invitations
            .values()
            .filter(|i| i.email == email && i.platform_id == platform_id && i.is_pending())
            .collect();
        pending.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(pending.first().map(|i| (*i).clone()))
    }

    async fn list_invitations_for_platform(&self, platform_id: &str) -> Result<Vec<UserInvitation>> {
        let mut invitations: Vec<UserInvitation> = self
            .state
            .read()
            .invitations
            .values()
            .filter(|i| i.platform_id == platform_id)
            .cloned()
            .collect();
        sort_oldest_first(&mut invitations, |i| (i.created_at, i.id.clone()));
        Ok(invitations)
    }
}

#[async_trait]
impl OtpRepository for MemoryStore {
    async fn save_otp(&self, otp: &Otp) -> Result<()> {
        let mut state = self.state.write();
        state.require_identity(&otp.identity_id)?;
        state
            .otps
            .insert((otp.identity_id.clone(), otp.otp_type), otp.clone());
        Ok(())
    }

    async fn find_otp(&self, identity_id: &str, otp_type: OtpType) -> Result<Option<Otp>> {
        Ok(self
            .state
            .read()
            .otps
            .get(&(identity_id.to_string(), otp_type))
            .cloned())
    }

    async fn delete_otp(&self, identity_id: &str, otp_type: OtpType) -> Result<()> {
        self.state
            .write()
            .otps
            .remove(&(identity_id.to_string(), otp_type));
        Ok(())
    }
}

#[async_trait]
impl FlagRepository for MemoryStore {
    async fn find_flag(&self, id: &str) -> Result<Option<Flag>> {
        Ok(self.state.read().flags.get(id).cloned())
    }

    async fn save_flag(&self, flag: &Flag) -> Result<()> {
        self.state.write().flags.insert(flag.id.clone(), flag.clone());
        Ok(())
    }
}

#[async_trait]
impl SignUpUnitOfWork for MemoryStore {
    async fn commit_root_sign_up(&self, sign_up: &RootSignUp) -> Result<()> {
        let mut state = self.state.write();

        // Validate everything first; nothing is written on failure
        state.check_identity_insert(&sign_up.identity)?;
        state.check_user_insert(&sign_up.user)?;
        if state.platforms.contains_key(&sign_up.platform.id) {
            return Err(PlatformError::conflict("Platform", "id", &sign_up.platform.id));
        }
        if state.projects.contains_key(&sign_up.project.id) {
            return Err(PlatformError::conflict("Project", "id", &sign_up.project.id));
        }

        let mut owner = sign_up.user.clone();
        owner.platform_id = Some(sign_up.platform.id.clone());

        state
            .identities
            .insert(sign_up.identity.id.clone(), sign_up.identity.clone());
        state
            .platforms
            .insert(sign_up.platform.id.clone(), sign_up.platform.clone());
        state.users.insert(owner.id.clone(), owner);
        state
            .projects
            .insert(sign_up.project.id.clone(), sign_up.project.clone());
        Ok(())
    }

    async fn commit_member_sign_up(&self, sign_up: &MemberSignUp) -> Result<()> {
        let mut state = self.state.write();

        let platform_id = sign_up
            .user
            .platform_id
            .clone()
            .ok_or_else(|| PlatformError::validation("Member user must be bound to a platform"))?;
        state.require_platform(&platform_id)?;
        match &sign_up.new_identity {
            Some(identity) => state.check_identity_insert(identity)?,
            None => state.require_identity(&sign_up.user.identity_id)?,
        }
        state.check_user_insert(&sign_up.user)?;

        if let Some(identity) = &sign_up.new_identity {
            state.identities.insert(identity.id.clone(), identity.clone());
        }
        state.users.insert(sign_up.user.id.clone(), sign_up.user.clone());

        let email = crate::domain::normalize_email(&sign_up.invitation_email);
        for invitation in state.invitations.values_mut() {
            if invitation.email == email
                && invitation.platform_id == platform_id
                && invitation.is_pending()
            {
                invitation.status = InvitationStatus::Accepted;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IdentityProvider, PlatformRole};

    fn root_sign_up(email: &str) -> RootSignUp {
        let identity = UserIdentity::new(email, "Ada", "Lovelace", IdentityProvider::Email);
        let user = User::new(&identity.id, PlatformRole::Admin);
        let platform = Platform::new(&user.id, "Ada's Platform");
        let user = user.with_platform(&platform.id);
        let project = Project::default_for(&user.id, &platform.id);
        RootSignUp { identity, user, platform, project }
    }

    #[tokio::test]
    async fn test_root_sign_up_binds_owner() {
        let store = MemoryStore::new();
        let sign_up = root_sign_up("ada@example.com");
        store.commit_root_sign_up(&sign_up).await.unwrap();

        let user = store.find_user(&sign_up.user.id).await.unwrap().unwrap();
        assert!(user.belongs_to(&sign_up.platform.id));
        let platforms = store
            .list_platforms_for_identity(&sign_up.identity.id)
            .await
            .unwrap();
        assert_eq!(platforms.len(), 1);
        assert_eq!(platforms[0].owner_id, user.id);
    }

    #[tokio::test]
    async fn test_duplicate_email_writes_nothing() {
        let store = MemoryStore::new();
        store.commit_root_sign_up(&root_sign_up("ada@example.com")).await.unwrap();

        let err = store
            .commit_root_sign_up(&root_sign_up("ADA@example.com"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.identity_count(), 1);
        assert_eq!(store.user_count(), 1);
        assert_eq!(store.platform_count(), 1);
    }

    #[tokio::test]
    async fn test_member_sign_up_accepts_invitations() {
        let store = MemoryStore::new();
        let root = root_sign_up("owner@example.com");
        store.commit_root_sign_up(&root).await.unwrap();

        let invitation = UserInvitation::new("bob@example.com", &root.platform.id, PlatformRole::Member);
        store.insert_invitation(&invitation).await.unwrap();

        let identity = UserIdentity::new("bob@example.com", "Bob", "B", IdentityProvider::Email);
        let user = User::new(&identity.id, PlatformRole::Member).with_platform(&root.platform.id);
        store
            .commit_member_sign_up(&MemberSignUp {
                new_identity: Some(identity),
                user,
                invitation_email: "bob@example.com".to_string(),
            })
            .await
            .unwrap();

        let pending = store
            .find_pending_invitation("bob@example.com", &root.platform.id)
            .await
            .unwrap();
        assert!(pending.is_none());
    }

    #[tokio::test]
    async fn test_oldest_platform() {
        let store = MemoryStore::new();
        assert!(store.find_oldest_platform().await.unwrap().is_none());

        let first = root_sign_up("first@example.com");
        let second = root_sign_up("second@example.com");
        store.commit_root_sign_up(&first).await.unwrap();
        store.commit_root_sign_up(&second).await.unwrap();

        let oldest = store.find_oldest_platform().await.unwrap().unwrap();
        assert_eq!(oldest.id, first.platform.id);
    }
}
