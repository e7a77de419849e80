//! Repository Layer
//!
//! Storage seams for every entity, plus the unit of work that makes sign-up
//! atomic. Two backends implement all of them:
//! - `MemoryStore`: in-process maps, for development and tests
//! - `SqliteStore`: sqlx over SQLite with real constraints and transactions
//!
//! Uniqueness (identity email, user identity+platform) is enforced by the
//! store and surfaces as `PlatformError::Conflict`.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::domain::{
    Flag, Otp, OtpType, Platform, Project, User, UserIdentity, UserInvitation,
};
use crate::error::Result;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait IdentityRepository: Send + Sync {
    async fn find_identity(&self, id: &str) -> Result<Option<UserIdentity>>;
    async fn find_identity_by_email(&self, email: &str) -> Result<Option<UserIdentity>>;
    /// Fails with `Conflict` if the email is taken
    async fn insert_identity(&self, identity: &UserIdentity) -> Result<()>;
    async fn update_identity(&self, identity: &UserIdentity) -> Result<()>;
}

#[async_trait]
pub trait PlatformRepository: Send + Sync {
    async fn find_platform(&self, id: &str) -> Result<Option<Platform>>;
    /// Earliest created platform; ties broken by id
    async fn find_oldest_platform(&self) -> Result<Option<Platform>>;
    /// Platforms the identity has a user in, oldest first
    async fn list_platforms_for_identity(&self, identity_id: &str) -> Result<Vec<Platform>>;
    async fn update_platform(&self, platform: &Platform) -> Result<()>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user(&self, id: &str) -> Result<Option<User>>;
    async fn find_user_by_identity_and_platform(
        &self,
        identity_id: &str,
        platform_id: &str,
    ) -> Result<Option<User>>;
    /// Fails with `Conflict` if (identity, platform) already has a user
    async fn insert_user(&self, user: &User) -> Result<()>;
    async fn update_user(&self, user: &User) -> Result<()>;
}

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn find_project(&self, id: &str) -> Result<Option<Project>>;
    /// Oldest first
    async fn list_projects_for_platform(&self, platform_id: &str) -> Result<Vec<Project>>;
    async fn insert_project(&self, project: &Project) -> Result<()>;
}

#[async_trait]
pub trait InvitationRepository: Send + Sync {
    async fn insert_invitation(&self, invitation: &UserInvitation) -> Result<()>;
    async fn find_pending_invitation(
        &self,
        email: &str,
        platform_id: &str,
    ) -> Result<Option<UserInvitation>>;
    async fn list_invitations_for_platform(&self, platform_id: &str) -> Result<Vec<UserInvitation>>;
}

#[async_trait]
pub trait OtpRepository: Send + Sync {
    /// Replaces any outstanding challenge of the same type
    async fn save_otp(&self, otp: &Otp) -> Result<()>;
    async fn find_otp(&self, identity_id: &str, otp_type: OtpType) -> Result<Option<Otp>>;
    async fn delete_otp(&self, identity_id: &str, otp_type: OtpType) -> Result<()>;
}

#[async_trait]
pub trait FlagRepository: Send + Sync {
    async fn find_flag(&self, id: &str) -> Result<Option<Flag>>;
    async fn save_flag(&self, flag: &Flag) -> Result<()>;
}

/// Everything a root sign-up writes
#[derive(Debug, Clone)]
pub struct RootSignUp {
    pub identity: UserIdentity,
    /// Created without a platform, then made owner of `platform`
    pub user: User,
    pub platform: Platform,
    pub project: Project,
}

/// Everything joining an existing platform writes
#[derive(Debug, Clone)]
pub struct MemberSignUp {
    /// `None` when an existing identity joins another platform
    pub new_identity: Option<UserIdentity>,
    pub user: User,
    /// Pending invitations for this email on the user's platform get accepted
    pub invitation_email: String,
}

/// Multi-entity writes that must land together or not at all
#[async_trait]
pub trait SignUpUnitOfWork: Send + Sync {
    async fn commit_root_sign_up(&self, sign_up: &RootSignUp) -> Result<()>;
    async fn commit_member_sign_up(&self, sign_up: &MemberSignUp) -> Result<()>;
}

/// A backend that provides every repository
pub trait AuthStore:
    IdentityRepository
    + PlatformRepository
    + UserRepository
    + ProjectRepository
    + InvitationRepository
    + OtpRepository
    + FlagRepository
    + SignUpUnitOfWork
{
}

impl<T> AuthStore for T where
    T: IdentityRepository
        + PlatformRepository
        + UserRepository
        + ProjectRepository
        + InvitationRepository
        + OtpRepository
        + FlagRepository
        + SignUpUnitOfWork
{
}
