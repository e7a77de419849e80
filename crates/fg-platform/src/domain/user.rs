//! Platform User Entity
//!
//! Binds one identity to one platform with a role. The pair
//! (identity_id, platform_id) is unique.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::impl_str_enum;
use crate::TsidGenerator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlatformRole {
    Admin,
    Member,
}

impl_str_enum!(PlatformRole {
    Admin => "ADMIN",
    Member => "MEMBER",
});

impl Default for PlatformRole {
    fn default() -> Self {
        Self::Member
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Active,
    Inactive,
}

impl_str_enum!(UserStatus {
    Active => "ACTIVE",
    Inactive => "INACTIVE",
});

impl Default for UserStatus {
    fn default() -> Self {
        Self::Active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// TSID as Crockford Base32 string
    pub id: String,

    pub identity_id: String,

    /// Only `None` between user creation and owner assignment inside a
    /// root sign-up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_id: Option<String>,

    pub platform_role: PlatformRole,

    #[serde(default)]
    pub status: UserStatus,

    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(identity_id: impl Into<String>, platform_role: PlatformRole) -> Self {
        Self {
            id: TsidGenerator::generate(),
            identity_id: identity_id.into(),
            platform_id: None,
            platform_role,
            status: UserStatus::Active,
            created_at: Utc::now(),
        }
    }

    pub fn with_platform(mut self, platform_id: impl Into<String>) -> Self {
        self.platform_id = Some(platform_id.into());
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub fn is_admin(&self) -> bool {
        self.platform_role == PlatformRole::Admin
    }

    pub fn belongs_to(&self, platform_id: &str) -> bool {
        self.platform_id.as_deref() == Some(platform_id)
    }
}
