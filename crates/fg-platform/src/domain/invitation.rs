//! User Invitation Entity
//!
//! Gate for joining an existing platform. Accepted invitations stay on
//! record for audit purposes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{normalize_email, PlatformRole};
use crate::impl_str_enum;
use crate::TsidGenerator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationStatus {
    Pending,
    Accepted,
}

impl_str_enum!(InvitationStatus {
    Pending => "PENDING",
    Accepted => "ACCEPTED",
});

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserInvitation {
    /// TSID as Crockford Base32 string
    pub id: String,

    /// Always stored lowercase
    pub email: String,

    pub platform_id: String,
    pub platform_role: PlatformRole,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    pub status: InvitationStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub invited_by: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl UserInvitation {
    pub fn new(
        email: impl AsRef<str>,
        platform_id: impl Into<String>,
        platform_role: PlatformRole,
    ) -> Self {
        Self {
            id: TsidGenerator::generate(),
            email: normalize_email(email.as_ref()),
            platform_id: platform_id.into(),
            platform_role,
            project_id: None,
            status: InvitationStatus::Pending,
            invited_by: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_inviter(mut self, user_id: impl Into<String>) -> Self {
        self.invited_by = Some(user_id.into());
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == InvitationStatus::Pending
    }
}
