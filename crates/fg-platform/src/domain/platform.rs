//! Platform Entity
//!
//! A tenant boundary owning users, projects and authentication policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::TsidGenerator;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Platform {
    /// TSID as Crockford Base32 string
    pub id: String,

    /// User id of the platform owner
    pub owner_id: String,

    pub name: String,

    pub sso_enabled: bool,
    pub embedding_enabled: bool,

    /// Whether email + password sign-in is accepted
    pub email_auth_enabled: bool,

    /// When set, only emails from `allowed_auth_domains` may authenticate
    pub enforce_allowed_auth_domains: bool,

    #[serde(default)]
    pub allowed_auth_domains: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Platform {
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: TsidGenerator::generate(),
            owner_id: owner_id.into(),
            name: name.into(),
            sso_enabled: false,
            embedding_enabled: false,
            email_auth_enabled: true,
            enforce_allowed_auth_domains: false,
            allowed_auth_domains: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    /// Name given to the platform created during a root sign-up
    pub fn personal_name(first_name: &str) -> String {
        format!("{}'s Platform", first_name)
    }

    pub fn with_sso(mut self, enabled: bool) -> Self {
        self.sso_enabled = enabled;
        self
    }

    pub fn with_embedding(mut self, enabled: bool) -> Self {
        self.embedding_enabled = enabled;
        self
    }

    pub fn with_allowed_domains(mut self, domains: Vec<String>) -> Self {
        self.enforce_allowed_auth_domains = true;
        self.allowed_auth_domains = domains.into_iter().map(|d| d.to_lowercase()).collect();
        self
    }

    /// A platform users can switch into or default to: neither SSO nor
    /// embedding is enabled.
    pub fn is_user_switchable(&self) -> bool {
        !self.sso_enabled && !self.embedding_enabled
    }

    pub fn allows_domain(&self, domain: &str) -> bool {
        if !self.enforce_allowed_auth_domains {
            return true;
        }
        let domain = domain.to_lowercase();
        self.allowed_auth_domains.iter().any(|d| *d == domain)
    }
}
