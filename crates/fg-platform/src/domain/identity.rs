//! User Identity Entity
//!
//! A platform-independent account keyed by email. One identity can be bound
//! to several platforms through `User` records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::impl_str_enum;
use crate::TsidGenerator;

/// How the identity proves who it is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentityProvider {
    /// Email + password
    Email,
    Google,
    Saml,
    /// Signed assertion from a trusted issuer
    Jwt,
}

impl_str_enum!(IdentityProvider {
    Email => "EMAIL",
    Google => "GOOGLE",
    Saml => "SAML",
    Jwt => "JWT",
});

impl Default for IdentityProvider {
    fn default() -> Self {
        Self::Email
    }
}

impl IdentityProvider {
    pub fn is_federated(&self) -> bool {
        !matches!(self, Self::Email)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    /// TSID as Crockford Base32 string
    pub id: String,

    /// Always stored lowercase
    pub email: String,

    pub first_name: String,
    pub last_name: String,

    /// Argon2id PHC string; `None` for federated-only identities
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,

    pub provider: IdentityProvider,
    pub verified: bool,

    #[serde(default)]
    pub track_events: bool,
    #[serde(default)]
    pub news_letter: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserIdentity {
    pub fn new(
        email: impl AsRef<str>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        provider: IdentityProvider,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TsidGenerator::generate(),
            email: normalize_email(email.as_ref()),
            first_name: first_name.into(),
            last_name: last_name.into(),
            password_hash: None,
            provider,
            verified: false,
            track_events: false,
            news_letter: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }

    pub fn with_verified(mut self, verified: bool) -> Self {
        self.verified = verified;
        self
    }

    pub fn with_preferences(mut self, track_events: bool, news_letter: bool) -> Self {
        self.track_events = track_events;
        self.news_letter = news_letter;
        self
    }

    pub fn mark_verified(&mut self) {
        self.verified = true;
        self.updated_at = Utc::now();
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    /// Part after the `@`, lowercase
    pub fn email_domain(&self) -> &str {
        email_domain(&self.email)
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn email_domain(email: &str) -> &str {
    email.rsplit_once('@').map(|(_, domain)| domain).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_identity_normalizes_email() {
        let identity = UserIdentity::new("  Ada@Example.COM ", "Ada", "Lovelace", IdentityProvider::Email);
        assert_eq!(identity.email, "ada@example.com");
        assert_eq!(identity.email_domain(), "example.com");
        assert!(!identity.verified);
        assert!(identity.password_hash.is_none());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let identity = UserIdentity::new("a@b.com", "A", "B", IdentityProvider::Email)
            .with_password_hash("$argon2id$v=19$...");
        let json = serde_json::to_string(&identity).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(json.contains("firstName"));
    }

    #[test]
    fn test_provider_round_trip_through_text() {
        for provider in [
            IdentityProvider::Email,
            IdentityProvider::Google,
            IdentityProvider::Saml,
            IdentityProvider::Jwt,
        ] {
            assert_eq!(provider.as_str().parse::<IdentityProvider>().unwrap(), provider);
        }
        assert!("GITHUB".parse::<IdentityProvider>().is_err());
    }

    #[test]
    fn test_email_domain_without_at() {
        assert_eq!(email_domain("nobody"), "");
        assert_eq!(email_domain("a@sub.example.org"), "sub.example.org");
    }
}
