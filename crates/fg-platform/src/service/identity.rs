//! Identity Service
//!
//! Creation and verification of platform-independent identities.

use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::{IdentityProvider, UserIdentity};
use crate::error::{PlatformError, Result};
use crate::repository::IdentityRepository;
use crate::service::federated::FederatedProfile;
use crate::service::password::PasswordService;

/// Input for a new identity
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Required for the EMAIL provider, ignored otherwise
    pub password: Option<String>,
    pub provider: IdentityProvider,
    pub verified: bool,
    pub track_events: bool,
    pub news_letter: bool,
}

pub struct IdentityService {
    identities: Arc<dyn IdentityRepository>,
    passwords: Arc<PasswordService>,
}

impl IdentityService {
    pub fn new(identities: Arc<dyn IdentityRepository>, passwords: Arc<PasswordService>) -> Self {
        Self { identities, passwords }
    }

    /// Validate input and build the entity without persisting it, for
    /// callers that write it inside a larger unit of work.
    pub fn build(&self, input: NewIdentity) -> Result<UserIdentity> {
        self.passwords.validate_email(&input.email)?;

        let mut identity = UserIdentity::new(
            &input.email,
            input.first_name.trim(),
            input.last_name.trim(),
            input.provider,
        )
        .with_verified(input.verified)
        .with_preferences(input.track_events, input.news_letter);

        if input.provider == IdentityProvider::Email {
            let password = input
                .password
                .as_deref()
                .ok_or_else(|| PlatformError::validation("Password is required"))?;
            identity = identity.with_password_hash(self.passwords.hash_password(password)?);
        }
        Ok(identity)
    }

    pub async fn create(&self, input: NewIdentity) -> Result<UserIdentity> {
        let identity = self.build(input)?;
        self.identities.insert_identity(&identity).await?;
        info!(identity_id = %identity.id, provider = %identity.provider, "Identity created");
        Ok(identity)
    }

    pub async fn find(&self, id: &str) -> Result<UserIdentity> {
        self.identities
            .find_identity(id)
            .await?
            .ok_or_else(|| PlatformError::not_found("UserIdentity", id))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserIdentity>> {
        self.identities.find_identity_by_email(email).await
    }

    pub async fn verify(&self, id: &str) -> Result<UserIdentity> {
        let mut identity = self.find(id).await?;
        if !identity.verified {
            identity.mark_verified();
            self.identities.update_identity(&identity).await?;
            info!(identity_id = %identity.id, "Identity verified");
        }
        Ok(identity)
    }

    /// Unknown email, missing password and wrong password all fail the same
    /// way.
    pub async fn verify_password(&self, email: &str, password: &str) -> Result<UserIdentity> {
        let identity = self
            .identities
            .find_identity_by_email(email)
            .await?
            .ok_or(PlatformError::InvalidCredentials)?;

        let hash = identity
            .password_hash
            .as_deref()
            .ok_or(PlatformError::InvalidCredentials)?;

        if !self.passwords.verify_password(password, hash)? {
            debug!(identity_id = %identity.id, "Password mismatch");
            return Err(PlatformError::InvalidCredentials);
        }
        Ok(identity)
    }

    /// Upsert from a verified federated profile. Existing identities get
    /// their names and provider refreshed and become verified.
    pub async fn verify_federated(&self, profile: &FederatedProfile) -> Result<UserIdentity> {
        match self.identities.find_identity_by_email(&profile.email).await? {
            Some(mut identity) => {
                if !profile.first_name.is_empty() {
                    identity.first_name = profile.first_name.clone();
                }
                if !profile.last_name.is_empty() {
                    identity.last_name = profile.last_name.clone();
                }
                identity.provider = profile.provider;
                identity.mark_verified();
                self.identities.update_identity(&identity).await?;
                Ok(identity)
            }
            None => {
                self.create(NewIdentity {
                    email: profile.email.clone(),
                    first_name: profile.first_name.clone(),
                    last_name: profile.last_name.clone(),
                    password: None,
                    provider: profile.provider,
                    verified: true,
                    track_events: false,
                    news_letter: false,
                })
                .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryStore;
    use crate::service::password::{Argon2Config, PasswordPolicy};

    fn service() -> IdentityService {
        let passwords =
            Arc::new(PasswordService::new(PasswordPolicy::default(), Argon2Config::low_cost()).unwrap());
        IdentityService::new(Arc::new(MemoryStore::new()), passwords)
    }

    fn input(email: &str) -> NewIdentity {
        NewIdentity {
            email: email.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            password: Some("analytical-engine".to_string()),
            provider: IdentityProvider::Email,
            verified: false,
            track_events: false,
            news_letter: false,
        }
    }

    #[tokio::test]
    async fn test_create_and_verify_password() {
        let service = service();
        let identity = service.create(input("ada@example.com")).await.unwrap();
        assert!(!identity.verified);

        let found = service
            .verify_password("ADA@example.com", "analytical-engine")
            .await
            .unwrap();
        assert_eq!(found.id, identity.id);

        let err = service
            .verify_password("ada@example.com", "difference-engine")
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let service = service();
        service.create(input("ada@example.com")).await.unwrap();
        let err = service.create(input("Ada@Example.com")).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_verify_marks_identity() {
        let service = service();
        let identity = service.create(input("ada@example.com")).await.unwrap();
        let verified = service.verify(&identity.id).await.unwrap();
        assert!(verified.verified);
        assert!(service.find(&identity.id).await.unwrap().verified);
    }

    #[tokio::test]
    async fn test_verify_federated_upserts() {
        let service = service();
        let existing = service.create(input("ada@example.com")).await.unwrap();

        let profile = FederatedProfile {
            email: "ada@example.com".to_string(),
            first_name: "Augusta".to_string(),
            last_name: String::new(),
            provider: IdentityProvider::Google,
        };
        let updated = service.verify_federated(&profile).await.unwrap();
        assert_eq!(updated.id, existing.id);
        assert_eq!(updated.first_name, "Augusta");
        assert_eq!(updated.last_name, "Lovelace");
        assert!(updated.verified);

        let fresh = service
            .verify_federated(&FederatedProfile {
                email: "grace@example.com".to_string(),
                first_name: "Grace".to_string(),
                last_name: "Hopper".to_string(),
                provider: IdentityProvider::Saml,
            })
            .await
            .unwrap();
        assert!(fresh.verified);
        assert!(fresh.password_hash.is_none());
    }
}
