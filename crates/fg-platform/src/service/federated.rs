//! Federated proof verification
//!
//! Turns a proof from an external identity provider into a trusted profile.

use async_trait::async_trait;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::domain::{normalize_email, IdentityProvider};
use crate::error::{PlatformError, Result};

/// Proof presented by the caller
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FederatedProof {
    pub provider: IdentityProvider,
    /// Signed ID token issued by the provider
    pub id_token: String,
}

/// Verified profile extracted from a proof
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedProfile {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub provider: IdentityProvider,
}

#[async_trait]
pub trait FederatedVerifier: Send + Sync {
    async fn verify(&self, proof: &FederatedProof) -> Result<FederatedProfile>;
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    email: Option<String>,
    preferred_username: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    name: Option<String>,
}

/// Validates HS256 ID tokens from one trusted issuer
pub struct JwtFederatedVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtFederatedVerifier {
    pub fn new(issuer: &str, audience: &str, secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl FederatedVerifier for JwtFederatedVerifier {
    async fn verify(&self, proof: &FederatedProof) -> Result<FederatedProfile> {
        if !proof.provider.is_federated() {
            return Err(PlatformError::validation("Federated proof requires a federated provider"));
        }

        let data = decode::<IdTokenClaims>(&proof.id_token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    PlatformError::authentication_failed("Federated token has expired")
                }
                _ => PlatformError::authentication_failed(format!("Invalid federated token: {}", e)),
            })?;
        let claims = data.claims;

        let email = claims
            .email
            .or(claims.preferred_username)
            .map(|e| normalize_email(&e))
            .filter(|e| e.contains('@'))
            .ok_or_else(|| PlatformError::authentication_failed("No email claim in federated token"))?;

        let (first_name, last_name) = match (claims.given_name, claims.family_name) {
            (Some(given), Some(family)) => (given, family),
            (given, family) => {
                let (first, last) = split_name(claims.name.as_deref().unwrap_or_default());
                (given.unwrap_or(first), family.unwrap_or(last))
            }
        };

        debug!(email = %email, provider = %proof.provider, "Federated proof verified");

        Ok(FederatedProfile {
            email,
            first_name,
            last_name,
            provider: proof.provider,
        })
    }
}

/// Used when no federated issuer is configured
pub struct DisabledFederatedVerifier;

#[async_trait]
impl FederatedVerifier for DisabledFederatedVerifier {
    async fn verify(&self, _proof: &FederatedProof) -> Result<FederatedProfile> {
        Err(PlatformError::authentication_failed(
            "Federated authentication is not configured",
        ))
    }
}

fn split_name(name: &str) -> (String, String) {
    match name.trim().split_once(' ') {
        Some((first, last)) => (first.to_string(), last.trim().to_string()),
        None => (name.trim().to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "federated-test-secret-of-enough-length";

    fn token(claims: serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn proof(id_token: String) -> FederatedProof {
        FederatedProof {
            provider: IdentityProvider::Google,
            id_token,
        }
    }

    fn exp() -> i64 {
        chrono::Utc::now().timestamp() + 300
    }

    #[tokio::test]
    async fn test_verify_extracts_profile() {
        let verifier = JwtFederatedVerifier::new("https://idp.example.com", "flowgate", SECRET);
        let id_token = token(serde_json::json!({
            "iss": "https://idp.example.com",
            "aud": "flowgate",
            "exp": exp(),
            "email": "Grace@Example.com",
            "given_name": "Grace",
            "family_name": "Hopper",
        }));

        let profile = verifier.verify(&proof(id_token)).await.unwrap();
        assert_eq!(profile.email, "grace@example.com");
        assert_eq!(profile.first_name, "Grace");
        assert_eq!(profile.last_name, "Hopper");
        assert_eq!(profile.provider, IdentityProvider::Google);
    }

    #[tokio::test]
    async fn test_falls_back_to_full_name() {
        let verifier = JwtFederatedVerifier::new("https://idp.example.com", "flowgate", SECRET);
        let id_token = token(serde_json::json!({
            "iss": "https://idp.example.com",
            "aud": "flowgate",
            "exp": exp(),
            "email": "grace@example.com",
            "name": "Grace Brewster Hopper",
        }));

        let profile = verifier.verify(&proof(id_token)).await.unwrap();
        assert_eq!(profile.first_name, "Grace");
        assert_eq!(profile.last_name, "Brewster Hopper");
    }

    #[tokio::test]
    async fn test_rejects_wrong_issuer() {
        let verifier = JwtFederatedVerifier::new("https://idp.example.com", "flowgate", SECRET);
        let id_token = token(serde_json::json!({
            "iss": "https://evil.example.com",
            "aud": "flowgate",
            "exp": exp(),
            "email": "grace@example.com",
        }));

        let err = verifier.verify(&proof(id_token)).await.unwrap_err();
        assert!(matches!(err, PlatformError::AuthenticationFailed { .. }));
    }

    #[tokio::test]
    async fn test_disabled_verifier() {
        let err = DisabledFederatedVerifier
            .verify(&proof("anything".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "AUTHENTICATION");
    }
}
