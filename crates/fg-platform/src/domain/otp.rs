//! One-time password (verification challenge) entity

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::impl_str_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OtpType {
    EmailVerification,
}

impl_str_enum!(OtpType {
    EmailVerification => "EMAIL_VERIFICATION",
});

/// Outstanding challenge. At most one per (identity, type); issuing a new one
/// replaces the old. Only the SHA-256 of the value is kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Otp {
    pub identity_id: String,
    pub otp_type: OtpType,
    pub value_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Otp {
    /// Returns `(raw_value, entity)`. The raw value goes to the user, the
    /// entity goes to the store.
    pub fn issue(identity_id: impl Into<String>, otp_type: OtpType, ttl: Duration) -> (String, Self) {
        let raw = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let otp = Self {
            identity_id: identity_id.into(),
            otp_type,
            value_hash: Self::hash_value(&raw),
            expires_at: now + ttl,
            created_at: now,
        };
        (raw, otp)
    }

    pub fn hash_value(raw: &str) -> String {
        hex::encode(Sha256::digest(raw.trim().as_bytes()))
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub fn matches(&self, raw: &str) -> bool {
        let candidate = Self::hash_value(raw);
        candidate.as_bytes().ct_eq(self.value_hash.as_bytes()).into()
    }
}
