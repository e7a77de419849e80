//! Email verification
//!
//! Which verification strategy applies depends on the deployment edition and
//! is chosen once at startup:
//!
//! | Edition    | Strategy                     | Identity on sign-up |
//! |------------|------------------------------|---------------------|
//! | CLOUD      | `EmailChallengeVerification` | unverified, OTP sent |
//! | COMMUNITY  | `AutoVerification`           | verified            |
//! | ENTERPRISE | `AutoVerification`           | verified            |

use async_trait::async_trait;
use chrono::Duration;
use fg_common::Edition;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{Otp, OtpType, UserIdentity};
use crate::error::{PlatformError, Result};
use crate::repository::OtpRepository;

/// Delivers a challenge value to the identity (email in production)
#[async_trait]
pub trait ChallengeSender: Send + Sync {
    async fn send(&self, identity: &UserIdentity, otp_type: OtpType, value: &str) -> anyhow::Result<()>;
}

/// Writes challenges to the log; for development installs without mail
pub struct LoggingChallengeSender;

#[async_trait]
impl ChallengeSender for LoggingChallengeSender {
    async fn send(&self, identity: &UserIdentity, otp_type: OtpType, value: &str) -> anyhow::Result<()> {
        info!(identity_id = %identity.id, otp_type = %otp_type, "Verification challenge issued");
        debug!(identity_id = %identity.id, otp = %value, "Verification challenge value");
        Ok(())
    }
}

pub struct OtpService {
    otps: Arc<dyn OtpRepository>,
    sender: Arc<dyn ChallengeSender>,
    ttl: Duration,
}

impl OtpService {
    pub fn new(otps: Arc<dyn OtpRepository>, sender: Arc<dyn ChallengeSender>, ttl: Duration) -> Self {
        Self { otps, sender, ttl }
    }

    /// Replace any outstanding challenge and deliver the new value
    pub async fn create_and_send(&self, identity: &UserIdentity, otp_type: OtpType) -> Result<()> {
        let (value, otp) = Otp::issue(&identity.id, otp_type, self.ttl);
        self.otps.save_otp(&otp).await?;
        self.sender
            .send(identity, otp_type, &value)
            .await
            .map_err(|e| PlatformError::internal(format!("Failed to send challenge: {}", e)))
    }

    /// Consume a challenge. Values are single-use; expired challenges are
    /// discarded.
    pub async fn confirm(&self, identity_id: &str, otp_type: OtpType, value: &str) -> Result<()> {
        let otp = self
            .otps
            .find_otp(identity_id, otp_type)
            .await?
            .ok_or_else(|| PlatformError::validation("Invalid or expired verification code"))?;

        if otp.is_expired() {
            self.otps.delete_otp(identity_id, otp_type).await?;
            return Err(PlatformError::validation("Invalid or expired verification code"));
        }
        if !otp.matches(value) {
            return Err(PlatformError::validation("Invalid or expired verification code"));
        }

        self.otps.delete_otp(identity_id, otp_type).await
    }
}

#[async_trait]
pub trait VerificationPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether a new identity starts out verified
    fn verified_on_sign_up(&self) -> bool;

    /// Runs after the sign-up has been committed
    async fn after_sign_up(&self, identity: &UserIdentity) -> Result<()>;
}

pub struct EmailChallengeVerification {
    otp: Arc<OtpService>,
}

impl EmailChallengeVerification {
    pub fn new(otp: Arc<OtpService>) -> Self {
        Self { otp }
    }
}

#[async_trait]
impl VerificationPolicy for EmailChallengeVerification {
    fn name(&self) -> &'static str {
        "email-challenge"
    }

    fn verified_on_sign_up(&self) -> bool {
        false
    }

    async fn after_sign_up(&self, identity: &UserIdentity) -> Result<()> {
        self.otp.create_and_send(identity, OtpType::EmailVerification).await
    }
}

pub struct AutoVerification;

#[async_trait]
impl VerificationPolicy for AutoVerification {
    fn name(&self) -> &'static str {
        "auto"
    }

    fn verified_on_sign_up(&self) -> bool {
        true
    }

    async fn after_sign_up(&self, _identity: &UserIdentity) -> Result<()> {
        Ok(())
    }
}

pub fn verification_for_edition(edition: Edition, otp: Arc<OtpService>) -> Arc<dyn VerificationPolicy> {
    let policy: Arc<dyn VerificationPolicy> = match edition {
        Edition::Cloud => Arc::new(EmailChallengeVerification::new(otp)),
        Edition::Community | Edition::Enterprise => Arc::new(AutoVerification),
    };
    debug!(edition = %edition, policy = policy.name(), "Verification policy selected");
    policy
}

/// Recording sender for tests and tooling
#[derive(Default)]
pub struct RecordingChallengeSender {
    sent: parking_lot::Mutex<Vec<(String, OtpType, String)>>,
    fail: bool,
}

impl RecordingChallengeSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sender whose every delivery fails
    pub fn failing() -> Self {
        Self {
            sent: Default::default(),
            fail: true,
        }
    }

    /// `(identity_id, type, value)` for every delivered challenge
    pub fn sent(&self) -> Vec<(String, OtpType, String)> {
        self.sent.lock().clone()
    }

    pub fn last_value_for(&self, identity_id: &str) -> Option<String> {
        self.sent
            .lock()
            .iter()
            .rev()
            .find(|(id, _, _)| id == identity_id)
            .map(|(_, _, value)| value.clone())
    }
}

#[async_trait]
impl ChallengeSender for RecordingChallengeSender {
    async fn send(&self, identity: &UserIdentity, otp_type: OtpType, value: &str) -> anyhow::Result<()> {
        if self.fail {
            warn!(identity_id = %identity.id, "Challenge delivery refused");
            anyhow::bail!("mail transport unavailable");
        }
        self.sent
            .lock()
            .push((identity.id.clone(), otp_type, value.to_string()));
        Ok(())
    }
}
