//! Best-effort sign-up side effects
//!
//! Flag, telemetry and newsletter collaborators run after a root sign-up has
//! been committed. Their failures are logged and never reach the caller.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{Flag, User, UserIdentity, USER_CREATED_FLAG};
use crate::repository::FlagRepository;

#[async_trait]
pub trait TelemetryReporter: Send + Sync {
    async fn identify_sign_up(&self, identity: &UserIdentity, user: &User, project_id: &str) -> anyhow::Result<()>;
}

#[async_trait]
pub trait NewsletterSubscriber: Send + Sync {
    async fn subscribe(&self, identity: &UserIdentity, platform_id: &str) -> anyhow::Result<()>;
}

pub struct LoggingTelemetryReporter;

#[async_trait]
impl TelemetryReporter for LoggingTelemetryReporter {
    async fn identify_sign_up(&self, identity: &UserIdentity, user: &User, project_id: &str) -> anyhow::Result<()> {
        info!(
            identity_id = %identity.id,
            user_id = %user.id,
            project_id = %project_id,
            "telemetry: user signed up"
        );
        Ok(())
    }
}

pub struct LoggingNewsletterSubscriber;

#[async_trait]
impl NewsletterSubscriber for LoggingNewsletterSubscriber {
    async fn subscribe(&self, identity: &UserIdentity, platform_id: &str) -> anyhow::Result<()> {
        info!(identity_id = %identity.id, platform_id = %platform_id, "newsletter: subscribed");
        Ok(())
    }
}

pub struct SignUpSideEffects {
    flags: Arc<dyn FlagRepository>,
    telemetry: Arc<dyn TelemetryReporter>,
    newsletter: Arc<dyn NewsletterSubscriber>,
}

impl SignUpSideEffects {
    pub fn new(
        flags: Arc<dyn FlagRepository>,
        telemetry: Arc<dyn TelemetryReporter>,
        newsletter: Arc<dyn NewsletterSubscriber>,
    ) -> Self {
        Self {
            flags,
            telemetry,
            newsletter,
        }
    }

    pub async fn run(&self, identity: &UserIdentity, user: &User, platform_id: &str, project_id: &str) {
        if let Err(e) = self
            .flags
            .save_flag(&Flag::new(USER_CREATED_FLAG, serde_json::Value::Bool(true)))
            .await
        {
            warn!(error = %e, "Failed to save USER_CREATED flag");
        }

        if identity.track_events {
            if let Err(e) = self.telemetry.identify_sign_up(identity, user, project_id).await {
                warn!(error = %e, identity_id = %identity.id, "Telemetry report failed");
            }
        } else {
            debug!(identity_id = %identity.id, "Telemetry opted out");
        }

        if identity.news_letter {
            if let Err(e) = self.newsletter.subscribe(identity, platform_id).await {
                warn!(error = %e, identity_id = %identity.id, "Newsletter subscription failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IdentityProvider, PlatformRole};
    use crate::repository::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingTelemetry(AtomicUsize);

    #[async_trait]
    impl TelemetryReporter for FailingTelemetry {
        async fn identify_sign_up(&self, _: &UserIdentity, _: &User, _: &str) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("collector unreachable")
        }
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let store = Arc::new(MemoryStore::new());
        let telemetry = Arc::new(FailingTelemetry(AtomicUsize::new(0)));
        let effects = SignUpSideEffects::new(store.clone(), telemetry.clone(), Arc::new(LoggingNewsletterSubscriber));

        let identity = UserIdentity::new("ada@example.com", "Ada", "L", IdentityProvider::Email)
            .with_preferences(true, true);
        let user = User::new(&identity.id, PlatformRole::Admin);
        effects.run(&identity, &user, "platform", "project").await;

        assert_eq!(telemetry.0.load(Ordering::SeqCst), 1);
        let flag = store.find_flag(USER_CREATED_FLAG).await.unwrap().unwrap();
        assert!(flag.is_true());
    }

    #[tokio::test]
    async fn test_opted_out_skips_telemetry() {
        let store = Arc::new(MemoryStore::new());
        let telemetry = Arc::new(FailingTelemetry(AtomicUsize::new(0)));
        let effects = SignUpSideEffects::new(store, telemetry.clone(), Arc::new(LoggingNewsletterSubscriber));

        let identity = UserIdentity::new("ada@example.com", "Ada", "L", IdentityProvider::Email);
        let user = User::new(&identity.id, PlatformRole::Admin);
        effects.run(&identity, &user, "platform", "project").await;

        assert_eq!(telemetry.0.load(Ordering::SeqCst), 0);
    }
}
