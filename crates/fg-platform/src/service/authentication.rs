//! Authentication Orchestrator
//!
//! Composes identities, membership, policy, invitations, verification and
//! the token issuer into the user-facing flows. Every successful flow ends
//! in `TokenIssuer::get_project_and_token`.

use chrono::Duration;
use fg_common::Edition;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::domain::{
    AuthenticationResponse, IdentityProvider, OtpType, Platform, PlatformRole, Project, User,
    UserIdentity,
};
use crate::error::{PlatformError, Result};
use crate::repository::{
    AuthStore, FlagRepository, IdentityRepository, InvitationRepository, MemberSignUp,
    OtpRepository, PlatformRepository, ProjectRepository, RootSignUp, SignUpUnitOfWork,
    UserRepository,
};
use crate::service::federated::{DisabledFederatedVerifier, FederatedProof, FederatedVerifier};
use crate::service::identity::{IdentityService, NewIdentity};
use crate::service::invitation::InvitationService;
use crate::service::membership::PlatformMembershipResolver;
use crate::service::password::{Argon2Config, PasswordPolicy, PasswordService};
use crate::service::policy::{AuthPolicy, PlatformAuthPolicy};
use crate::service::side_effects::{
    LoggingNewsletterSubscriber, LoggingTelemetryReporter, NewsletterSubscriber, SignUpSideEffects,
    TelemetryReporter,
};
use crate::service::token::{AuthConfig, TokenIssuer};
use crate::service::verification::{
    verification_for_edition, ChallengeSender, LoggingChallengeSender, OtpService, VerificationPolicy,
};

/// Proof supplied at sign-up
#[derive(Clone)]
pub enum SignUpCredential {
    Password(String),
    Federated(FederatedProof),
}

#[derive(Clone)]
pub struct SignUpParams {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub credential: SignUpCredential,
    pub track_events: bool,
    pub news_letter: bool,
    /// `None` creates a new platform; `Some` joins an existing one by
    /// invitation
    pub platform_id: Option<String>,
}

#[derive(Clone)]
pub struct SignInParams {
    pub email: String,
    pub password: String,
    pub predefined_platform_id: Option<String>,
}

pub struct AuthenticationService {
    edition: Edition,
    identities: Arc<IdentityService>,
    passwords: Arc<PasswordService>,
    platforms: Arc<dyn PlatformRepository>,
    users: Arc<dyn UserRepository>,
    unit_of_work: Arc<dyn SignUpUnitOfWork>,
    membership: Arc<PlatformMembershipResolver>,
    tokens: Arc<TokenIssuer>,
    policy: Arc<dyn AuthPolicy>,
    invitations: Arc<InvitationService>,
    verification: Arc<dyn VerificationPolicy>,
    otp: Arc<OtpService>,
    federated: Arc<dyn FederatedVerifier>,
    side_effects: SignUpSideEffects,
}

impl AuthenticationService {
    pub fn builder<S: AuthStore + 'static>(
        store: Arc<S>,
        edition: Edition,
        auth_config: AuthConfig,
    ) -> AuthenticationServiceBuilder {
        AuthenticationServiceBuilder::new(store, edition, auth_config)
    }

    pub fn edition(&self) -> Edition {
        self.edition
    }

    pub fn tokens(&self) -> &Arc<TokenIssuer> {
        &self.tokens
    }

    pub fn invitations(&self) -> &Arc<InvitationService> {
        &self.invitations
    }

    pub async fn sign_up(&self, params: SignUpParams) -> Result<AuthenticationResponse> {
        let result = self.sign_up_inner(params).await;
        observe("sign_up", result)
    }

    async fn sign_up_inner(&self, params: SignUpParams) -> Result<AuthenticationResponse> {
        let (input, federated) = self.identity_input(&params).await?;
        match params.platform_id.as_deref() {
            None => self.sign_up_root(input, federated).await,
            Some(platform_id) => self.sign_up_member(input, platform_id).await,
        }
    }

    async fn identity_input(&self, params: &SignUpParams) -> Result<(NewIdentity, bool)> {
        match &params.credential {
            SignUpCredential::Password(password) => {
                self.passwords.validate_email(&params.email)?;
                Ok((
                    NewIdentity {
                        email: params.email.clone(),
                        first_name: params.first_name.clone(),
                        last_name: params.last_name.clone(),
                        password: Some(password.clone()),
                        provider: IdentityProvider::Email,
                        verified: false,
                        track_events: params.track_events,
                        news_letter: params.news_letter,
                    },
                    false,
                ))
            }
            SignUpCredential::Federated(proof) => {
                let profile = self.federated.verify(proof).await?;
                let first_name = if profile.first_name.is_empty() {
                    params.first_name.clone()
                } else {
                    profile.first_name
                };
                let last_name = if profile.last_name.is_empty() {
                    params.last_name.clone()
                } else {
                    profile.last_name
                };
                Ok((
                    NewIdentity {
                        email: profile.email,
                        first_name,
                        last_name,
                        password: None,
                        provider: profile.provider,
                        verified: true,
                        track_events: params.track_events,
                        news_letter: params.news_letter,
                    },
                    true,
                ))
            }
        }
    }

    /// New identity owning a new platform with a default project
    async fn sign_up_root(&self, mut input: NewIdentity, federated: bool) -> Result<AuthenticationResponse> {
        input.verified = federated || self.verification.verified_on_sign_up();
        let identity = self.identities.build(input)?;

        let user = User::new(&identity.id, PlatformRole::Admin);
        let platform = Platform::new(&user.id, Platform::personal_name(&identity.first_name));
        let user = user.with_platform(&platform.id);
        let project = Project::default_for(&user.id, &platform.id);

        let sign_up = RootSignUp {
            identity,
            user,
            platform,
            project,
        };
        self.unit_of_work.commit_root_sign_up(&sign_up).await?;
        let RootSignUp {
            identity,
            user,
            platform,
            project,
        } = sign_up;

        info!(
            identity_id = %identity.id,
            user_id = %user.id,
            platform_id = %platform.id,
            edition = %self.edition,
            "Root sign-up completed"
        );
        metrics::counter!("fg_auth_sign_ups_total", "kind" => "root").increment(1);

        if !identity.verified {
            // The account exists either way; a lost challenge can be re-sent
            if let Err(e) = self.verification.after_sign_up(&identity).await {
                warn!(error = %e, identity_id = %identity.id, "Verification challenge could not be delivered");
            }
        }

        self.side_effects
            .run(&identity, &user, &platform.id, &project.id)
            .await;

        self.tokens
            .get_project_and_token(&user.id, &platform.id, Some(&project.id))
            .await
    }

    /// New identity joining an existing platform it was invited to
    async fn sign_up_member(&self, mut input: NewIdentity, platform_id: &str) -> Result<AuthenticationResponse> {
        self.policy
            .assert_email_auth_enabled(platform_id, input.provider)
            .await?;
        self.policy
            .assert_domain_allowed(&input.email, platform_id)
            .await?;
        let invitation = self
            .invitations
            .assert_user_is_invited(&input.email, platform_id)
            .await?;

        input.verified = true;
        let identity = self.identities.build(input)?;
        let user = User::new(&identity.id, invitation.platform_role).with_platform(platform_id);
        // Settle the project first so a bad reference writes nothing
        let project = self
            .tokens
            .resolve_project(&user, platform_id, invitation.project_id.as_deref())
            .await?;

        self.unit_of_work
            .commit_member_sign_up(&MemberSignUp {
                new_identity: Some(identity.clone()),
                user: user.clone(),
                invitation_email: identity.email.clone(),
            })
            .await?;

        info!(
            identity_id = %identity.id,
            user_id = %user.id,
            platform_id = %platform_id,
            "Invited sign-up completed"
        );
        metrics::counter!("fg_auth_sign_ups_total", "kind" => "member").increment(1);

        self.tokens
            .get_project_and_token(&user.id, platform_id, Some(&project.id))
            .await
    }

    pub async fn sign_in_with_password(&self, params: SignInParams) -> Result<AuthenticationResponse> {
        let result = self.sign_in_inner(params).await;
        if result.is_ok() {
            metrics::counter!("fg_auth_sign_ins_total", "method" => "password").increment(1);
        }
        observe("sign_in", result)
    }

    async fn sign_in_inner(&self, params: SignInParams) -> Result<AuthenticationResponse> {
        let identity = self
            .identities
            .verify_password(&params.email, &params.password)
            .await
            .map_err(|e| match e {
                PlatformError::InvalidCredentials => {
                    PlatformError::authentication_failed("Invalid email or password")
                }
                other => other,
            })?;

        if !identity.verified {
            return Err(PlatformError::EmailNotVerified {
                email: identity.email.clone(),
            });
        }

        let platform_id = match params.predefined_platform_id {
            Some(platform_id) => {
                self.platforms
                    .find_platform(&platform_id)
                    .await?
                    .ok_or_else(|| PlatformError::authentication_failed("No platform found for identity"))?;
                platform_id
            }
            None if self.edition.is_multi_tenant() => self
                .membership
                .personal_platform(&identity.id)
                .await?
                .map(|p| p.id)
                .ok_or_else(|| PlatformError::authentication_failed("No platform found for identity"))?,
            None => return Err(PlatformError::authentication_failed("No platform found for identity")),
        };

        self.policy
            .assert_email_auth_enabled(&platform_id, IdentityProvider::Email)
            .await?;
        self.policy
            .assert_domain_allowed(&identity.email, &platform_id)
            .await?;

        let user = self.active_user(&identity, &platform_id).await?;
        debug!(user_id = %user.id, platform_id = %platform_id, "Password sign-in");
        self.tokens.get_project_and_token(&user.id, &platform_id, None).await
    }

    /// Sign in with a provider proof. Binds to the oldest platform of the
    /// installation.
    pub async fn federated_authn(&self, proof: FederatedProof) -> Result<AuthenticationResponse> {
        let result = self.federated_inner(proof).await;
        if result.is_ok() {
            metrics::counter!("fg_auth_sign_ins_total", "method" => "federated").increment(1);
        }
        observe("federated", result)
    }

    async fn federated_inner(&self, proof: FederatedProof) -> Result<AuthenticationResponse> {
        let profile = self.federated.verify(&proof).await?;

        let platform = self
            .platforms
            .find_oldest_platform()
            .await?
            .ok_or_else(|| PlatformError::authentication_failed("No platform found"))?;

        // Nothing is written until the binding is known to exist, so a
        // rejected attempt cannot claim the email ahead of an invited sign-up
        let existing = self
            .identities
            .find_by_email(&profile.email)
            .await?
            .ok_or_else(|| PlatformError::authentication_failed("No account for federated identity"))?;
        let user = self.active_user(&existing, &platform.id).await?;

        self.identities.verify_federated(&profile).await?;
        self.tokens.get_project_and_token(&user.id, &platform.id, None).await
    }

    pub async fn switch_platform(&self, identity_id: &str, platform_id: &str) -> Result<AuthenticationResponse> {
        let result = self.switch_platform_inner(identity_id, platform_id).await;
        observe("switch_platform", result)
    }

    async fn switch_platform_inner(&self, identity_id: &str, platform_id: &str) -> Result<AuthenticationResponse> {
        let platform = self
            .membership
            .list_platforms(identity_id)
            .await?
            .into_iter()
            .find(|p| p.id == platform_id)
            .ok_or_else(|| PlatformError::authentication_failed("Identity is not a member of this platform"))?;

        if !platform.is_user_switchable() {
            return Err(PlatformError::authentication_failed(
                "Platform does not allow switching into it",
            ));
        }

        let identity = self.identities.find(identity_id).await?;
        let user = self.active_user(&identity, &platform.id).await?;
        info!(user_id = %user.id, platform_id = %platform.id, "Platform switched");
        self.tokens.get_project_and_token(&user.id, &platform.id, None).await
    }

    /// Re-issue for a caller already holding a session for user/platform.
    /// Deactivated users stop receiving tokens even if their current one is
    /// still valid.
    pub async fn switch_project(
        &self,
        user_id: &str,
        platform_id: &str,
        project_id: &str,
    ) -> Result<AuthenticationResponse> {
        let result = self.switch_project_inner(user_id, platform_id, project_id).await;
        observe("switch_project", result)
    }

    async fn switch_project_inner(
        &self,
        user_id: &str,
        platform_id: &str,
        project_id: &str,
    ) -> Result<AuthenticationResponse> {
        let user = self
            .users
            .find_user(user_id)
            .await?
            .filter(|u| u.belongs_to(platform_id))
            .ok_or_else(|| PlatformError::authentication_failed("User not found on platform"))?;
        if !user.is_active() {
            return Err(PlatformError::authentication_failed("User is inactive"));
        }
        self.tokens
            .get_project_and_token(&user.id, platform_id, Some(project_id))
            .await
    }

    /// Confirm the outstanding email challenge and mark the identity verified
    pub async fn verify_email(&self, identity_id: &str, otp: &str) -> Result<UserIdentity> {
        let result = async {
            self.otp
                .confirm(identity_id, OtpType::EmailVerification, otp)
                .await?;
            self.identities.verify(identity_id).await
        }
        .await;
        observe("verify_email", result)
    }

    /// Issue a fresh email challenge. Unknown or already verified emails
    /// succeed without sending anything.
    pub async fn resend_email_verification(&self, email: &str) -> Result<()> {
        let Some(identity) = self.identities.find_by_email(email).await? else {
            debug!("Verification resend for unknown email ignored");
            return Ok(());
        };
        if identity.verified {
            return Ok(());
        }
        self.otp
            .create_and_send(&identity, OtpType::EmailVerification)
            .await
    }

    /// Existing identity joins another platform it was invited to
    pub async fn accept_invitation(&self, identity_id: &str, platform_id: &str) -> Result<AuthenticationResponse> {
        let result = self.accept_invitation_inner(identity_id, platform_id).await;
        observe("accept_invitation", result)
    }

    async fn accept_invitation_inner(&self, identity_id: &str, platform_id: &str) -> Result<AuthenticationResponse> {
        let identity = self.identities.find(identity_id).await?;

        self.policy
            .assert_email_auth_enabled(platform_id, identity.provider)
            .await?;
        self.policy
            .assert_domain_allowed(&identity.email, platform_id)
            .await?;
        let invitation = self
            .invitations
            .assert_user_is_invited(&identity.email, platform_id)
            .await?;

        if self
            .users
            .find_user_by_identity_and_platform(&identity.id, platform_id)
            .await?
            .is_some()
        {
            return Err(PlatformError::conflict(
                "User",
                "identityId+platformId",
                format!("{}+{}", identity.id, platform_id),
            ));
        }

        let user = User::new(&identity.id, invitation.platform_role).with_platform(platform_id);
        let project = self
            .tokens
            .resolve_project(&user, platform_id, invitation.project_id.as_deref())
            .await?;
        self.unit_of_work
            .commit_member_sign_up(&MemberSignUp {
                new_identity: None,
                user: user.clone(),
                invitation_email: identity.email.clone(),
            })
            .await?;

        info!(identity_id = %identity.id, platform_id = %platform_id, "Invitation accepted");
        self.tokens
            .get_project_and_token(&user.id, platform_id, Some(&project.id))
            .await
    }

    /// Platform a request targets. Cloud keeps the explicit id; self-hosted
    /// editions fall back to the installation's oldest platform so later
    /// sign-ups join it by invitation.
    pub async fn resolve_request_platform(&self, explicit: Option<String>) -> Result<Option<String>> {
        if self.edition.is_multi_tenant() || explicit.is_some() {
            return Ok(explicit);
        }
        Ok(self.platforms.find_oldest_platform().await?.map(|p| p.id))
    }

    async fn active_user(&self, identity: &UserIdentity, platform_id: &str) -> Result<User> {
        let user = self
            .users
            .find_user_by_identity_and_platform(&identity.id, platform_id)
            .await?
            .ok_or_else(|| PlatformError::authentication_failed("User not found on platform"))?;
        if !user.is_active() {
            return Err(PlatformError::authentication_failed("User is inactive"));
        }
        Ok(user)
    }
}

fn observe<T>(flow: &'static str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        metrics::counter!("fg_auth_failures_total", "flow" => flow, "code" => e.code()).increment(1);
        match e {
            PlatformError::Database(_) | PlatformError::Json(_) | PlatformError::Internal { .. } => {
                error!(flow, error = %e, "Authentication flow failed");
            }
            _ => debug!(flow, code = e.code(), error = %e, "Authentication flow rejected"),
        }
    }
    result
}

/// Wires the services from one store. Collaborators default to the logging
/// implementations.
pub struct AuthenticationServiceBuilder {
    edition: Edition,
    auth_config: AuthConfig,
    store: StoreHandles,
    password_policy: PasswordPolicy,
    argon2: Argon2Config,
    otp_ttl: Duration,
    challenge_sender: Arc<dyn ChallengeSender>,
    federated: Arc<dyn FederatedVerifier>,
    telemetry: Arc<dyn TelemetryReporter>,
    newsletter: Arc<dyn NewsletterSubscriber>,
}

struct StoreHandles {
    identities: Arc<dyn IdentityRepository>,
    platforms: Arc<dyn PlatformRepository>,
    users: Arc<dyn UserRepository>,
    projects: Arc<dyn ProjectRepository>,
    invitations: Arc<dyn InvitationRepository>,
    otps: Arc<dyn OtpRepository>,
    flags: Arc<dyn FlagRepository>,
    unit_of_work: Arc<dyn SignUpUnitOfWork>,
}

impl AuthenticationServiceBuilder {
    fn new<S: AuthStore + 'static>(store: Arc<S>, edition: Edition, auth_config: AuthConfig) -> Self {
        let store = StoreHandles {
            identities: store.clone(),
            platforms: store.clone(),
            users: store.clone(),
            projects: store.clone(),
            invitations: store.clone(),
            otps: store.clone(),
            flags: store.clone(),
            unit_of_work: store,
        };
        Self {
            edition,
            auth_config,
            store,
            password_policy: PasswordPolicy::default(),
            argon2: Argon2Config::default(),
            otp_ttl: Duration::minutes(30),
            challenge_sender: Arc::new(LoggingChallengeSender),
            federated: Arc::new(DisabledFederatedVerifier),
            telemetry: Arc::new(LoggingTelemetryReporter),
            newsletter: Arc::new(LoggingNewsletterSubscriber),
        }
    }

    pub fn password_policy(mut self, policy: PasswordPolicy) -> Self {
        self.password_policy = policy;
        self
    }

    pub fn argon2(mut self, config: Argon2Config) -> Self {
        self.argon2 = config;
        self
    }

    pub fn otp_ttl(mut self, ttl: Duration) -> Self {
        self.otp_ttl = ttl;
        self
    }

    pub fn challenge_sender(mut self, sender: Arc<dyn ChallengeSender>) -> Self {
        self.challenge_sender = sender;
        self
    }

    pub fn federated_verifier(mut self, verifier: Arc<dyn FederatedVerifier>) -> Self {
        self.federated = verifier;
        self
    }

    pub fn telemetry(mut self, reporter: Arc<dyn TelemetryReporter>) -> Self {
        self.telemetry = reporter;
        self
    }

    pub fn newsletter(mut self, subscriber: Arc<dyn NewsletterSubscriber>) -> Self {
        self.newsletter = subscriber;
        self
    }

    pub fn build(self) -> Result<AuthenticationService> {
        let store = self.store;
        let passwords = Arc::new(PasswordService::new(self.password_policy, self.argon2)?);
        let identities = Arc::new(IdentityService::new(store.identities.clone(), passwords.clone()));
        let tokens = Arc::new(TokenIssuer::new(
            self.auth_config,
            store.users.clone(),
            store.identities.clone(),
            store.platforms.clone(),
            store.projects.clone(),
        ));
        let invitations = Arc::new(InvitationService::new(
            store.invitations.clone(),
            store.identities.clone(),
            store.users.clone(),
            store.platforms.clone(),
            store.projects.clone(),
        ));
        let otp = Arc::new(OtpService::new(store.otps.clone(), self.challenge_sender, self.otp_ttl));
        let verification = verification_for_edition(self.edition, otp.clone());

        info!(edition = %self.edition, verification = verification.name(), "Authentication service ready");

        Ok(AuthenticationService {
            edition: self.edition,
            identities,
            passwords,
            platforms: store.platforms.clone(),
            users: store.users.clone(),
            unit_of_work: store.unit_of_work,
            membership: Arc::new(PlatformMembershipResolver::new(store.platforms.clone())),
            tokens,
            policy: Arc::new(PlatformAuthPolicy::new(store.platforms)),
            invitations,
            verification,
            otp,
            federated: self.federated,
            side_effects: SignUpSideEffects::new(store.flags, self.telemetry, self.newsletter),
        })
    }
}
