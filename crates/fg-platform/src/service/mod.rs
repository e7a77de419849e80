//! Service Layer
//!
//! Business logic for the identity and session flows.

pub mod authentication;
pub mod federated;
pub mod identity;
pub mod invitation;
pub mod membership;
pub mod password;
pub mod policy;
pub mod side_effects;
pub mod token;
pub mod verification;

pub use authentication::{
    AuthenticationService, AuthenticationServiceBuilder, SignInParams, SignUpCredential, SignUpParams,
};
pub use federated::{
    DisabledFederatedVerifier, FederatedProfile, FederatedProof, FederatedVerifier, JwtFederatedVerifier,
};
pub use identity::{IdentityService, NewIdentity};
pub use invitation::InvitationService;
pub use membership::PlatformMembershipResolver;
pub use password::{Argon2Config, PasswordPolicy, PasswordService};
pub use policy::{AuthPolicy, PlatformAuthPolicy};
pub use side_effects::{
    LoggingNewsletterSubscriber, LoggingTelemetryReporter, NewsletterSubscriber, SignUpSideEffects,
    TelemetryReporter,
};
pub use token::{extract_bearer_token, AccessTokenClaims, AuthConfig, TokenIssuer};
pub use verification::{
    verification_for_edition, AutoVerification, ChallengeSender, EmailChallengeVerification,
    LoggingChallengeSender, OtpService, RecordingChallengeSender, VerificationPolicy,
};
