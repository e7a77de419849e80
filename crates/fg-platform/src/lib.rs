//! FlowGate Platform
//!
//! Identity and session core:
//! - Sign-up of root owners and invited members
//! - Password and federated sign-in
//! - Platform and project switching
//! - Access token issuance bound to (user, platform, project)
//! - Per-platform authentication policy and invitations
//! - Edition-dependent email verification

pub mod domain;
pub mod repository;
pub mod service;
pub mod api;
pub mod error;
pub mod tsid;

pub use domain::*;
pub use error::PlatformError;
pub use tsid::TsidGenerator;
