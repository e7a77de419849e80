//! FlowGate shared types
//!
//! Types that every FlowGate crate agrees on: the deployment edition and the
//! logging bootstrap used by the binaries.

pub mod logging;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;

// ============================================================================
// Deployment Edition
// ============================================================================

/// Deployment mode of a FlowGate installation.
///
/// The edition is read once from configuration and handed to the services
/// that branch on it. Nothing in the workspace reads it from global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Edition {
    /// Multi-tenant hosted service
    Cloud,
    /// Self-hosted, open source
    Community,
    /// Self-hosted, licensed
    Enterprise,
}

impl Default for Edition {
    fn default() -> Self {
        Self::Community
    }
}

impl Edition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cloud => "CLOUD",
            Self::Community => "COMMUNITY",
            Self::Enterprise => "ENTERPRISE",
        }
    }

    /// Multi-tenant editions let one identity own several personal platforms.
    pub fn is_multi_tenant(&self) -> bool {
        matches!(self, Self::Cloud)
    }

    /// Self-hosted editions run a single platform per installation.
    pub fn is_self_hosted(&self) -> bool {
        !self.is_multi_tenant()
    }
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unknown edition: {0}")]
pub struct UnknownEdition(pub String);

impl FromStr for Edition {
    type Err = UnknownEdition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CLOUD" => Ok(Self::Cloud),
            "COMMUNITY" | "CE" => Ok(Self::Community),
            "ENTERPRISE" | "EE" => Ok(Self::Enterprise),
            other => Err(UnknownEdition(other.to_string())),
        }
    }
}
