//! Project Entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::TsidGenerator;

pub const DEFAULT_PROJECT_NAME: &str = "Default Project";

/// A workspace within a platform
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// TSID as Crockford Base32 string
    pub id: String,
    pub owner_id: String,
    pub platform_id: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(
        owner_id: impl Into<String>,
        platform_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id: TsidGenerator::generate(),
            owner_id: owner_id.into(),
            platform_id: platform_id.into(),
            display_name: display_name.into(),
            created_at: Utc::now(),
        }
    }

    pub fn default_for(owner_id: impl Into<String>, platform_id: impl Into<String>) -> Self {
        Self::new(owner_id, platform_id, DEFAULT_PROJECT_NAME)
    }
}
