//! Installation-wide flags

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Set once the first user of the installation signs up
pub const USER_CREATED_FLAG: &str = "USER_CREATED";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flag {
    pub id: String,
    pub value: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl Flag {
    pub fn new(id: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            value,
            updated_at: Utc::now(),
        }
    }

    pub fn is_true(&self) -> bool {
        self.value.as_bool().unwrap_or(false)
    }
}
