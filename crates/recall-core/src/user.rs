//! User records.
//!
//! The core trusts an already-identified user; this record only tracks
//! first/last use and device info for the init dialog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A known user of the service; unique on `user_id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Stable user identifier.
    pub user_id: String,
    /// First time this user was seen.
    pub first_used: DateTime<Utc>,
    /// Last activity time.
    pub last_active: DateTime<Utc>,
    /// Free-form device description.
    #[serde(default)]
    pub device_info: String,
    /// Arbitrary metadata.
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
    /// Record creation time.
    pub created_at: DateTime<Utc>,
    /// Record update time.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a user record stamped now.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            first_used: now,
            last_active: now,
            device_info: String::new(),
            metadata: serde_json::Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Refresh activity timestamps.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.last_active {
            self.last_active = now;
        }
        self.updated_at = now;
    }
}
