//! User identity records kept alongside the tree cache.

use super::Username;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user discovered in storage and registered in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uid: Uuid,
    pub username: Username,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a user record with a fresh uid.
    ///
    /// # Arguments
    /// - `username`: Directory name the user was discovered under.
    ///
    /// # Returns
    /// A new [`User`] stamped with the current time.
    pub fn new(username: Username) -> Self {
        Self {
            uid: Uuid::new_v4(),
            username,
            created_at: Utc::now(),
        }
    }
}
