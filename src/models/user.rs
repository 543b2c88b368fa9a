//! User and group models
//!
//! Authentication lives outside this crate; a `User` here is the identity an
//! authenticated request resolved to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registered member of the club site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Username (unique)
    pub username: String,
    pub email: String,
    /// Can access the administration surface
    #[serde(default)]
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new user. The ID is assigned by the database.
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: 0,
            username: username.into(),
            email: email.into(),
            is_staff: false,
            created_at: Utc::now(),
        }
    }
}

/// Named group of users, e.g. the moderators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    /// Group name (unique)
    pub name: String,
}
