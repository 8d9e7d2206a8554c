//! User model
//!
//! Accounts created through signup. Passwords are stored as argon2 hashes
//! and never serialized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role id assigned to every self-registered account (`user`).
pub const DEFAULT_ROLE_ID: i64 = 1;

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Display name
    pub name: String,
    /// Email address (unique)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Foreign key into `roles`
    pub role_id: i64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new User.
    ///
    /// The password must already be hashed.
    pub fn new(name: String, email: String, password_hash: String, role_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            name,
            email,
            password_hash,
            role_id,
            created_at: now,
            updated_at: now,
        }
    }
}
