//! Session model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Login session, keyed by the signed session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    /// Signed token handed to the client
    pub session_token: String,
    /// Associated user ID
    pub user_id: i64,
    /// Expiration timestamp
    pub expires_at: DateTime<Utc>,
    /// Address the session was opened from
    pub client_ip: String,
    /// User agent the session was opened with
    pub browser: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set when the session is logged out
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Build a new, not yet persisted session.
    pub fn new(
        session_token: String,
        user_id: i64,
        expires_at: DateTime<Utc>,
        client_ip: String,
        browser: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            session_token,
            user_id,
            expires_at,
            client_ip,
            browser,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

/// Session joined with the owning user's role name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionWithRole {
    #[serde(flatten)]
    pub session: Session,
    pub role: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session_expiring_at(expires_at: DateTime<Utc>) -> Session {
        Session::new(
            "token".to_string(),
            1,
            expires_at,
            "127.0.0.1".to_string(),
            "curl/8.0".to_string(),
        )
    }

    #[test]
    fn test_session_with_role_flattens() {
        let now = Utc::now();
        let joined = SessionWithRole {
            session: session_expiring_at(now + Duration::hours(1)),
            role: "admin".to_string(),
        };

        let json = serde_json::to_value(&joined).unwrap();
        assert_eq!(json["role"], "admin");
        assert_eq!(json["session_token"], "token");
        assert_eq!(json["user_id"], 1);
    }
}
