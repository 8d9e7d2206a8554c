//! Role model

use serde::{Deserialize, Serialize};

/// Role assigned to a user account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
}
