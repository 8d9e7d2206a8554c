//! Disease model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::merge_string;

/// Disease catalogue entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Disease {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Disease {
    pub fn new(name: String, description: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name,
            description,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Create/update payload for a disease
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DiseaseInput {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl DiseaseInput {
    pub fn apply_to(self, disease: &mut Disease) {
        merge_string(&mut disease.name, self.name);
        merge_string(&mut disease.description, self.description);
        disease.updated_at = Utc::now();
    }
}
