//! Therapist model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{merge_number, merge_string};

/// Therapist record. New therapists start unapproved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Therapist {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub phone_number: String,
    pub address: String,
    pub date_of_birth: String,
    /// National identity number
    pub nik: String,
    pub weight: i32,
    pub height: i32,
    pub role: String,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for registering a therapist
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateTherapistInput {
    pub full_name: String,
    pub email: String,
    pub password: Option<String>,
    pub phone_number: String,
    pub address: String,
    pub date_of_birth: String,
    pub nik: String,
    pub weight: i32,
    pub height: i32,
    pub role: String,
}

impl CreateTherapistInput {
    /// Name of the first required field that is missing, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        let text_fields = [
            ("FullName", &self.full_name),
            ("Email", &self.email),
            ("PhoneNumber", &self.phone_number),
            ("Address", &self.address),
            ("DateOfBirth", &self.date_of_birth),
            ("NIK", &self.nik),
        ];
        for (name, value) in text_fields {
            if value.trim().is_empty() {
                return Some(name);
            }
        }
        if self.weight <= 0 {
            return Some("Weight");
        }
        if self.height <= 0 {
            return Some("Height");
        }
        if self.role.trim().is_empty() {
            return Some("Role");
        }
        None
    }

    /// Build the record to insert; `password_hash` is computed by the caller.
    pub fn into_therapist(self, password_hash: Option<String>) -> Therapist {
        let now = Utc::now();
        Therapist {
            id: 0,
            full_name: self.full_name.trim().to_string(),
            email: self.email.trim().to_string(),
            password_hash,
            phone_number: self.phone_number,
            address: self.address,
            date_of_birth: self.date_of_birth,
            nik: self.nik.trim().to_string(),
            weight: self.weight,
            height: self.height,
            role: self.role,
            is_approved: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for a therapist; absent or blank fields keep their value
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateTherapistInput {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<String>,
    pub nik: Option<String>,
    pub weight: Option<i32>,
    pub height: Option<i32>,
    pub role: Option<String>,
    pub is_approved: Option<bool>,
}

impl UpdateTherapistInput {
    /// True when the payload tries to set the approval flag.
    pub fn requests_approval(&self) -> bool {
        self.is_approved == Some(true)
    }

    /// Merge profile fields into `therapist`. Approval and password are
    /// handled by the caller.
    pub fn apply_to(self, therapist: &mut Therapist) {
        merge_string(&mut therapist.full_name, self.full_name);
        merge_string(&mut therapist.email, self.email);
        merge_string(&mut therapist.phone_number, self.phone_number);
        merge_string(&mut therapist.address, self.address);
        merge_string(&mut therapist.date_of_birth, self.date_of_birth);
        merge_string(&mut therapist.nik, self.nik);
        merge_number(&mut therapist.weight, self.weight);
        merge_number(&mut therapist.height, self.height);
        merge_string(&mut therapist.role, self.role);
        therapist.updated_at = Utc::now();
    }
}
