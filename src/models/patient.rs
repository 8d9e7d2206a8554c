//! Patient model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{merge_number, merge_string, StringList};

/// Patient record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub full_name: String,
    /// Optional portal password (argon2)
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub gender: String,
    pub age: i32,
    pub job: String,
    pub address: String,
    /// Comma-joined phone numbers
    pub phone_number: String,
    /// Comma-joined health history entries
    pub health_history: String,
    pub surgery_history: String,
    pub patient_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for registering a patient
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreatePatientInput {
    pub full_name: String,
    pub password: Option<String>,
    pub gender: String,
    pub age: i32,
    pub job: String,
    pub address: String,
    pub phone_number: StringList,
    pub health_history: StringList,
    pub surgery_history: String,
    pub patient_code: String,
}

impl CreatePatientInput {
    /// Full name and at least one phone number are mandatory.
    pub fn has_required_fields(&self) -> bool {
        !self.full_name.trim().is_empty() && !self.phone_number.is_empty()
    }

    /// Build the record to insert; `password_hash` is computed by the caller.
    pub fn into_patient(self, password_hash: Option<String>) -> Patient {
        let now = Utc::now();
        Patient {
            id: 0,
            full_name: self.full_name.trim().to_string(),
            password_hash,
            gender: self.gender,
            age: self.age,
            job: self.job,
            address: self.address,
            phone_number: self.phone_number.joined(),
            health_history: self.health_history.joined(),
            surgery_history: self.surgery_history,
            patient_code: self.patient_code,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for a patient; absent or blank fields keep their value
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdatePatientInput {
    pub full_name: Option<String>,
    pub password: Option<String>,
    pub gender: Option<String>,
    pub age: Option<i32>,
    pub job: Option<String>,
    pub address: Option<String>,
    pub phone_number: Option<StringList>,
    pub health_history: Option<StringList>,
    pub surgery_history: Option<String>,
    pub patient_code: Option<String>,
}

impl UpdatePatientInput {
    /// Merge into `patient`. The password is handled separately because it
    /// must be hashed first.
    pub fn apply_to(self, patient: &mut Patient) {
        merge_string(&mut patient.full_name, self.full_name);
        merge_string(&mut patient.gender, self.gender);
        merge_number(&mut patient.age, self.age);
        merge_string(&mut patient.job, self.job);
        merge_string(&mut patient.address, self.address);
        merge_string(
            &mut patient.phone_number,
            self.phone_number.map(|list| list.joined()),
        );
        merge_string(
            &mut patient.health_history,
            self.health_history.map(|list| list.joined()),
        );
        merge_string(&mut patient.surgery_history, self.surgery_history);
        merge_string(&mut patient.patient_code, self.patient_code);
        patient.updated_at = Utc::now();
    }
}
