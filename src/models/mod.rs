//! Data models
//!
//! Structures shared across the clinic backend:
//! - Database entities (Role, User, Session, Patient, Therapist, Disease)
//! - API request types (create/update inputs)
//! - List filtering helpers

mod disease;
mod list;
mod patient;
mod role;
mod session;
mod therapist;
mod user;

pub use disease::{Disease, DiseaseInput};
pub use list::{DateRange, ListFilter, StringList};
pub use patient::{CreatePatientInput, Patient, UpdatePatientInput};
pub use role::Role;
pub use session::{Session, SessionWithRole};
pub use therapist::{CreateTherapistInput, Therapist, UpdateTherapistInput};
pub use user::{User, DEFAULT_ROLE_ID};

/// Replace `target` when `value` carries a non-empty string.
///
/// Partial updates ignore blank strings the same way they ignore missing keys.
pub(crate) fn merge_string(target: &mut String, value: Option<String>) {
    if let Some(value) = value {
        if !value.is_empty() {
            *target = value;
        }
    }
}

/// Replace `target` when `value` carries a non-zero number.
pub(crate) fn merge_number(target: &mut i32, value: Option<i32>) {
    if let Some(value) = value {
        if value != 0 {
            *target = value;
        }
    }
}
