//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for a single table.

pub mod disease;
pub mod patient;
pub mod role;
pub mod session;
pub mod therapist;
pub mod user;

pub use disease::{DiseaseRepository, SqlxDiseaseRepository};
pub use patient::{PatientRepository, SqlxPatientRepository};
pub use role::{RoleRepository, SqlxRoleRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use therapist::{SqlxTherapistRepository, TherapistRepository};
pub use user::{SqlxUserRepository, UserRepository};
