//! Services layer - Business logic
//!
//! Services validate input, apply the clinic's rules and coordinate the
//! repositories. Handlers only translate HTTP to service calls and back.

pub mod auth;
pub mod disease;
pub mod error;
pub mod password;
pub mod patient;
pub mod therapist;
pub mod token;

pub use auth::{AuthService, ClientInfo, LoginInput, SignupInput};
pub use disease::DiseaseService;
pub use error::{ServiceError, ServiceResult};
pub use password::{hash_password, verify_password, PasswordHasher};
pub use patient::PatientService;
pub use therapist::TherapistService;
pub use token::{Claims, IssuedToken, TokenError, TokenSigner};

/// One page of a listing together with the number of matching rows
#[derive(Debug, Clone)]
pub struct ListResult<T> {
    pub total: i64,
    pub items: Vec<T>,
}
