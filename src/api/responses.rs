//! Success envelope
//!
//! Every successful endpoint answers with
//! `{"code": 200, "status": "success", "message": ..., "data": ...}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::models::{Patient, Therapist};

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiSuccess<T> {
    pub code: u16,
    pub status: String,
    pub message: String,
    pub data: T,
}

impl<T> ApiSuccess<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            status: "success".to_string(),
            message: message.into(),
            data,
        }
    }
}

impl ApiSuccess<()> {
    /// Envelope with `"data": null`
    pub fn message(message: impl Into<String>) -> Self {
        Self::ok(message, ())
    }
}

impl<T: Serialize> IntoResponse for ApiSuccess<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

/// Patient listing payload
#[derive(Debug, Serialize, Deserialize)]
pub struct PatientListData {
    pub total: i64,
    pub patients: Vec<Patient>,
}

/// Therapist listing payload
#[derive(Debug, Serialize, Deserialize)]
pub struct TherapistListData {
    pub total: i64,
    pub therapist: Vec<Therapist>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let value = serde_json::to_value(ApiSuccess::ok("Disease retrieved", 7)).unwrap();
        assert_eq!(value["code"], 200);
        assert_eq!(value["status"], "success");
        assert_eq!(value["message"], "Disease retrieved");
        assert_eq!(value["data"], 7);
    }

    #[test]
    fn test_message_only_envelope_has_null_data() {
        let value = serde_json::to_value(ApiSuccess::message("Logout successful")).unwrap();
        assert!(value["data"].is_null());
        assert!(value.as_object().unwrap().contains_key("data"));
    }
}
