//! Session token signing
//!
//! Session tokens are HS256 JWTs signed with the configured secret. Each
//! token carries a random `jti`, so two logins in the same second still
//! produce distinct tokens.

use chrono::{DateTime, Duration, Utc};
use data_encoding::BASE64URL_NOPAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const JWT_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Errors from issuing or verifying a token
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is malformed: {0}")]
    Malformed(String),

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("signing key rejected: {0}")]
    InvalidKey(String),

    #[error("token lifetime is out of range")]
    TtlOutOfRange,
}

/// JWT claims carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub email: String,
    /// Role id of the account
    pub role: i64,
    /// Expiry, seconds since epoch
    pub exp: i64,
    /// Issued at, seconds since epoch
    pub iat: i64,
    pub jti: String,
}

/// A freshly signed token and the instant it stops being valid
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies HS256 session tokens
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    /// Sign a token for `email` valid from `now` for the configured TTL.
    pub fn issue(
        &self,
        email: &str,
        role: i64,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or(TokenError::TtlOutOfRange)?;
        let claims = Claims {
            email: email.to_string(),
            role,
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let payload =
            serde_json::to_vec(&claims).map_err(|e| TokenError::Malformed(e.to_string()))?;
        let signing_input = format!("{}.{}", encode(JWT_HEADER.as_bytes()), encode(&payload));
        let signature = self.mac(&signing_input)?.finalize().into_bytes();

        Ok(IssuedToken {
            token: format!("{}.{}", signing_input, encode(&signature)),
            expires_at,
        })
    }

    /// Check the signature and expiry of `token` at `now`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed("expected three segments".to_string()));
        };

        let signature = decode(signature)?;
        self.mac(&format!("{}.{}", header, payload))?
            .verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let header: serde_json::Value = serde_json::from_slice(&decode(header)?)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;
        if header["alg"] != "HS256" {
            return Err(TokenError::Malformed("unsupported algorithm".to_string()));
        }

        let claims: Claims = serde_json::from_slice(&decode(payload)?)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;
        if claims.exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    fn mac(&self, signing_input: &str) -> Result<HmacSha256, TokenError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| TokenError::InvalidKey(e.to_string()))?;
        mac.update(signing_input.as_bytes());
        Ok(mac)
    }
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

fn encode(bytes: &[u8]) -> String {
    BASE64URL_NOPAD.encode(bytes)
}

fn decode(segment: &str) -> Result<Vec<u8>, TokenError> {
    BASE64URL_NOPAD
        .decode(segment.as_bytes())
        .map_err(|e| TokenError::Malformed(format!("base64 decode failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn signer() -> TokenSigner {
        TokenSigner::new("test-secret", Duration::hours(1))
    }

    #[test]
    fn test_issue_and_verify() {
        let now = Utc::now();
        let issued = signer().issue("ann@clinic.test", 1, now).unwrap();
        assert_eq!(issued.expires_at, now + Duration::hours(1));

        let claims = signer().verify(&issued.token, now).unwrap();
        assert_eq!(claims.email, "ann@clinic.test");
        assert_eq!(claims.role, 1);
        assert_eq!(claims.iat, now.timestamp());
        assert_eq!(claims.exp, issued.expires_at.timestamp());
    }

    #[test]
    fn test_tokens_are_unique() {
        let now = Utc::now();
        let a = signer().issue("ann@clinic.test", 1, now).unwrap();
        let b = signer().issue("ann@clinic.test", 1, now).unwrap();
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_expired_token_rejected() {
        let now = Utc::now();
        let issued = signer().issue("ann@clinic.test", 1, now).unwrap();

        let later = now + Duration::hours(2);
        assert!(matches!(
            signer().verify(&issued.token, later),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let now = Utc::now();
        let issued = signer().issue("ann@clinic.test", 1, now).unwrap();

        let other = TokenSigner::new("other-secret", Duration::hours(1));
        assert!(matches!(
            other.verify(&issued.token, now),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let now = Utc::now();
        let issued = signer().issue("ann@clinic.test", 1, now).unwrap();
        let parts: Vec<&str> = issued.token.split('.').collect();

        let forged_claims = Claims {
            email: "ann@clinic.test".to_string(),
            role: 2,
            exp: now.timestamp() + 3600,
            iat: now.timestamp(),
            jti: "forged".to_string(),
        };
        let forged_payload = encode(&serde_json::to_vec(&forged_claims).unwrap());
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert!(matches!(
            signer().verify(&forged, now),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_unrepresentable_expiry_rejected() {
        let huge = TokenSigner::new("test-secret", Duration::weeks(1_000_000_000));
        assert!(matches!(
            huge.issue("ann@clinic.test", 1, Utc::now()),
            Err(TokenError::TtlOutOfRange)
        ));
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        let now = Utc::now();
        for token in ["", "abc", "a.b", "a.b.c.d", "a.b.!!!"] {
            assert!(
                matches!(signer().verify(token, now), Err(TokenError::Malformed(_))),
                "{token:?} should be malformed"
            );
        }
    }

    proptest! {
        #[test]
        fn issued_tokens_always_verify(email in "[a-z]{1,12}@[a-z]{1,8}\\.test", role in 1i64..10) {
            let now = Utc::now();
            let issued = signer().issue(&email, role, now).unwrap();
            let claims = signer().verify(&issued.token, now).unwrap();
            prop_assert_eq!(claims.email, email);
            prop_assert_eq!(claims.role, role);
        }
    }
}
