//! Session tokens handed out after login.
//!
//! HS256-signed JWTs carrying the user's email and id. Every authenticated
//! route verifies one of these before the handler runs.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Email of the signed-in user.
    pub sub: String,
    pub user_id: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error, PartialEq)]
pub enum AuthError {
    #[error("missing bearer token")]
    Missing,
    #[error("session expired")]
    Expired,
    #[error("invalid session token")]
    Invalid,
    #[error("session secret: {0}")]
    Config(String),
    #[error("failed to sign session token: {0}")]
    Signing(String),
}

#[derive(Clone)]
pub struct SessionKeys {
    secret: String,
    expiry_hours: i64,
}

impl SessionKeys {
    pub fn new(secret: String, expiry_hours: i64) -> Result<Self, AuthError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::Config(format!(
                "must be at least {} characters",
                MIN_SECRET_LEN
            )));
        }
        Ok(Self {
            secret,
            expiry_hours: expiry_hours.max(1),
        })
    }

    /// Random secret for a process that has none configured. Tokens die with
    /// the process.
    pub fn ephemeral(expiry_hours: i64) -> Self {
        let bytes: [u8; 32] = rand::random();
        let secret: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
        Self {
            secret,
            expiry_hours: expiry_hours.max(1),
        }
    }

    pub fn issue(&self, email: &str, user_id: &str) -> Result<String, AuthError> {
        let now = chrono::Utc::now().timestamp();
        self.issue_at(email, user_id, now, now + self.expiry_hours * 3600)
    }

    fn issue_at(&self, email: &str, user_id: &str, iat: i64, exp: i64) -> Result<String, AuthError> {
        let claims = Claims {
            sub: email.to_string(),
            user_id: user_id.to_string(),
            iat,
            exp,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AuthError::Signing(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|err| match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::Invalid,
        })
    }

    /// Pull the token out of an `Authorization: Bearer ...` header value.
    pub fn verify_header(&self, header: Option<&str>) -> Result<Claims, AuthError> {
        let token = header
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::Missing)?;
        self.verify(token)
    }
}
