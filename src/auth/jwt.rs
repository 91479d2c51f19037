//! Signed admin session tokens.
//!
//! Tokens are HS256 JWTs valid for 24 hours. Verification does not say why
//! a token was rejected: expired, tampered and malformed all come back as
//! `None`.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use super::AuthError;
use crate::db::admin::AdminUser;

pub const SESSION_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    pub user_id: i64,
    pub email: String,
    pub name: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

#[derive(Clone)]
pub struct JwtSessions {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: i64,
}

impl JwtSessions {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs: SESSION_TTL_SECS,
        }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    pub fn create_token(&self, user: &AdminUser) -> Result<String, AuthError> {
        self.create_token_at(user, chrono::Utc::now().timestamp())
    }

    pub fn create_token_at(&self, user: &AdminUser, now: i64) -> Result<String, AuthError> {
        let claims = SessionClaims {
            user_id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            iat: now,
            exp: now + self.ttl_secs,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Token(format!("Failed to generate token: {}", e)))
    }

    pub fn verify_token(&self, token: &str) -> Option<SessionClaims> {
        self.verify_token_at(token, chrono::Utc::now().timestamp())
    }

    /// Expiry is checked against `now` here rather than by the decoder, so
    /// tests can move the clock
    pub fn verify_token_at(&self, token: &str, now: i64) -> Option<SessionClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        let claims = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| tracing::debug!(error = %e, "Rejected session token"))
            .ok()?
            .claims;

        (now < claims.exp).then_some(claims)
    }
}
