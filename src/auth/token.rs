//! JWT creation and verification for session and password-setup tokens.

use crate::config::AuthConfig;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Password-setup links stay valid for one hour.
pub const SETUP_TOKEN_TTL_MINUTES: i64 = 60;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Session,
    PasswordSetup,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub purpose: TokenPurpose,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Expired, tampered, malformed, or issued for another purpose.
    #[error("invalid token")]
    InvalidToken,
    #[error("token signing failed: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    session_ttl: Duration,
}

impl TokenKeys {
    pub fn new(cfg: &AuthConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.jwt_secret.as_bytes()),
            session_ttl: Duration::hours(cfg.session_ttl_hours),
        }
    }

    pub fn issue_session(&self, user_id: Uuid) -> Result<String, AuthError> {
        self.issue(user_id, TokenPurpose::Session, self.session_ttl)
    }

    pub fn issue_password_setup(&self, user_id: Uuid) -> Result<String, AuthError> {
        self.issue(
            user_id,
            TokenPurpose::PasswordSetup,
            Duration::minutes(SETUP_TOKEN_TTL_MINUTES),
        )
    }

    fn issue(&self, sub: Uuid, purpose: TokenPurpose, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub,
            purpose,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(AuthError::Signing)
    }

    /// Decode `token` and return its subject if it was issued for `purpose`.
    pub fn verify(&self, token: &str, purpose: TokenPurpose) -> Result<Uuid, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default()).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("rejected expired token"),
                _ => tracing::debug!("rejected token: {}", e),
            }
            AuthError::InvalidToken
        })?;

        if data.claims.purpose != purpose {
            tracing::debug!(
                expected = ?purpose,
                actual = ?data.claims.purpose,
                "rejected token issued for another purpose"
            );
            return Err(AuthError::InvalidToken);
        }
        Ok(data.claims.sub)
    }
}
