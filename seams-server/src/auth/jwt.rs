//! Session tokens: HS256 JWTs signed with the server secret

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::MAX_JWT_TTL_DAYS;
use crate::db::User;
use crate::error::ApiError;

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User ID
    pub sub: String,
    pub role: String,
    pub name: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signing and validation keys for session tokens
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(secret: &[u8], ttl_days: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::try_days(ttl_days.clamp(1, MAX_JWT_TTL_DAYS))
                .unwrap_or_else(|| Duration::weeks(52)),
        }
    }

    /// Issue a session token for `user`
    pub fn issue(&self, user: &User) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user.id.to_string(),
            role: user.role.to_string(),
            name: user.name.clone(),
            email: user.email.clone(),
            iat: now.timestamp(),
            exp: now
                .checked_add_signed(self.ttl)
                .ok_or_else(|| ApiError::internal("Session expiry out of range"))?
                .timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
            tracing::error!(error = %e, "Failed to sign session token");
            ApiError::internal("Failed to issue session token")
        })
    }

    /// Validate signature and expiry
    pub fn validate(&self, token: &str) -> Result<SessionClaims, ApiError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        decode::<SessionClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    ApiError::auth_error("AUTH_TOKEN_EXPIRED", "Session token has expired")
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    ApiError::auth_error("AUTH_INVALID_TOKEN", "Invalid session token signature")
                }
                _ => ApiError::auth_error(
                    "AUTH_INVALID_TOKEN",
                    format!("Session token validation failed: {}", e),
                ),
            })
    }
}
