//! One-time tokens for email verification and password reset.
//!
//! The user receives 32 random bytes as hex; only the SHA3-256 of that
//! string is stored, so a database leak does not leak live links.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha3::{Digest, Sha3_256};

/// Lifetime of an email verification link
pub const EMAIL_VERIFICATION_TTL_HOURS: i64 = 24;

/// Lifetime of a password reset link
pub const PASSWORD_RESET_TTL_MINUTES: i64 = 10;

/// A freshly generated one-time token
#[derive(Debug, Clone)]
pub struct OneTimeToken {
    /// Sent to the user, never stored
    pub plain: String,
    /// Stored
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

impl OneTimeToken {
    pub fn generate(ttl: Duration) -> Self {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let plain = hex::encode(bytes);
        Self {
            hash: hash_token(&plain),
            plain,
            expires_at: Utc::now() + ttl,
        }
    }

    pub fn email_verification() -> Self {
        Self::generate(Duration::hours(EMAIL_VERIFICATION_TTL_HOURS))
    }

    pub fn password_reset() -> Self {
        Self::generate(Duration::minutes(PASSWORD_RESET_TTL_MINUTES))
    }
}

/// Hash a token as presented by the user for lookup
pub fn hash_token(plain: &str) -> String {
    hex::encode(Sha3_256::digest(plain.as_bytes()))
}
