//! Signed, time-boxed attendance tokens.
//!
//! A token is what an event's QR code encodes. It binds an event id and a
//! per-generation nonce to an expiry, and is authenticated with a keyed
//! SHA3-256 tag:
//!
//! ```text
//! base64url(cbor(claims)) "." base64url(SHA3-256(domain || len(key) || key || payload))
//! ```
//!
//! SHA-3 is not subject to length extension, so prefix keying is a sound MAC.
//! The nonce lets the server revoke every previously printed QR code by
//! generating a new one.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as B64, Engine};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use uuid::Uuid;

use crate::error::{Result, SeamsError, CURRENT_TOKEN_VERSION, MAX_TOKEN_LEN};

/// Minimum signing key length in bytes.
pub const MIN_KEY_LEN: usize = 32;

/// Tolerated clock drift for tokens issued "in the future".
const MAX_CLOCK_SKEW_SECS: i64 = 60;

const DOMAIN: &[u8] = b"seams-attendance-v1";
const TAG_LEN: usize = 32;

/// Claims carried by an attendance token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceClaims {
    pub v: u8,
    pub event_id: Uuid,
    pub nonce: Uuid,
    /// Unix seconds
    pub issued_at: i64,
    /// Unix seconds
    pub expires_at: i64,
}

impl AttendanceClaims {
    pub fn issued_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.issued_at, 0)
    }

    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.expires_at, 0)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.expires_at
    }

    fn to_cbor(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes)
            .map_err(|e| SeamsError::SerializationError(e.to_string()))?;
        Ok(bytes)
    }

    fn from_cbor(bytes: &[u8]) -> Result<Self> {
        let claims: Self = ciborium::from_reader(bytes)
            .map_err(|e| SeamsError::TokenMalformed(format!("payload: {}", e)))?;
        if claims.v != CURRENT_TOKEN_VERSION {
            return Err(SeamsError::UnsupportedTokenVersion(
                claims.v,
                CURRENT_TOKEN_VERSION,
            ));
        }
        if claims.expires_at <= claims.issued_at {
            return Err(SeamsError::TokenMalformed(
                "expiry precedes issue time".into(),
            ));
        }
        Ok(claims)
    }
}

/// A freshly issued token together with its decoded claims.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: AttendanceClaims,
}

/// Issues and verifies attendance tokens with a shared secret key.
#[derive(Clone)]
pub struct AttendanceSigner {
    key: Vec<u8>,
}

impl AttendanceSigner {
    /// Create a signer. Keys shorter than [`MIN_KEY_LEN`] are rejected.
    pub fn new(key: impl Into<Vec<u8>>) -> Result<Self> {
        let key = key.into();
        if key.len() < MIN_KEY_LEN {
            return Err(SeamsError::WeakSigningKey {
                len: key.len(),
                min: MIN_KEY_LEN,
            });
        }
        Ok(Self { key })
    }

    /// Generate a random key suitable for [`AttendanceSigner::new`].
    pub fn generate_key() -> Vec<u8> {
        let mut key = vec![0u8; MIN_KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut key);
        key
    }

    /// Issue a token for `event_id` valid for `ttl` from `now`, with a fresh nonce.
    pub fn issue(&self, event_id: Uuid, ttl: Duration, now: DateTime<Utc>) -> Result<IssuedToken> {
        if ttl <= Duration::zero() {
            return Err(SeamsError::InvalidInput("token ttl must be positive".into()));
        }
        let claims = AttendanceClaims {
            v: CURRENT_TOKEN_VERSION,
            event_id,
            nonce: Uuid::new_v4(),
            issued_at: now.timestamp(),
            expires_at: now
                .checked_add_signed(ttl)
                .ok_or_else(|| SeamsError::InvalidInput("token ttl out of range".into()))?
                .timestamp(),
        };
        let token = self.encode(&claims)?;
        Ok(IssuedToken { token, claims })
    }

    /// Verify signature, shape and expiry. Binding to the event's current
    /// nonce is the caller's job.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<AttendanceClaims> {
        let (payload, tag) = split_token(token)?;

        if !constant_time_eq(&self.tag(&payload), &tag) {
            return Err(SeamsError::TokenSignatureInvalid);
        }

        let claims = AttendanceClaims::from_cbor(&payload)?;

        if claims.issued_at > now.timestamp() + MAX_CLOCK_SKEW_SECS {
            return Err(SeamsError::TokenMalformed("issued in the future".into()));
        }
        if claims.is_expired(now) {
            return Err(SeamsError::QrExpired);
        }

        Ok(claims)
    }

    fn encode(&self, claims: &AttendanceClaims) -> Result<String> {
        let payload = claims.to_cbor()?;
        let tag = self.tag(&payload);
        Ok(format!("{}.{}", B64.encode(&payload), B64.encode(tag)))
    }

    fn tag(&self, payload: &[u8]) -> [u8; TAG_LEN] {
        let mut hasher = Sha3_256::new();
        hasher.update(DOMAIN);
        hasher.update((self.key.len() as u64).to_be_bytes());
        hasher.update(&self.key);
        hasher.update(payload);
        let result = hasher.finalize();

        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&result);
        tag
    }
}

impl std::fmt::Debug for AttendanceSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttendanceSigner")
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Decode a token's claims without checking the signature or expiry.
pub fn decode_unverified(token: &str) -> Result<AttendanceClaims> {
    let (payload, _) = split_token(token)?;
    AttendanceClaims::from_cbor(&payload)
}

fn split_token(token: &str) -> Result<(Vec<u8>, Vec<u8>)> {
    let token = token.trim();
    if token.is_empty() {
        return Err(SeamsError::TokenMalformed("empty token".into()));
    }
    if token.len() > MAX_TOKEN_LEN {
        return Err(SeamsError::TokenMalformed(format!(
            "token is {} bytes (max {})",
            token.len(),
            MAX_TOKEN_LEN
        )));
    }

    let (payload_b64, tag_b64) = token
        .split_once('.')
        .ok_or_else(|| SeamsError::TokenMalformed("missing tag separator".into()))?;

    let payload = B64
        .decode(payload_b64)
        .map_err(|e| SeamsError::TokenMalformed(format!("payload encoding: {}", e)))?;
    let tag = B64
        .decode(tag_b64)
        .map_err(|e| SeamsError::TokenMalformed(format!("tag encoding: {}", e)))?;

    if tag.len() != TAG_LEN {
        return Err(SeamsError::TokenMalformed(format!(
            "tag is {} bytes (expected {})",
            tag.len(),
            TAG_LEN
        )));
    }

    Ok((payload, tag))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> AttendanceSigner {
        AttendanceSigner::new(vec![7u8; 32]).unwrap()
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_760_000_000, 0).unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let signer = signer();
        let event_id = Uuid::new_v4();
        let issued = signer.issue(event_id, Duration::hours(1), now()).unwrap();

        let claims = signer
            .verify(&issued.token, now() + Duration::minutes(30))
            .unwrap();
        assert_eq!(claims, issued.claims);
        assert_eq!(claims.event_id, event_id);
        assert_eq!(claims.expires_at - claims.issued_at, 3600);
        assert!(issued.token.len() <= MAX_TOKEN_LEN);
    }

    #[test]
    fn test_each_issue_gets_fresh_nonce() {
        let signer = signer();
        let event_id = Uuid::new_v4();
        let a = signer.issue(event_id, Duration::hours(1), now()).unwrap();
        let b = signer.issue(event_id, Duration::hours(1), now()).unwrap();
        assert_ne!(a.claims.nonce, b.claims.nonce);
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_expired_token() {
        let signer = signer();
        let issued = signer
            .issue(Uuid::new_v4(), Duration::hours(1), now())
            .unwrap();
        let err = signer
            .verify(&issued.token, now() + Duration::hours(1))
            .unwrap_err();
        assert_eq!(err, SeamsError::QrExpired);
    }

    #[test]
    fn test_wrong_key_rejected() {
        let issued = signer()
            .issue(Uuid::new_v4(), Duration::hours(1), now())
            .unwrap();
        let other = AttendanceSigner::new(vec![8u8; 32]).unwrap();
        assert_eq!(
            other.verify(&issued.token, now()).unwrap_err(),
            SeamsError::TokenSignatureInvalid
        );
    }

    #[test]
    fn test_swapped_payload_rejected() {
        let signer = signer();
        let issued = signer
            .issue(Uuid::new_v4(), Duration::hours(1), now())
            .unwrap();
        let (_, tag_b64) = issued.token.split_once('.').unwrap();

        // Same tag, different event id
        let mut forged = issued.claims.clone();
        forged.event_id = Uuid::new_v4();
        let forged_token = format!("{}.{}", B64.encode(forged.to_cbor().unwrap()), tag_b64);

        assert_eq!(
            signer.verify(&forged_token, now()).unwrap_err(),
            SeamsError::TokenSignatureInvalid
        );
    }

    #[test]
    fn test_future_issued_token_rejected() {
        let signer = signer();
        let issued = signer
            .issue(Uuid::new_v4(), Duration::hours(1), now() + Duration::minutes(10))
            .unwrap();
        assert!(matches!(
            signer.verify(&issued.token, now()),
            Err(SeamsError::TokenMalformed(_))
        ));
    }

    #[test]
    fn test_malformed_tokens() {
        let signer = signer();
        for token in ["", "no-separator", "!!!.!!!", "AAAA.AAAA"] {
            assert!(
                matches!(signer.verify(token, now()), Err(SeamsError::TokenMalformed(_))),
                "token {:?} should be malformed",
                token
            );
        }

        let oversized = "A".repeat(MAX_TOKEN_LEN + 1);
        assert!(matches!(
            signer.verify(&oversized, now()),
            Err(SeamsError::TokenMalformed(_))
        ));
    }

    #[test]
    fn test_legacy_plain_token_rejected() {
        // Old-style "<id>-<millis>-<random>" strings are not accepted
        let legacy = format!("{}-1700000000000-x7k2q", Uuid::new_v4().simple());
        assert!(matches!(
            signer().verify(&legacy, now()),
            Err(SeamsError::TokenMalformed(_))
        ));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let signer = signer();
        let claims = AttendanceClaims {
            v: 9,
            event_id: Uuid::new_v4(),
            nonce: Uuid::new_v4(),
            issued_at: now().timestamp(),
            expires_at: now().timestamp() + 60,
        };
        let token = signer.encode(&claims).unwrap();
        assert_eq!(
            signer.verify(&token, now()).unwrap_err(),
            SeamsError::UnsupportedTokenVersion(9, CURRENT_TOKEN_VERSION)
        );
    }

    #[test]
    fn test_decode_unverified_ignores_key() {
        let issued = signer()
            .issue(Uuid::new_v4(), Duration::minutes(5), now())
            .unwrap();
        let claims = decode_unverified(&issued.token).unwrap();
        assert_eq!(claims, issued.claims);
    }

    #[test]
    fn test_weak_key_rejected() {
        assert_eq!(
            AttendanceSigner::new(b"short".to_vec()).unwrap_err(),
            SeamsError::WeakSigningKey { len: 5, min: MIN_KEY_LEN }
        );
        assert!(AttendanceSigner::new(AttendanceSigner::generate_key()).is_ok());
    }

    #[test]
    fn test_non_positive_ttl_rejected() {
        assert!(signer()
            .issue(Uuid::new_v4(), Duration::zero(), now())
            .is_err());
    }

    #[test]
    fn test_ttl_beyond_calendar_rejected() {
        let result = signer().issue(Uuid::new_v4(), Duration::MAX, now());
        assert!(matches!(result, Err(SeamsError::InvalidInput(_))));
    }

    #[test]
    fn test_tag_layout() {
        let signer = signer();
        let issued = signer
            .issue(Uuid::new_v4(), Duration::minutes(5), now())
            .unwrap();
        let (payload_b64, tag_b64) = issued.token.split_once('.').unwrap();
        let payload = B64.decode(payload_b64).unwrap();

        let mut hasher = Sha3_256::new();
        hasher.update(b"seams-attendance-v1");
        hasher.update(32u64.to_be_bytes());
        hasher.update([7u8; 32]);
        hasher.update(&payload);
        assert_eq!(B64.decode(tag_b64).unwrap(), hasher.finalize().to_vec());
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", signer());
        assert!(debug.contains("redacted"));
        assert!(!debug.contains(&hex::encode([7u8; 32])));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
