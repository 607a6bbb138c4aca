use thiserror::Error;

use crate::event::EventStatus;

/// Maximum accepted length of an encoded attendance token.
pub const MAX_TOKEN_LEN: usize = 512;

/// Current attendance token payload version.
pub const CURRENT_TOKEN_VERSION: u8 = 1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SeamsError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: EventStatus, to: EventStatus },

    #[error("Event is not open for registration (status: {0})")]
    EventNotOpen(EventStatus),

    #[error("Event is full ({max} participants)")]
    EventFull { max: i32 },

    #[error("Already registered for this event")]
    AlreadyRegistered,

    #[error("Not registered for this event")]
    NotRegistered,

    #[error("Attendance already verified")]
    AlreadyVerified,

    #[error("Registration has been rejected")]
    RegistrationRejected,

    #[error("QR code is not active")]
    QrInactive,

    #[error("QR code expired")]
    QrExpired,

    #[error("QR code has been replaced by a newer one")]
    QrTokenRevoked,

    #[error("Malformed attendance token: {0}")]
    TokenMalformed(String),

    #[error("Attendance token signature is invalid")]
    TokenSignatureInvalid,

    #[error("Unsupported token version {0} (current: {1})")]
    UnsupportedTokenVersion(u8, u8),

    #[error("Signing key too short: {len} bytes (minimum {min})")]
    WeakSigningKey { len: usize, min: usize },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("QR rendering error: {0}")]
    QrRenderError(String),
}

pub type Result<T> = std::result::Result<T, SeamsError>;
