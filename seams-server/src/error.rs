//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use seams_core::SeamsError;
use thiserror::Error;

use crate::db::StoreError;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unauthorized - missing or invalid authentication
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Forbidden - authenticated but not allowed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Not found - requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict - resource already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Request timeout - operation took too long
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Internal server error - unexpected server-side failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Service unavailable - required service is not configured or available
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Authentication error with specific error code
    #[error("{message}")]
    AuthError { message: String, code: String },

    /// Domain rule violation from seams-core
    #[error("{0}")]
    Domain(#[from] SeamsError),

    /// Persistence failure
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Rule(e) => Self::Domain(e),
            StoreError::NotFound(what) => Self::NotFound(format!("{} not found", what)),
            other => Self::Store(other),
        }
    }
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Create a forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create an internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    /// Create a service unavailable error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Create an authentication error with a specific error code
    pub fn auth_error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AuthError {
            message: message.into(),
            code: code.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) | Self::AuthError { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Store(ref e) => match e {
                StoreError::Conflict(_) => StatusCode::CONFLICT,
                StoreError::Connection(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Domain(ref e) => match e {
                // Seat and duplicate conflicts → 409
                SeamsError::EventFull { .. }
                | SeamsError::AlreadyRegistered
                | SeamsError::AlreadyVerified => StatusCode::CONFLICT,

                SeamsError::NotRegistered => StatusCode::NOT_FOUND,

                // Client-provided invalid input or state → 400
                SeamsError::InvalidInput(_)
                | SeamsError::InvalidTransition { .. }
                | SeamsError::EventNotOpen(_)
                | SeamsError::RegistrationRejected
                | SeamsError::QrInactive
                | SeamsError::QrExpired
                | SeamsError::QrTokenRevoked
                | SeamsError::TokenMalformed(_)
                | SeamsError::TokenSignatureInvalid
                | SeamsError::UnsupportedTokenVersion(_, _) => StatusCode::BAD_REQUEST,

                // Server-side configuration or processing failures → 500
                SeamsError::WeakSigningKey { .. }
                | SeamsError::SerializationError(_)
                | SeamsError::QrRenderError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Get the error code for programmatic error handling
    pub fn error_code(&self) -> &str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::AuthError { code, .. } => code,
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Timeout(_) => "TIMEOUT",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Store(ref e) => match e {
                StoreError::Conflict(_) => "CONFLICT",
                StoreError::Connection(_) => "DATABASE_UNAVAILABLE",
                _ => "DATABASE_ERROR",
            },
            Self::Domain(ref e) => match e {
                SeamsError::InvalidInput(_) => "INVALID_INPUT",
                SeamsError::InvalidTransition { .. } => "INVALID_TRANSITION",
                SeamsError::EventNotOpen(_) => "EVENT_NOT_OPEN",
                SeamsError::EventFull { .. } => "EVENT_FULL",
                SeamsError::AlreadyRegistered => "ALREADY_REGISTERED",
                SeamsError::NotRegistered => "NOT_REGISTERED",
                SeamsError::AlreadyVerified => "ALREADY_VERIFIED",
                SeamsError::RegistrationRejected => "REGISTRATION_REJECTED",
                SeamsError::QrInactive => "QR_INACTIVE",
                SeamsError::QrExpired => "QR_EXPIRED",
                SeamsError::QrTokenRevoked => "QR_REVOKED",
                SeamsError::TokenMalformed(_) | SeamsError::UnsupportedTokenVersion(_, _) => {
                    "QR_MALFORMED"
                }
                SeamsError::TokenSignatureInvalid => "QR_SIGNATURE_INVALID",
                SeamsError::WeakSigningKey { .. } => "SIGNING_KEY_ERROR",
                SeamsError::SerializationError(_) => "SERIALIZATION_ERROR",
                SeamsError::QrRenderError(_) => "QR_RENDER_ERROR",
            },
        }
    }

    /// Get sanitized error message for client response
    pub fn client_message(&self) -> String {
        match self {
            Self::Store(ref e) => match e {
                StoreError::Conflict(_) => "Resource already exists".to_string(),
                StoreError::Connection(_) => "Database temporarily unavailable".to_string(),
                _ => "A database error occurred".to_string(),
            },
            Self::Domain(ref e) => match e {
                SeamsError::TokenMalformed(_) | SeamsError::UnsupportedTokenVersion(_, _) => {
                    "Invalid QR code".to_string()
                }
                SeamsError::TokenSignatureInvalid => "QR code signature is invalid".to_string(),
                SeamsError::WeakSigningKey { .. } | SeamsError::SerializationError(_) => {
                    "Attendance token service misconfigured".to_string()
                }
                SeamsError::QrRenderError(_) => "Failed to render QR code".to_string(),
                other => other.to_string(),
            },
            Self::Internal(_) => "Internal server error".to_string(),
            // For other errors, use the Display message
            _ => self.to_string(),
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::AuthError { .. } => "auth_error",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Timeout(_) => "timeout",
            Self::Internal(_) => "internal",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::Domain(_) => "domain",
            Self::Store(_) => "store",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code().to_string();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        // Log based on severity, always including internal details
        if status.is_server_error() {
            tracing::error!(
                status = %status,
                category = category,
                code = %code,
                error = %internal_message,
                "Server error"
            );
        } else if matches!(self, Self::Unauthorized(_) | Self::AuthError { .. }) {
            tracing::warn!(
                status = %status,
                category = category,
                code = %code,
                error = %internal_message,
                "Authentication error"
            );
        } else {
            tracing::warn!(
                status = %status,
                category = category,
                code = %code,
                error = %internal_message,
                "Client error"
            );
        }

        // All error responses include a `code` field for programmatic error handling
        let body = serde_json::json!({
            "error": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}
