//! Request validation module
//!
//! Field checks shared by the account and listing endpoints. Event field
//! rules live in `seams_core::event`.

use crate::error::ApiError;

/// Minimum password length
pub const MIN_PASSWORD_LEN: usize = 8;

/// Default page size for audit listings
pub const DEFAULT_AUDIT_LIMIT: i64 = 50;

/// Maximum page size for audit listings
pub const MAX_AUDIT_LIMIT: i64 = 200;

/// Trim and lowercase an email address, rejecting obviously invalid ones
pub fn normalize_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(ApiError::bad_request("A valid email address is required"))
    }
}

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        Err(ApiError::bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )))
    } else {
        Ok(())
    }
}

/// Trimmed value of a required text field
pub fn require_text(field: &str, value: &str) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ApiError::bad_request(format!("{} is required", field)))
    } else {
        Ok(value.to_string())
    }
}

/// Trim optional text, mapping blank to `None`
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Clamp pagination for audit listings
pub fn page_bounds(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .clamp(1, MAX_AUDIT_LIMIT);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}
