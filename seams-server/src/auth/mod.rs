//! Authentication module
//!
//! Provides the `AuthenticatedUser` extractor for Axum handlers plus
//! password hashing, session JWTs and one-time email tokens.
//! Session tokens are HS256 JWTs signed with `JWT_SECRET`.

pub mod jwt;
pub mod one_time;
pub mod password;

pub use jwt::{JwtKeys, SessionClaims};
pub use one_time::{hash_token, OneTimeToken};
pub use password::{hash_password, verify_password};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use seams_core::Role;
use uuid::Uuid;

use crate::db::{Event, User};
use crate::error::ApiError;
use crate::state::AppState;

/// Extract the Bearer token from the Authorization header
fn extract_bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let auth_header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| {
            ApiError::auth_error("AUTH_MISSING_TOKEN", "Missing Authorization header")
        })?;

    let auth_value = auth_header.to_str().map_err(|_| {
        ApiError::auth_error(
            "AUTH_INVALID_TOKEN",
            "Invalid Authorization header encoding",
        )
    })?;

    auth_value.strip_prefix("Bearer ").ok_or_else(|| {
        ApiError::auth_error(
            "AUTH_INVALID_TOKEN",
            "Authorization header must use Bearer scheme",
        )
    })
}

/// Read `access_token` from the query string
fn extract_query_token(parts: &Parts) -> Option<String> {
    let query = parts.uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "access_token")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Validate a session token and load its user
async fn authenticate(token: &str, state: &AppState) -> Result<AuthenticatedUser, ApiError> {
    let claims = state.jwt.validate(token)?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| {
        ApiError::auth_error("AUTH_INVALID_TOKEN", "Session token subject is not a user id")
    })?;

    let user = state
        .db
        .users()
        .find_by_id(user_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to look up user by ID");
            ApiError::internal("A database error occurred")
        })?
        .ok_or_else(|| {
            ApiError::auth_error(
                "AUTH_USER_NOT_FOUND",
                "Valid token but user not found in database",
            )
        })?;

    Ok(AuthenticatedUser { user, claims })
}

/// Authenticated user extractor that validates the session JWT and resolves
/// the user from the database.
///
/// The role is taken from the database row, not the token, so a demotion
/// takes effect immediately.
///
/// Returns 401 with structured error codes on any failure.
pub struct AuthenticatedUser {
    pub user: User,
    pub claims: SessionClaims,
}

impl AuthenticatedUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    /// Coordinator, faculty or admin
    pub fn require_event_manager(&self) -> Result<(), ApiError> {
        if self.user.role.can_manage_events() {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!(
                "Role '{}' cannot manage events",
                self.user.role
            )))
        }
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        self.require_role(Role::Admin)
    }

    pub fn require_role(&self, role: Role) -> Result<(), ApiError> {
        if self.user.role == role {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!(
                "Requires role '{}', you are '{}'",
                role, self.user.role
            )))
        }
    }

    /// The event's organizer or an admin
    pub fn require_event_owner(&self, event: &Event) -> Result<(), ApiError> {
        if event.organizer_id == self.user.id || self.user.role.is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Not authorized to manage this event"))
        }
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(parts)?;
        authenticate(token, state).await
    }
}

/// Like [`AuthenticatedUser`], but also accepts `?access_token=` for
/// clients that cannot set headers (browser `EventSource`).
pub struct StreamUser(pub AuthenticatedUser);

impl FromRequestParts<AppState> for StreamUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if parts
            .headers
            .contains_key(axum::http::header::AUTHORIZATION)
        {
            let token = extract_bearer_token(parts)?;
            return authenticate(token, state).await.map(StreamUser);
        }

        let token = extract_query_token(parts).ok_or_else(|| {
            ApiError::auth_error(
                "AUTH_MISSING_TOKEN",
                "Missing Authorization header or access_token parameter",
            )
        })?;
        authenticate(&token, state).await.map(StreamUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(uri: &str, auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = auth {
            builder = builder.header("authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_missing_header() {
        let err = extract_bearer_token(&parts("/", None)).unwrap_err();
        assert_eq!(err.error_code(), "AUTH_MISSING_TOKEN");
    }

    #[test]
    fn test_non_bearer_scheme() {
        let err = extract_bearer_token(&parts("/", Some("Basic abc"))).unwrap_err();
        assert_eq!(err.error_code(), "AUTH_INVALID_TOKEN");
    }

    #[test]
    fn test_bearer_token() {
        let p = parts("/", Some("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer_token(&p).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_query_token() {
        let p = parts("/stream?last_event_id=4&access_token=abc%2Edef", None);
        assert_eq!(extract_query_token(&p).as_deref(), Some("abc.def"));
        assert!(extract_query_token(&parts("/stream?access_token=", None)).is_none());
        assert!(extract_query_token(&parts("/stream", None)).is_none());
    }
}
