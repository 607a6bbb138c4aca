//! Account handlers
//!
//! Self-registration with email verification, login, and password reset.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use seams_core::Role;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::audit::{self, AuditEntry};
use crate::auth::{hash_password, hash_token, verify_password, OneTimeToken};
use crate::db::{NewUser, UserResponse};
use crate::error::ApiError;
use crate::handlers::AppState;
use crate::mailer::{deliver_or_undo, OutgoingMail};
use crate::validation::{normalize_email, optional_text, require_text, validate_password};

/// Self-registration request
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "Asha Rao")]
    pub name: String,
    #[schema(example = "asha@college.edu")]
    pub email: String,
    /// At least 8 characters
    pub password: String,
    /// University seat number
    #[serde(default)]
    #[schema(example = "1XX21CS001")]
    pub usn: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub semester: Option<i32>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Generic success acknowledgement
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Session token plus the signed-in user
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub user: UserResponse,
    /// Bearer token for the Authorization header
    pub token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    /// Email address or USN
    #[schema(example = "asha@college.edu")]
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub password: String,
}

/// Register a student account
///
/// Sends a verification link; the account cannot log in until it is used.
/// If the mail cannot be sent the account is removed again.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, verification mail sent", body = MessageResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email or USN already registered"),
        (status = 500, description = "Verification mail could not be sent")
    )
)]
pub async fn register_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let name = require_text("name", &request.name)?;
    let email = normalize_email(&request.email)?;
    validate_password(&request.password)?;

    let users = state.db.users();
    if users.find_by_email(&email).await?.is_some() {
        return Err(ApiError::conflict("User already exists"));
    }

    let password_hash = hash_password(&request.password).await?;
    let token = OneTimeToken::email_verification();

    let user = users
        .create(NewUser {
            name,
            email,
            password_hash,
            role: Role::Student,
            usn: optional_text(request.usn),
            branch: optional_text(request.branch),
            semester: request.semester,
            department: optional_text(request.department),
            phone: optional_text(request.phone),
            is_verified: false,
            verification_token_hash: Some(token.hash),
            verification_expires_at: Some(token.expires_at),
        })
        .await?;

    let link = format!(
        "{}/verify-email/{}",
        state.config.frontend_url.trim_end_matches('/'),
        token.plain
    );
    let mail = OutgoingMail::email_verification(&user.email, &user.name, &link);

    let db = state.db.clone();
    let user_id = user.id;
    let delivered = deliver_or_undo(
        state.mailer.clone(),
        mail,
        state.config.mail_timeout(),
        move || async move {
            tracing::warn!(%user_id, "Removing account whose verification mail failed");
            if let Err(e) = db.users().delete(user_id).await {
                tracing::error!(%user_id, error = %e, "Failed to remove unverifiable account");
            }
        },
    )
    .await;
    if delivered.is_err() {
        return Err(ApiError::internal(
            "Could not send verification email. Please try again.",
        ));
    }

    audit::record(
        &state.db,
        &headers,
        AuditEntry::new(audit::REGISTER_USER, Some(user.id))
            .target("User", user.id)
            .details(json!({ "email": user.email })),
    )
    .await;

    tracing::info!(user_id = %user.id, "Student account registered");

    Ok((
        StatusCode::CREATED,
        MessageResponse::ok(
            "Registration successful! Please check your email to verify your account.",
        ),
    ))
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 401, description = "Invalid credentials or email not verified")
    )
)]
pub async fn login_handler(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let invalid = || ApiError::auth_error("AUTH_INVALID_CREDENTIALS", "Invalid email or password");

    let email = request.email.trim().to_lowercase();
    let user = state
        .db
        .users()
        .find_by_email(&email)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&user.password_hash, &request.password).await? {
        return Err(invalid());
    }

    if !user.is_verified {
        return Err(ApiError::auth_error(
            "AUTH_EMAIL_NOT_VERIFIED",
            "Please verify your email before logging in",
        ));
    }

    let token = state.jwt.issue(&user)?;
    tracing::info!(user_id = %user.id, role = %user.role, "User signed in");

    Ok(Json(LoginResponse {
        user: UserResponse::from(user),
        token,
    }))
}

/// Confirm an email address from the emailed link
#[utoipa::path(
    get,
    path = "/api/auth/verifyemail/{token}",
    tag = "Auth",
    params(("token" = String, Path, description = "Token from the verification link")),
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Invalid or expired token")
    )
)]
pub async fn verify_email_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let users = state.db.users();
    let user = users
        .find_by_verification_hash(&hash_token(&token), Utc::now())
        .await?
        .ok_or_else(|| ApiError::bad_request("Invalid or expired verification token"))?;

    users.mark_verified(user.id).await?;

    audit::record(
        &state.db,
        &headers,
        AuditEntry::new(audit::VERIFY_EMAIL, Some(user.id)).target("User", user.id),
    )
    .await;

    Ok(MessageResponse::ok(
        "Email verified successfully. You can now log in.",
    ))
}

/// Request a password reset link
///
/// Accepts an email address or a USN.
#[utoipa::path(
    post,
    path = "/api/auth/forgotpassword",
    tag = "Auth",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset mail sent", body = MessageResponse),
        (status = 404, description = "No such account"),
        (status = 500, description = "Reset mail could not be sent")
    )
)]
pub async fn forgot_password_handler(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let identifier = require_text("email", &request.email)?;
    let identifier = if identifier.contains('@') {
        identifier.to_lowercase()
    } else {
        identifier
    };

    let users = state.db.users();
    let user = users
        .find_by_email_or_usn(&identifier)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let token = OneTimeToken::password_reset();
    users
        .set_reset_token(user.id, Some((&token.hash, token.expires_at)))
        .await?;

    let link = format!(
        "{}/reset-password/{}",
        state.config.frontend_url.trim_end_matches('/'),
        token.plain
    );
    let mail = OutgoingMail::password_reset(&user.email, &user.name, &link);

    let db = state.db.clone();
    let user_id = user.id;
    let delivered = deliver_or_undo(
        state.mailer.clone(),
        mail,
        state.config.mail_timeout(),
        move || async move {
            if let Err(e) = db.users().set_reset_token(user_id, None).await {
                tracing::error!(%user_id, error = %e, "Failed to clear unused reset token");
            }
        },
    )
    .await;
    if delivered.is_err() {
        return Err(ApiError::internal("Email could not be sent"));
    }

    Ok(MessageResponse::ok("Email sent"))
}

/// Set a new password using the emailed reset token
#[utoipa::path(
    put,
    path = "/api/auth/resetpassword/{token}",
    tag = "Auth",
    params(("token" = String, Path, description = "Token from the reset link")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Invalid or expired token, or weak password")
    )
)]
pub async fn reset_password_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(token): Path<String>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    validate_password(&request.password)?;
    let password_hash = hash_password(&request.password).await?;

    let user = state
        .db
        .users()
        .reset_password(&hash_token(&token), &password_hash, Utc::now())
        .await?
        .ok_or_else(|| ApiError::bad_request("Invalid or expired reset token"))?;

    audit::record(
        &state.db,
        &headers,
        AuditEntry::new(audit::RESET_PASSWORD, Some(user.id)).target("User", user.id),
    )
    .await;

    Ok(MessageResponse::ok("Password updated"))
}
