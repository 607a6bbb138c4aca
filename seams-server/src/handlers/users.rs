//! User handlers
//!
//! Admin account management plus each user's own profile and history.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::NaiveDate;
use seams_core::{EventCategory, RegistrationStatus, Role};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::audit::{self, AuditEntry};
use crate::auth::{hash_password, AuthenticatedUser};
use crate::db::{NewUser, RegistrationWithEvent, UserResponse, UserUpdate};
use crate::error::ApiError;
use crate::handlers::AppState;
use crate::validation::{normalize_email, optional_text, require_text, validate_password};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListUsersQuery {
    /// Only users with this role
    pub role: Option<String>,
}

/// Admin request to create an account (pre-verified)
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Defaults to student
    #[serde(default)]
    #[schema(example = "coordinator")]
    pub role: Option<String>,
    #[serde(default)]
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

/// Admin partial update; omitted fields are left unchanged
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub usn: Option<String>,
    pub branch: Option<String>,
    pub semester: Option<i32>,
    pub department: Option<String>,
    pub phone: Option<String>,
    /// New password, at least 8 characters
    pub password: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteUserResponse {
    pub message: String,
}

/// One attended or pending event in a user's history
#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryEntry {
    #[schema(value_type = String)]
    pub registration_id: Uuid,
    #[schema(value_type = String)]
    pub event_id: Uuid,
    pub title: String,
    #[schema(value_type = String)]
    pub date: NaiveDate,
    #[schema(value_type = String)]
    pub category: EventCategory,
    #[schema(value_type = String, example = "verified")]
    pub status: RegistrationStatus,
    pub points_awarded: i32,
}

impl From<RegistrationWithEvent> for HistoryEntry {
    fn from(row: RegistrationWithEvent) -> Self {
        Self {
            registration_id: row.registration.id,
            event_id: row.registration.event_id,
            title: row.event_title,
            date: row.event_date,
            category: row.event_category,
            status: row.registration.status,
            points_awarded: row.registration.points_awarded,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub user: UserResponse,
    /// Sum of credit ledger entries
    pub total_credits: i64,
    pub history: Vec<HistoryEntry>,
}

async fn load_history(state: &AppState, user_id: Uuid) -> Result<Vec<HistoryEntry>, ApiError> {
    let rows = state.db.registrations().list_for_student(user_id).await?;
    Ok(rows.into_iter().map(HistoryEntry::from).collect())
}

/// List accounts (admin)
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Users, newest first", body = [UserResponse]),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_token" = []))
)]
pub async fn list_users_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    user.require_admin()?;
    let role: Option<Role> = query.role.as_deref().map(str::parse).transpose()?;
    let users = state.db.users().list(role).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Create an account with any role (admin)
#[utoipa::path(
    post,
    path = "/api/users",
    tag = "Users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Email or USN already registered")
    ),
    security(("bearer_token" = []))
)]
pub async fn create_user_handler(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    headers: HeaderMap,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    admin.require_admin()?;

    let name = require_text("name", &request.name)?;
    let email = normalize_email(&request.email)?;
    validate_password(&request.password)?;
    let role: Role = match request.role.as_deref() {
        Some(role) => role.parse()?,
        None => Role::Student,
    };

    let users = state.db.users();
    if users.find_by_email(&email).await?.is_some() {
        return Err(ApiError::conflict("User already exists"));
    }

    let user = users
        .create(NewUser {
            name,
            email,
            password_hash: hash_password(&request.password).await?,
            role,
            usn: optional_text(request.usn),
            branch: optional_text(request.branch),
            semester: request.semester,
            department: optional_text(request.department),
            phone: optional_text(request.phone),
            is_verified: true,
            verification_token_hash: None,
            verification_expires_at: None,
        })
        .await?;

    audit::record(
        &state.db,
        &headers,
        AuditEntry::new(audit::CREATE_USER, Some(admin.id()))
            .target("User", user.id)
            .details(json!({ "email": user.email, "role": user.role })),
    )
    .await;

    tracing::info!(user_id = %user.id, role = %user.role, "Account created by admin");
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Update an account (admin)
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    tag = "Users",
    params(("id" = String, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated account", body = UserResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Email or USN already registered")
    ),
    security(("bearer_token" = []))
)]
pub async fn update_user_handler(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    admin.require_admin()?;

    let name = request
        .name
        .as_deref()
        .map(|n| require_text("name", n))
        .transpose()?;
    let email = request.email.as_deref().map(normalize_email).transpose()?;
    let role: Option<Role> = request.role.as_deref().map(str::parse).transpose()?;
    let password_hash = match request.password.as_deref() {
        Some(password) => {
            validate_password(password)?;
            Some(hash_password(password).await?)
        }
        None => None,
    };

    let changed: Vec<&str> = [
        ("name", name.is_some()),
        ("email", email.is_some()),
        ("role", role.is_some()),
        ("usn", request.usn.is_some()),
        ("password", password_hash.is_some()),
    ]
    .into_iter()
    .filter_map(|(field, set)| set.then_some(field))
    .collect();

    let user = state
        .db
        .users()
        .update(
            id,
            UserUpdate {
                name,
                email,
                role,
                usn: optional_text(request.usn),
                branch: optional_text(request.branch),
                semester: request.semester,
                department: optional_text(request.department),
                phone: optional_text(request.phone),
                password_hash,
            },
        )
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    audit::record(
        &state.db,
        &headers,
        AuditEntry::new(audit::UPDATE_USER, Some(admin.id()))
            .target("User", user.id)
            .details(json!({ "fields": changed })),
    )
    .await;

    Ok(Json(UserResponse::from(user)))
}

/// Delete an account (admin, not one's own)
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "Users",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Account deleted", body = DeleteUserResponse),
        (status = 400, description = "Cannot delete your own account"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_token" = []))
)]
pub async fn delete_user_handler(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteUserResponse>, ApiError> {
    admin.require_admin()?;
    if id == admin.id() {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    let users = state.db.users();
    let user = users
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if !users.delete(id).await? {
        return Err(ApiError::not_found("User not found"));
    }

    audit::record(
        &state.db,
        &headers,
        AuditEntry::new(audit::DELETE_USER, Some(admin.id()))
            .target("User", user.id)
            .details(json!({ "email": user.email })),
    )
    .await;

    tracing::info!(user_id = %user.id, "Account deleted by admin");
    Ok(Json(DeleteUserResponse {
        message: "User removed".to_string(),
    }))
}

/// The caller's profile, credit total and event history
#[utoipa::path(
    get,
    path = "/api/users/profile",
    tag = "Users",
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_token" = []))
)]
pub async fn profile_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let total_credits = state.db.credits().total_for_student(user.id()).await?;
    let history = load_history(&state, user.id()).await?;
    Ok(Json(ProfileResponse {
        user: UserResponse::from(user.user),
        total_credits,
        history,
    }))
}

/// The caller's event history, newest first
#[utoipa::path(
    get,
    path = "/api/users/history",
    tag = "Users",
    responses(
        (status = 200, description = "History", body = [HistoryEntry]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_token" = []))
)]
pub async fn history_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    Ok(Json(load_history(&state, user.id()).await?))
}
