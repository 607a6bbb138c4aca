//! Audit log handler

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::auth::AuthenticatedUser;
use crate::db::AuditLogResponse;
use crate::error::ApiError;
use crate::handlers::AppState;
use crate::validation::page_bounds;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AuditQuery {
    /// Page size (default 50, max 200)
    #[param(default = 50, minimum = 1, maximum = 200)]
    pub limit: Option<i64>,
    #[param(default = 0, minimum = 0)]
    pub offset: Option<i64>,
}

/// Audit trail, newest first (admin)
#[utoipa::path(
    get,
    path = "/api/audit",
    tag = "Audit",
    params(AuditQuery),
    responses(
        (status = 200, description = "Audit entries", body = [AuditLogResponse]),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_token" = []))
)]
pub async fn list_audit_logs_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditLogResponse>>, ApiError> {
    user.require_admin()?;
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let rows = state.db.audit().list(limit, offset).await?;
    Ok(Json(rows.into_iter().map(AuditLogResponse::from).collect()))
}
