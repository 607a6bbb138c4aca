//! Audit log entity and repository
//!
//! Rows are insert-only. PostgreSQL enforces it with a trigger; the
//! repository offers no update or delete.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Backend, StoreError};

/// Audit log entity from database
#[derive(Debug, Clone, FromRow)]
pub struct AuditLog {
    pub id: Uuid,
    pub action: String,
    pub performed_by: Option<Uuid>,
    pub target_id: Option<String>,
    pub target_type: Option<String>,
    pub details: serde_json::Value,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// DTO for recording an audit entry
#[derive(Debug, Clone)]
pub struct NewAuditLog {
    pub action: &'static str,
    pub performed_by: Option<Uuid>,
    pub target_id: Option<String>,
    pub target_type: Option<&'static str>,
    pub details: serde_json::Value,
    pub ip_address: Option<String>,
}

/// An audit entry joined with whoever performed it
#[derive(Debug, Clone, FromRow)]
pub struct AuditLogWithPerformer {
    #[sqlx(flatten)]
    pub log: AuditLog,
    pub performer_name: Option<String>,
    pub performer_email: Option<String>,
    pub performer_role: Option<String>,
}

/// Performer summary in audit responses
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PerformerSummary {
    #[schema(value_type = String)]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
}

/// Audit log response DTO
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuditLogResponse {
    #[schema(value_type = String)]
    pub id: Uuid,
    #[schema(example = "CREATE_EVENT")]
    pub action: String,
    /// Null for anonymous actions or deleted accounts
    pub performed_by: Option<PerformerSummary>,
    pub target_id: Option<String>,
    pub target_type: Option<String>,
    #[schema(value_type = Object)]
    pub details: serde_json::Value,
    pub ip_address: Option<String>,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl From<AuditLogWithPerformer> for AuditLogResponse {
    fn from(row: AuditLogWithPerformer) -> Self {
        let performed_by = match (
            row.log.performed_by,
            row.performer_name,
            row.performer_email,
            row.performer_role,
        ) {
            (Some(id), Some(name), Some(email), Some(role)) => Some(PerformerSummary {
                id,
                name,
                email,
                role,
            }),
            _ => None,
        };
        Self {
            id: row.log.id,
            action: row.log.action,
            performed_by,
            target_id: row.log.target_id,
            target_type: row.log.target_type,
            details: row.log.details,
            ip_address: row.log.ip_address,
            created_at: row.log.created_at,
        }
    }
}

/// Repository for audit log operations
#[derive(Clone)]
pub struct AuditRepository {
    backend: Backend,
}

impl AuditRepository {
    pub(crate) fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Append an entry
    pub async fn record(&self, input: NewAuditLog) -> Result<AuditLog, StoreError> {
        let log = AuditLog {
            id: Uuid::new_v4(),
            action: input.action.to_string(),
            performed_by: input.performed_by,
            target_id: input.target_id,
            target_type: input.target_type.map(str::to_string),
            details: input.details,
            ip_address: input.ip_address,
            created_at: Utc::now(),
        };
        match &self.backend {
            Backend::Postgres(pool) => Ok(sqlx::query_as::<_, AuditLog>(
                r#"
                INSERT INTO audit_logs (id, action, performed_by, target_id, target_type, details,
                                        ip_address, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING *
                "#,
            )
            .bind(log.id)
            .bind(&log.action)
            .bind(log.performed_by)
            .bind(&log.target_id)
            .bind(&log.target_type)
            .bind(&log.details)
            .bind(&log.ip_address)
            .bind(log.created_at)
            .fetch_one(pool)
            .await?),
            Backend::Memory(store) => {
                store.lock()?.audit_logs.push(log.clone());
                Ok(log)
            }
        }
    }

    /// Entries newest first, with the performer's details when they still exist
    pub async fn list(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLogWithPerformer>, StoreError> {
        match &self.backend {
            Backend::Postgres(pool) => Ok(sqlx::query_as::<_, AuditLogWithPerformer>(
                r#"
                SELECT a.*, u.name AS performer_name, u.email AS performer_email,
                       u.role AS performer_role
                FROM audit_logs a
                LEFT JOIN users u ON u.id = a.performed_by
                ORDER BY a.created_at DESC
                LIMIT $1 OFFSET $2
                "#,
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?),
            Backend::Memory(store) => {
                let tables = store.lock()?;
                let skip = usize::try_from(offset).unwrap_or(0);
                let take = usize::try_from(limit).unwrap_or(0);
                Ok(tables
                    .audit_logs
                    .iter()
                    .rev()
                    .skip(skip)
                    .take(take)
                    .map(|log| {
                        let performer = log.performed_by.and_then(|id| tables.users.get(&id));
                        AuditLogWithPerformer {
                            log: log.clone(),
                            performer_name: performer.map(|u| u.name.clone()),
                            performer_email: performer.map(|u| u.email.clone()),
                            performer_role: performer.map(|u| u.role.to_string()),
                        }
                    })
                    .collect())
            }
        }
    }
}
