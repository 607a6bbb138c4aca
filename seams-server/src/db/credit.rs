//! Credit ledger
//!
//! Entries are written only by `RegistrationRepository::record_attendance`;
//! this repository is read-only.

use chrono::{DateTime, Utc};
use seams_core::total_points;
use sqlx::FromRow;
use uuid::Uuid;

use super::{Backend, StoreError};

/// One credited registration
#[derive(Debug, Clone, FromRow)]
pub struct CreditEntry {
    pub id: Uuid,
    pub registration_id: Uuid,
    pub student_id: Uuid,
    pub event_id: Uuid,
    pub points: i32,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}

/// Repository for credit ledger reads
#[derive(Clone)]
pub struct CreditRepository {
    backend: Backend,
}

impl CreditRepository {
    pub(crate) fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// A student's ledger entries, oldest first
    pub async fn entries_for_student(&self, student_id: Uuid) -> Result<Vec<CreditEntry>, StoreError> {
        match &self.backend {
            Backend::Postgres(pool) => Ok(sqlx::query_as::<_, CreditEntry>(
                "SELECT * FROM credit_ledger WHERE student_id = $1 ORDER BY created_at ASC",
            )
            .bind(student_id)
            .fetch_all(pool)
            .await?),
            Backend::Memory(store) => Ok(store
                .lock()?
                .credit_ledger
                .iter()
                .filter(|c| c.student_id == student_id)
                .cloned()
                .collect()),
        }
    }

    /// Sum of a student's ledger entries
    pub async fn total_for_student(&self, student_id: Uuid) -> Result<i64, StoreError> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let (total,): (i64,) = sqlx::query_as(
                    "SELECT COALESCE(SUM(points), 0)::BIGINT FROM credit_ledger WHERE student_id = $1",
                )
                .bind(student_id)
                .fetch_one(pool)
                .await?;
                Ok(total)
            }
            Backend::Memory(store) => {
                let tables = store.lock()?;
                Ok(total_points(
                    tables
                        .credit_ledger
                        .iter()
                        .filter(|c| c.student_id == student_id)
                        .map(|c| c.points),
                ))
            }
        }
    }

    /// Look up an entry by its idempotency key
    pub async fn find_by_key(&self, key: &str) -> Result<Option<CreditEntry>, StoreError> {
        match &self.backend {
            Backend::Postgres(pool) => Ok(sqlx::query_as::<_, CreditEntry>(
                "SELECT * FROM credit_ledger WHERE idempotency_key = $1",
            )
            .bind(key)
            .fetch_optional(pool)
            .await?),
            Backend::Memory(store) => Ok(store
                .lock()?
                .credit_ledger
                .iter()
                .find(|c| c.idempotency_key == key)
                .cloned()),
        }
    }
}
