//! Credit posting rules.
//!
//! Credits are awarded through a ledger with one entry per registration. The
//! registration id doubles as the idempotency key, so replaying an attendance
//! verification can never post the same credit twice.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A credit award about to be posted to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditAward {
    pub registration_id: Uuid,
    pub student_id: Uuid,
    pub event_id: Uuid,
    /// Points snapshotted from the event at verification time.
    pub points: i32,
    pub idempotency_key: String,
}

impl CreditAward {
    pub fn for_attendance(registration_id: Uuid, student_id: Uuid, event_id: Uuid, points: i32) -> Self {
        Self {
            registration_id,
            student_id,
            event_id,
            points,
            idempotency_key: attendance_key(registration_id),
        }
    }
}

/// Deterministic idempotency key for the attendance credit of a registration.
pub fn attendance_key(registration_id: Uuid) -> String {
    format!("attendance:{}", registration_id)
}

/// Sum of ledger points, saturating instead of overflowing.
pub fn total_points<I: IntoIterator<Item = i32>>(points: I) -> i64 {
    points
        .into_iter()
        .fold(0i64, |acc, p| acc.saturating_add(i64::from(p)))
}
