//! Registration entity and repository
//!
//! Sign-ups, seat accounting and attendance. The multi-row operations here
//! (`register`, `record_attendance`, `reject`) each run in one transaction
//! so seat counts and credit totals never drift from the rows they
//! summarise.

use chrono::{DateTime, NaiveDate, Utc};
use seams_core::{
    check_capacity, CreditAward, EventCategory, EventStatus, RegistrationStatus, SeamsError,
};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Backend, CreditEntry, Event, StoreError};

/// Registration entity from database
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Registration {
    #[schema(value_type = String)]
    pub id: Uuid,
    #[schema(value_type = String)]
    pub student_id: Uuid,
    #[schema(value_type = String)]
    pub event_id: Uuid,
    #[sqlx(try_from = "String")]
    #[schema(value_type = String, example = "registered")]
    pub status: RegistrationStatus,
    #[schema(value_type = String)]
    pub registered_at: DateTime<Utc>,
    #[schema(value_type = Option<String>)]
    pub attended_at: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>)]
    pub verified_by: Option<Uuid>,
    /// Points snapshotted from the event when attendance was verified
    pub points_awarded: i32,
}

/// A registration joined with a summary of its event
#[derive(Debug, Clone, FromRow)]
pub struct RegistrationWithEvent {
    #[sqlx(flatten)]
    pub registration: Registration,
    pub event_title: String,
    pub event_date: NaiveDate,
    pub event_venue: String,
    pub event_points: i32,
    #[sqlx(try_from = "String")]
    pub event_status: EventStatus,
    #[sqlx(try_from = "String")]
    pub event_category: EventCategory,
}

/// A registration joined with a summary of its student
#[derive(Debug, Clone, FromRow)]
pub struct RegistrationWithStudent {
    #[sqlx(flatten)]
    pub registration: Registration,
    pub student_name: String,
    pub student_email: String,
    pub student_usn: Option<String>,
}

/// What a scanned attendance token asserts, already signature-checked
#[derive(Debug, Clone, Copy)]
pub struct AttendanceCheck {
    pub event_id: Uuid,
    pub nonce: Uuid,
    pub student_id: Uuid,
    pub verified_by: Uuid,
    pub now: DateTime<Utc>,
}

/// Result of recording attendance
#[derive(Debug, Clone)]
pub struct AttendanceOutcome {
    pub registration: Registration,
    pub event: Event,
    /// Points credited by this call (0 on a replay)
    pub points_awarded: i32,
    /// False when the registration was already verified
    pub newly_verified: bool,
    /// Student's credit total after this call
    pub total_credits: i64,
}

/// The event-side QR binding: active, current nonce, not past its stored expiry.
fn check_qr_binding(event: &Event, check: &AttendanceCheck) -> Result<(), SeamsError> {
    if !event.qr_active {
        return Err(SeamsError::QrInactive);
    }
    if event.qr_nonce != Some(check.nonce) {
        return Err(SeamsError::QrTokenRevoked);
    }
    if event.qr_expires_at.map_or(true, |exp| check.now >= exp) {
        return Err(SeamsError::QrExpired);
    }
    Ok(())
}

/// Repository for registration database operations
#[derive(Clone)]
pub struct RegistrationRepository {
    backend: Backend,
}

impl RegistrationRepository {
    pub(crate) fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Find registration by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Registration>, StoreError> {
        match &self.backend {
            Backend::Postgres(pool) => Ok(sqlx::query_as::<_, Registration>(
                "SELECT * FROM registrations WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(pool)
            .await?),
            Backend::Memory(store) => Ok(store.lock()?.registrations.get(&id).cloned()),
        }
    }

    /// Register a student for an event, taking a seat.
    ///
    /// Fails with `EventNotOpen`, `EventFull`, `AlreadyRegistered` or
    /// `RegistrationRejected`; nothing is written on failure.
    pub async fn register(
        &self,
        student_id: Uuid,
        event_id: Uuid,
    ) -> Result<(Registration, Event), StoreError> {
        let now = Utc::now();
        match &self.backend {
            Backend::Postgres(pool) => {
                let mut tx = pool.begin().await?;

                let event =
                    sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1 FOR UPDATE")
                        .bind(event_id)
                        .fetch_optional(&mut *tx)
                        .await?
                        .ok_or(StoreError::NotFound("Event"))?;
                event.status.ensure_open()?;

                let existing: Option<(String,)> = sqlx::query_as(
                    "SELECT status FROM registrations WHERE student_id = $1 AND event_id = $2",
                )
                .bind(student_id)
                .bind(event_id)
                .fetch_optional(&mut *tx)
                .await?;
                if let Some((status,)) = existing {
                    return Err(match status.parse::<RegistrationStatus>()? {
                        RegistrationStatus::Rejected => SeamsError::RegistrationRejected,
                        _ => SeamsError::AlreadyRegistered,
                    }
                    .into());
                }

                check_capacity(event.registered_count, event.max_participants)?;

                let registration = sqlx::query_as::<_, Registration>(
                    r#"
                    INSERT INTO registrations (id, student_id, event_id, status, registered_at)
                    VALUES ($1, $2, $3, 'registered', $4)
                    ON CONFLICT (student_id, event_id) DO NOTHING
                    RETURNING *
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(student_id)
                .bind(event_id)
                .bind(now)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(StoreError::Rule(SeamsError::AlreadyRegistered))?;

                let event = sqlx::query_as::<_, Event>(
                    r#"
                    UPDATE events SET registered_count = registered_count + 1, updated_at = NOW()
                    WHERE id = $1
                    RETURNING *
                    "#,
                )
                .bind(event_id)
                .fetch_one(&mut *tx)
                .await?;

                tx.commit().await?;
                Ok((registration, event))
            }
            Backend::Memory(store) => {
                let mut tables = store.lock()?;
                if !tables.users.contains_key(&student_id) {
                    return Err(StoreError::NotFound("Student"));
                }
                let event = tables
                    .events
                    .get(&event_id)
                    .ok_or(StoreError::NotFound("Event"))?;
                event.status.ensure_open()?;

                if let Some(existing) = tables.registration_for(student_id, event_id) {
                    return Err(match existing.status {
                        RegistrationStatus::Rejected => SeamsError::RegistrationRejected,
                        _ => SeamsError::AlreadyRegistered,
                    }
                    .into());
                }
                check_capacity(event.registered_count, event.max_participants)?;

                let registration = Registration {
                    id: Uuid::new_v4(),
                    student_id,
                    event_id,
                    status: RegistrationStatus::Registered,
                    registered_at: now,
                    attended_at: None,
                    verified_by: None,
                    points_awarded: 0,
                };
                tables
                    .registrations
                    .insert(registration.id, registration.clone());

                let event = tables
                    .events
                    .get_mut(&event_id)
                    .ok_or(StoreError::NotFound("Event"))?;
                event.registered_count += 1;
                event.updated_at = now;
                Ok((registration, event.clone()))
            }
        }
    }

    /// Mark attendance and post credit exactly once.
    ///
    /// The event's QR binding is re-checked under lock. Verifying an
    /// already-verified registration is a no-op that reports
    /// `newly_verified = false` and awards nothing.
    pub async fn record_attendance(
        &self,
        check: AttendanceCheck,
    ) -> Result<AttendanceOutcome, StoreError> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let mut tx = pool.begin().await?;

                let event =
                    sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1 FOR SHARE")
                        .bind(check.event_id)
                        .fetch_optional(&mut *tx)
                        .await?
                        .ok_or(StoreError::NotFound("Event"))?;
                check_qr_binding(&event, &check)?;

                let registration = sqlx::query_as::<_, Registration>(
                    r#"
                    SELECT * FROM registrations
                    WHERE student_id = $1 AND event_id = $2
                    FOR UPDATE
                    "#,
                )
                .bind(check.student_id)
                .bind(check.event_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(StoreError::Rule(SeamsError::NotRegistered))?;

                match registration.status.ensure_verifiable() {
                    Ok(()) => {}
                    Err(SeamsError::AlreadyVerified) => {
                        let (total_credits,): (i64,) =
                            sqlx::query_as("SELECT credits FROM users WHERE id = $1")
                                .bind(check.student_id)
                                .fetch_one(&mut *tx)
                                .await?;
                        tx.commit().await?;
                        return Ok(AttendanceOutcome {
                            registration,
                            event,
                            points_awarded: 0,
                            newly_verified: false,
                            total_credits,
                        });
                    }
                    Err(e) => return Err(e.into()),
                }

                let award = CreditAward::for_attendance(
                    registration.id,
                    check.student_id,
                    event.id,
                    event.points,
                );
                let inserted = sqlx::query(
                    r#"
                    INSERT INTO credit_ledger (id, registration_id, student_id, event_id, points,
                                               idempotency_key, created_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    ON CONFLICT DO NOTHING
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(award.registration_id)
                .bind(award.student_id)
                .bind(award.event_id)
                .bind(award.points)
                .bind(&award.idempotency_key)
                .bind(check.now)
                .execute(&mut *tx)
                .await?
                .rows_affected()
                    == 1;

                let registration = sqlx::query_as::<_, Registration>(
                    r#"
                    UPDATE registrations
                    SET status = 'verified', attended_at = $2, verified_by = $3, points_awarded = $4
                    WHERE id = $1
                    RETURNING *
                    "#,
                )
                .bind(registration.id)
                .bind(check.now)
                .bind(check.verified_by)
                .bind(award.points)
                .fetch_one(&mut *tx)
                .await?;

                let (total_credits,): (i64,) = if inserted {
                    sqlx::query_as(
                        r#"
                        UPDATE users SET credits = credits + $2, updated_at = NOW()
                        WHERE id = $1
                        RETURNING credits
                        "#,
                    )
                    .bind(check.student_id)
                    .bind(i64::from(award.points))
                    .fetch_one(&mut *tx)
                    .await?
                } else {
                    sqlx::query_as("SELECT credits FROM users WHERE id = $1")
                        .bind(check.student_id)
                        .fetch_one(&mut *tx)
                        .await?
                };

                tx.commit().await?;
                Ok(AttendanceOutcome {
                    registration,
                    event,
                    points_awarded: if inserted { award.points } else { 0 },
                    newly_verified: true,
                    total_credits,
                })
            }
            Backend::Memory(store) => {
                let mut tables = store.lock()?;

                let event = tables
                    .events
                    .get(&check.event_id)
                    .cloned()
                    .ok_or(StoreError::NotFound("Event"))?;
                check_qr_binding(&event, &check)?;

                let registration = tables
                    .registration_for(check.student_id, check.event_id)
                    .cloned()
                    .ok_or(StoreError::Rule(SeamsError::NotRegistered))?;
                let current_credits = tables
                    .users
                    .get(&check.student_id)
                    .map(|u| u.credits)
                    .ok_or(StoreError::NotFound("Student"))?;

                match registration.status.ensure_verifiable() {
                    Ok(()) => {}
                    Err(SeamsError::AlreadyVerified) => {
                        return Ok(AttendanceOutcome {
                            registration,
                            event,
                            points_awarded: 0,
                            newly_verified: false,
                            total_credits: current_credits,
                        });
                    }
                    Err(e) => return Err(e.into()),
                }

                let award = CreditAward::for_attendance(
                    registration.id,
                    check.student_id,
                    event.id,
                    event.points,
                );
                let inserted = !tables.credit_ledger.iter().any(|c| {
                    c.registration_id == award.registration_id
                        || c.idempotency_key == award.idempotency_key
                });
                if inserted {
                    tables.credit_ledger.push(CreditEntry {
                        id: Uuid::new_v4(),
                        registration_id: award.registration_id,
                        student_id: award.student_id,
                        event_id: award.event_id,
                        points: award.points,
                        idempotency_key: award.idempotency_key.clone(),
                        created_at: check.now,
                    });
                }

                let registration = match tables.registrations.get_mut(&registration.id) {
                    Some(stored) => {
                        stored.status = RegistrationStatus::Verified;
                        stored.attended_at = Some(check.now);
                        stored.verified_by = Some(check.verified_by);
                        stored.points_awarded = award.points;
                        stored.clone()
                    }
                    None => return Err(StoreError::NotFound("Registration")),
                };

                let mut total_credits = current_credits;
                if inserted {
                    if let Some(user) = tables.users.get_mut(&check.student_id) {
                        user.credits += i64::from(award.points);
                        user.updated_at = check.now;
                        total_credits = user.credits;
                    }
                }

                Ok(AttendanceOutcome {
                    registration,
                    event,
                    points_awarded: if inserted { award.points } else { 0 },
                    newly_verified: true,
                    total_credits,
                })
            }
        }
    }

    /// Reject a pending registration and free its seat
    pub async fn reject(&self, id: Uuid) -> Result<(Registration, Event), StoreError> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let mut tx = pool.begin().await?;
                let registration = sqlx::query_as::<_, Registration>(
                    "SELECT * FROM registrations WHERE id = $1 FOR UPDATE",
                )
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(StoreError::NotFound("Registration"))?;
                registration.status.ensure_rejectable()?;

                let registration = sqlx::query_as::<_, Registration>(
                    "UPDATE registrations SET status = 'rejected' WHERE id = $1 RETURNING *",
                )
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

                let event = sqlx::query_as::<_, Event>(
                    r#"
                    UPDATE events SET registered_count = registered_count - 1, updated_at = NOW()
                    WHERE id = $1
                    RETURNING *
                    "#,
                )
                .bind(registration.event_id)
                .fetch_one(&mut *tx)
                .await?;

                tx.commit().await?;
                Ok((registration, event))
            }
            Backend::Memory(store) => {
                let mut tables = store.lock()?;
                let registration = tables
                    .registrations
                    .get_mut(&id)
                    .ok_or(StoreError::NotFound("Registration"))?;
                registration.status.ensure_rejectable()?;
                registration.status = RegistrationStatus::Rejected;
                let registration = registration.clone();

                let event = tables
                    .events
                    .get_mut(&registration.event_id)
                    .ok_or(StoreError::NotFound("Event"))?;
                event.registered_count -= 1;
                event.updated_at = Utc::now();
                Ok((registration, event.clone()))
            }
        }
    }

    /// A student's registrations with event summaries, newest first
    pub async fn list_for_student(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<RegistrationWithEvent>, StoreError> {
        match &self.backend {
            Backend::Postgres(pool) => Ok(sqlx::query_as::<_, RegistrationWithEvent>(
                r#"
                SELECT r.*, e.title AS event_title, e.date AS event_date, e.venue AS event_venue,
                       e.points AS event_points, e.status AS event_status,
                       e.category AS event_category
                FROM registrations r
                JOIN events e ON e.id = r.event_id
                WHERE r.student_id = $1
                ORDER BY r.registered_at DESC
                "#,
            )
            .bind(student_id)
            .fetch_all(pool)
            .await?),
            Backend::Memory(store) => {
                let tables = store.lock()?;
                let mut rows: Vec<RegistrationWithEvent> = tables
                    .registrations
                    .values()
                    .filter(|r| r.student_id == student_id)
                    .filter_map(|r| {
                        let e = tables.events.get(&r.event_id)?;
                        Some(RegistrationWithEvent {
                            registration: r.clone(),
                            event_title: e.title.clone(),
                            event_date: e.date,
                            event_venue: e.venue.clone(),
                            event_points: e.points,
                            event_status: e.status,
                            event_category: e.category,
                        })
                    })
                    .collect();
                rows.sort_by(|a, b| b.registration.registered_at.cmp(&a.registration.registered_at));
                Ok(rows)
            }
        }
    }

    /// An event's registrations with student summaries, newest first
    pub async fn list_for_event(
        &self,
        event_id: Uuid,
    ) -> Result<Vec<RegistrationWithStudent>, StoreError> {
        match &self.backend {
            Backend::Postgres(pool) => Ok(sqlx::query_as::<_, RegistrationWithStudent>(
                r#"
                SELECT r.*, u.name AS student_name, u.email AS student_email,
                       u.usn AS student_usn
                FROM registrations r
                JOIN users u ON u.id = r.student_id
                WHERE r.event_id = $1
                ORDER BY r.registered_at DESC
                "#,
            )
            .bind(event_id)
            .fetch_all(pool)
            .await?),
            Backend::Memory(store) => {
                let tables = store.lock()?;
                let mut rows: Vec<RegistrationWithStudent> = tables
                    .registrations
                    .values()
                    .filter(|r| r.event_id == event_id)
                    .filter_map(|r| {
                        let u = tables.users.get(&r.student_id)?;
                        Some(RegistrationWithStudent {
                            registration: r.clone(),
                            student_name: u.name.clone(),
                            student_email: u.email.clone(),
                            student_usn: u.usn.clone(),
                        })
                    })
                    .collect();
                rows.sort_by(|a, b| b.registration.registered_at.cmp(&a.registration.registered_at));
                Ok(rows)
            }
        }
    }
}
