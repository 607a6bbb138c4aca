//! Event entity and repository
//!
//! Events carry their own seat counter (`registered_count`) and the binding
//! for the currently valid attendance QR code (`qr_nonce`, `qr_active`,
//! `qr_expires_at`).

use chrono::{DateTime, NaiveDate, Utc};
use seams_core::{
    validate_date_range, EventCategory, EventDraft, EventPatch, EventStatus, SeamsError,
};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Backend, StoreError};

/// Event entity from database
#[derive(Debug, Clone, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub time: String,
    pub end_date: Option<NaiveDate>,
    pub end_time: Option<String>,
    pub venue: String,
    #[sqlx(try_from = "String")]
    pub category: EventCategory,
    pub points: i32,
    pub max_participants: Option<i32>,
    pub registered_count: i32,
    pub poster: Option<String>,
    pub coordinators: Vec<String>,
    pub organizer_id: Uuid,
    #[sqlx(try_from = "String")]
    pub status: EventStatus,
    pub qr_nonce: Option<Uuid>,
    pub qr_active: bool,
    pub qr_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Apply a partial update in place, enforcing the rules that need the
    /// stored event: date range and not shrinking below current sign-ups.
    pub fn apply_patch(&mut self, patch: &EventPatch) -> Result<(), SeamsError> {
        patch.validate()?;

        let date = patch.date.unwrap_or(self.date);
        let end_date = patch.end_date.or(self.end_date);
        validate_date_range(date, end_date)?;

        if let Some(max) = patch.max_participants {
            if max < self.registered_count {
                return Err(SeamsError::InvalidInput(format!(
                    "max_participants ({}) is below current registrations ({})",
                    max, self.registered_count
                )));
            }
        }

        if let Some(title) = &patch.title {
            self.title = title.trim().to_string();
        }
        if let Some(description) = &patch.description {
            self.description = description.trim().to_string();
        }
        if let Some(time) = &patch.time {
            self.time = time.trim().to_string();
        }
        if let Some(venue) = &patch.venue {
            self.venue = venue.trim().to_string();
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(points) = patch.points {
            self.points = points;
        }
        if patch.max_participants.is_some() {
            self.max_participants = patch.max_participants;
        }
        if patch.poster.is_some() {
            self.poster = patch.poster.clone();
        }
        if patch.end_time.is_some() {
            self.end_time = patch.end_time.clone();
        }
        if let Some(coordinators) = &patch.coordinators {
            self.coordinators = coordinators.clone();
        }
        self.date = date;
        self.end_date = end_date;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Organizer summary embedded in event responses
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrganizerSummary {
    #[schema(value_type = String)]
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// Event response DTO (the QR nonce stays server-side)
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventResponse {
    #[schema(value_type = String, example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: Uuid,
    #[schema(example = "Hackathon 2026")]
    pub title: String,
    pub description: String,
    #[schema(value_type = String, example = "2026-03-14")]
    pub date: NaiveDate,
    #[schema(example = "09:30")]
    pub time: String,
    #[schema(value_type = Option<String>)]
    pub end_date: Option<NaiveDate>,
    pub end_time: Option<String>,
    pub venue: String,
    #[schema(value_type = String, example = "Technical")]
    pub category: EventCategory,
    pub points: i32,
    pub max_participants: Option<i32>,
    pub registered_count: i32,
    pub poster: Option<String>,
    pub coordinators: Vec<String>,
    #[schema(value_type = String)]
    pub organizer_id: Uuid,
    /// Populated on single-event reads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizer: Option<OrganizerSummary>,
    #[schema(value_type = String, example = "approved")]
    pub status: EventStatus,
    pub qr_active: bool,
    #[schema(value_type = Option<String>)]
    pub qr_expires_at: Option<DateTime<Utc>>,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl From<Event> for EventResponse {
    fn from(event: Event) -> Self {
        Self {
            id: event.id,
            title: event.title,
            description: event.description,
            date: event.date,
            time: event.time,
            end_date: event.end_date,
            end_time: event.end_time,
            venue: event.venue,
            category: event.category,
            points: event.points,
            max_participants: event.max_participants,
            registered_count: event.registered_count,
            poster: event.poster,
            coordinators: event.coordinators,
            organizer_id: event.organizer_id,
            organizer: None,
            status: event.status,
            qr_active: event.qr_active,
            qr_expires_at: event.qr_expires_at,
            created_at: event.created_at,
        }
    }
}

/// DTO for creating a new event
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub draft: EventDraft,
    pub organizer_id: Uuid,
    pub status: EventStatus,
}

/// Filters for listing events
#[derive(Debug, Clone, Copy, Default)]
pub struct EventFilter {
    pub category: Option<EventCategory>,
    pub status: Option<EventStatus>,
}

impl EventFilter {
    fn matches(&self, event: &Event) -> bool {
        self.category.map_or(true, |c| event.category == c)
            && self.status.map_or(true, |s| event.status == s)
    }
}

/// Repository for event database operations
#[derive(Clone)]
pub struct EventRepository {
    backend: Backend,
}

impl EventRepository {
    pub(crate) fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Create a new event
    pub async fn create(&self, input: NewEvent) -> Result<Event, StoreError> {
        input.draft.validate()?;

        let now = Utc::now();
        let draft = input.draft;
        let event = Event {
            id: Uuid::new_v4(),
            title: draft.title.trim().to_string(),
            description: draft.description.trim().to_string(),
            date: draft.date,
            time: draft.time.trim().to_string(),
            end_date: draft.end_date,
            end_time: draft.end_time,
            venue: draft.venue.trim().to_string(),
            category: draft.category,
            points: draft.points,
            max_participants: draft.max_participants,
            registered_count: 0,
            poster: draft.poster,
            coordinators: draft.coordinators,
            organizer_id: input.organizer_id,
            status: input.status,
            qr_nonce: None,
            qr_active: false,
            qr_expires_at: None,
            created_at: now,
            updated_at: now,
        };

        match &self.backend {
            Backend::Postgres(pool) => Ok(sqlx::query_as::<_, Event>(
                r#"
                INSERT INTO events (id, title, description, date, time, end_date, end_time, venue,
                                    category, points, max_participants, poster, coordinators,
                                    organizer_id, status, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $16)
                RETURNING *
                "#,
            )
            .bind(event.id)
            .bind(&event.title)
            .bind(&event.description)
            .bind(event.date)
            .bind(&event.time)
            .bind(event.end_date)
            .bind(&event.end_time)
            .bind(&event.venue)
            .bind(event.category.as_str())
            .bind(event.points)
            .bind(event.max_participants)
            .bind(&event.poster)
            .bind(&event.coordinators)
            .bind(event.organizer_id)
            .bind(event.status.as_str())
            .bind(now)
            .fetch_one(pool)
            .await?),
            Backend::Memory(store) => {
                let mut tables = store.lock()?;
                if !tables.users.contains_key(&event.organizer_id) {
                    return Err(StoreError::NotFound("organizer"));
                }
                tables.events.insert(event.id, event.clone());
                Ok(event)
            }
        }
    }

    /// Find event by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        match &self.backend {
            Backend::Postgres(pool) => Ok(sqlx::query_as::<_, Event>(
                "SELECT * FROM events WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(pool)
            .await?),
            Backend::Memory(store) => Ok(store.lock()?.events.get(&id).cloned()),
        }
    }

    /// List events matching `filter`, soonest first
    pub async fn list(&self, filter: EventFilter) -> Result<Vec<Event>, StoreError> {
        match &self.backend {
            Backend::Postgres(pool) => Ok(sqlx::query_as::<_, Event>(
                r#"
                SELECT * FROM events
                WHERE ($1::TEXT IS NULL OR category = $1)
                  AND ($2::TEXT IS NULL OR status = $2)
                ORDER BY date ASC, time ASC
                "#,
            )
            .bind(filter.category.map(|c| c.as_str()))
            .bind(filter.status.map(|s| s.as_str()))
            .fetch_all(pool)
            .await?),
            Backend::Memory(store) => {
                let tables = store.lock()?;
                let mut events: Vec<Event> = tables
                    .events
                    .values()
                    .filter(|e| filter.matches(e))
                    .cloned()
                    .collect();
                events.sort_by(|a, b| (a.date, &a.time).cmp(&(b.date, &b.time)));
                Ok(events)
            }
        }
    }

    /// Events organized by a user, latest first
    pub async fn list_by_organizer(&self, organizer_id: Uuid) -> Result<Vec<Event>, StoreError> {
        match &self.backend {
            Backend::Postgres(pool) => Ok(sqlx::query_as::<_, Event>(
                "SELECT * FROM events WHERE organizer_id = $1 ORDER BY date DESC, time DESC",
            )
            .bind(organizer_id)
            .fetch_all(pool)
            .await?),
            Backend::Memory(store) => {
                let tables = store.lock()?;
                let mut events: Vec<Event> = tables
                    .events
                    .values()
                    .filter(|e| e.organizer_id == organizer_id)
                    .cloned()
                    .collect();
                events.sort_by(|a, b| (b.date, &b.time).cmp(&(a.date, &a.time)));
                Ok(events)
            }
        }
    }

    /// Apply a partial update under a row lock
    pub async fn update(&self, id: Uuid, patch: &EventPatch) -> Result<Event, StoreError> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let mut tx = pool.begin().await?;
                let mut event =
                    sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1 FOR UPDATE")
                        .bind(id)
                        .fetch_optional(&mut *tx)
                        .await?
                        .ok_or(StoreError::NotFound("Event"))?;

                event.apply_patch(patch)?;

                let updated = sqlx::query_as::<_, Event>(
                    r#"
                    UPDATE events SET
                        title = $2, description = $3, date = $4, time = $5, end_date = $6,
                        end_time = $7, venue = $8, category = $9, points = $10,
                        max_participants = $11, poster = $12, coordinators = $13,
                        updated_at = NOW()
                    WHERE id = $1
                    RETURNING *
                    "#,
                )
                .bind(event.id)
                .bind(&event.title)
                .bind(&event.description)
                .bind(event.date)
                .bind(&event.time)
                .bind(event.end_date)
                .bind(&event.end_time)
                .bind(&event.venue)
                .bind(event.category.as_str())
                .bind(event.points)
                .bind(event.max_participants)
                .bind(&event.poster)
                .bind(&event.coordinators)
                .fetch_one(&mut *tx)
                .await?;

                tx.commit().await?;
                Ok(updated)
            }
            Backend::Memory(store) => {
                let mut tables = store.lock()?;
                let event = tables
                    .events
                    .get_mut(&id)
                    .ok_or(StoreError::NotFound("Event"))?;
                let mut staged = event.clone();
                staged.apply_patch(patch)?;
                *event = staged.clone();
                Ok(staged)
            }
        }
    }

    /// Delete an event and, by cascade, its registrations
    pub async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let result = sqlx::query("DELETE FROM events WHERE id = $1")
                    .bind(id)
                    .execute(pool)
                    .await?;
                Ok(result.rows_affected() > 0)
            }
            Backend::Memory(store) => Ok(store.lock()?.delete_event(id)),
        }
    }

    /// Move an event through the review workflow.
    ///
    /// Returns the updated event and the status it left.
    pub async fn set_status(
        &self,
        id: Uuid,
        next: EventStatus,
    ) -> Result<(Event, EventStatus), StoreError> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let mut tx = pool.begin().await?;
                let current: Option<(String,)> =
                    sqlx::query_as("SELECT status FROM events WHERE id = $1 FOR UPDATE")
                        .bind(id)
                        .fetch_optional(&mut *tx)
                        .await?;
                let (current,) = current.ok_or(StoreError::NotFound("Event"))?;
                let previous: EventStatus = current.parse()?;
                previous.transition(next)?;

                let updated = sqlx::query_as::<_, Event>(
                    "UPDATE events SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
                )
                .bind(id)
                .bind(next.as_str())
                .fetch_one(&mut *tx)
                .await?;
                tx.commit().await?;
                Ok((updated, previous))
            }
            Backend::Memory(store) => {
                let mut tables = store.lock()?;
                let event = tables
                    .events
                    .get_mut(&id)
                    .ok_or(StoreError::NotFound("Event"))?;
                let previous = event.status;
                event.status = previous.transition(next)?;
                event.updated_at = Utc::now();
                Ok((event.clone(), previous))
            }
        }
    }

    /// Bind a newly issued attendance QR to the event. Any previously
    /// issued QR stops verifying because its nonce no longer matches.
    pub async fn activate_qr(
        &self,
        id: Uuid,
        nonce: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<Event, StoreError> {
        match &self.backend {
            Backend::Postgres(pool) => sqlx::query_as::<_, Event>(
                r#"
                UPDATE events SET qr_nonce = $2, qr_active = TRUE, qr_expires_at = $3,
                                  updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(nonce)
            .bind(expires_at)
            .fetch_optional(pool)
            .await?
            .ok_or(StoreError::NotFound("Event")),
            Backend::Memory(store) => {
                let mut tables = store.lock()?;
                let event = tables
                    .events
                    .get_mut(&id)
                    .ok_or(StoreError::NotFound("Event"))?;
                event.qr_nonce = Some(nonce);
                event.qr_active = true;
                event.qr_expires_at = Some(expires_at);
                event.updated_at = Utc::now();
                Ok(event.clone())
            }
        }
    }

    /// Stop accepting attendance for the event
    pub async fn close_qr(&self, id: Uuid) -> Result<Event, StoreError> {
        match &self.backend {
            Backend::Postgres(pool) => sqlx::query_as::<_, Event>(
                "UPDATE events SET qr_active = FALSE, updated_at = NOW() WHERE id = $1 RETURNING *",
            )
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(StoreError::NotFound("Event")),
            Backend::Memory(store) => {
                let mut tables = store.lock()?;
                let event = tables
                    .events
                    .get_mut(&id)
                    .ok_or(StoreError::NotFound("Event"))?;
                event.qr_active = false;
                event.updated_at = Utc::now();
                Ok(event.clone())
            }
        }
    }
}
