//! Event handlers
//!
//! Browsing, the organizer's event management, admin review, and the
//! attendance QR lifecycle.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use seams_core::{render_png_data_url, EventDraft, EventPatch, EventStatus, RegistrationStatus};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::audit::{self, AuditEntry};
use crate::auth::AuthenticatedUser;
use crate::db::{Event, EventFilter, EventResponse, NewEvent, OrganizerSummary};
use crate::error::ApiError;
use crate::handlers::AppState;

/// Load an event or fail with 404
pub(crate) async fn load_event(state: &AppState, id: Uuid) -> Result<Event, ApiError> {
    state
        .db
        .events()
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Event not found"))
}

/// Query parameters for listing events
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListEventsQuery {
    /// Category name, e.g. "Technical" or "Life Skills"
    pub category: Option<String>,
    /// pending, approved, rejected or completed
    pub status: Option<String>,
    /// Include every status instead of only approved events
    #[param(default = false)]
    pub show_all: Option<bool>,
}

impl ListEventsQuery {
    fn into_filter(self) -> Result<EventFilter, ApiError> {
        let category = self.category.as_deref().map(str::parse).transpose()?;
        let status = self.status.as_deref().map(str::parse).transpose()?;
        let status = match (self.show_all.unwrap_or(false), status) {
            (_, Some(status)) => Some(status),
            (true, None) => None,
            (false, None) => Some(EventStatus::Approved),
        };
        Ok(EventFilter { category, status })
    }
}

/// Request for creating an event
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateEventRequest {
    #[schema(example = "Hackathon 2026")]
    pub title: String,
    pub description: String,
    #[schema(value_type = String, example = "2026-03-14")]
    pub date: NaiveDate,
    /// 24h HH:MM
    #[schema(example = "09:30")]
    pub time: String,
    pub venue: String,
    #[schema(example = "Technical")]
    pub category: String,
    #[serde(default)]
    pub points: i32,
    #[serde(default)]
    pub max_participants: Option<i32>,
    #[serde(default)]
    pub poster: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub coordinators: Vec<String>,
}

impl CreateEventRequest {
    fn into_draft(self) -> Result<EventDraft, ApiError> {
        Ok(EventDraft {
            category: self.category.parse()?,
            title: self.title,
            description: self.description,
            date: self.date,
            time: self.time,
            venue: self.venue,
            points: self.points,
            max_participants: self.max_participants,
            poster: self.poster,
            end_date: self.end_date,
            end_time: self.end_time,
            coordinators: self.coordinators,
        })
    }
}

/// Partial event update; omitted fields are left unchanged
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>)]
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub venue: Option<String>,
    pub category: Option<String>,
    pub points: Option<i32>,
    pub max_participants: Option<i32>,
    pub poster: Option<String>,
    #[schema(value_type = Option<String>)]
    pub end_date: Option<NaiveDate>,
    pub end_time: Option<String>,
    pub coordinators: Option<Vec<String>>,
}

impl UpdateEventRequest {
    fn into_patch(self) -> Result<EventPatch, ApiError> {
        Ok(EventPatch {
            category: self.category.as_deref().map(str::parse).transpose()?,
            title: self.title,
            description: self.description,
            date: self.date,
            time: self.time,
            venue: self.venue,
            points: self.points,
            max_participants: self.max_participants,
            poster: self.poster,
            end_date: self.end_date,
            end_time: self.end_time,
            coordinators: self.coordinators,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    #[schema(example = "approved")]
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteEventResponse {
    pub message: String,
}

/// A freshly generated attendance QR
#[derive(Debug, Serialize, ToSchema)]
pub struct QrResponse {
    /// Signed attendance token encoded in the image
    pub qr_code: String,
    /// PNG as a data: URL
    pub qr_data_url: String,
    #[schema(value_type = String)]
    pub expires_at: DateTime<Utc>,
}

/// Student summary inside participant lists
#[derive(Debug, Serialize, ToSchema)]
pub struct ParticipantStudent {
    #[schema(value_type = String)]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub usn: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Participant {
    /// Registration ID
    #[schema(value_type = String)]
    pub id: Uuid,
    #[schema(value_type = String, example = "registered")]
    pub status: RegistrationStatus,
    #[schema(value_type = String)]
    pub registered_at: DateTime<Utc>,
    pub student: ParticipantStudent,
}

/// One of the organizer's events with its participants
#[derive(Debug, Serialize, ToSchema)]
pub struct EventStats {
    #[serde(flatten)]
    pub event: EventResponse,
    pub participants: Vec<Participant>,
}

/// List events
///
/// Only approved events unless `show_all=true`; an explicit `status`
/// always applies. Soonest first.
#[utoipa::path(
    get,
    path = "/api/events",
    tag = "Events",
    params(ListEventsQuery),
    responses(
        (status = 200, description = "Events", body = [EventResponse]),
        (status = 400, description = "Unknown category or status")
    )
)]
pub async fn list_events_handler(
    State(state): State<AppState>,
    Query(query): Query<ListEventsQuery>,
) -> Result<Json<Vec<EventResponse>>, ApiError> {
    let filter = query.into_filter()?;
    let events = state.db.events().list(filter).await?;
    Ok(Json(events.into_iter().map(EventResponse::from).collect()))
}

/// Create an event
///
/// Coordinator events wait for admin approval; faculty and admin events
/// are approved immediately.
#[utoipa::path(
    post,
    path = "/api/events",
    tag = "Events",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created", body = EventResponse),
        (status = 400, description = "Invalid event data"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Role cannot manage events")
    ),
    security(("bearer_token" = []))
)]
pub async fn create_event_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(request): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<EventResponse>), ApiError> {
    user.require_event_manager()?;

    let event = state
        .db
        .events()
        .create(NewEvent {
            draft: request.into_draft()?,
            organizer_id: user.id(),
            status: EventStatus::initial_for(user.role()),
        })
        .await?;

    audit::record(
        &state.db,
        &headers,
        AuditEntry::new(audit::CREATE_EVENT, Some(user.id()))
            .target("Event", event.id)
            .details(json!({ "title": event.title })),
    )
    .await;

    state.hub.event_created(&event);

    tracing::info!(event_id = %event.id, status = %event.status, "Event created");
    Ok((StatusCode::CREATED, Json(EventResponse::from(event))))
}

/// The caller's own events with participants
#[utoipa::path(
    get,
    path = "/api/events/coordinator/stats",
    tag = "Events",
    responses(
        (status = 200, description = "Own events, latest first", body = [EventStats]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Role cannot manage events")
    ),
    security(("bearer_token" = []))
)]
pub async fn coordinator_stats_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<EventStats>>, ApiError> {
    user.require_event_manager()?;

    let events = state.db.events().list_by_organizer(user.id()).await?;
    let registrations = state.db.registrations();

    let mut stats = Vec::with_capacity(events.len());
    for event in events {
        let participants = registrations
            .list_for_event(event.id)
            .await?
            .into_iter()
            .map(|row| Participant {
                id: row.registration.id,
                status: row.registration.status,
                registered_at: row.registration.registered_at,
                student: ParticipantStudent {
                    id: row.registration.student_id,
                    name: row.student_name,
                    email: row.student_email,
                    usn: row.student_usn,
                },
            })
            .collect();
        stats.push(EventStats {
            event: EventResponse::from(event),
            participants,
        });
    }

    Ok(Json(stats))
}

/// Get one event with its organizer
#[utoipa::path(
    get,
    path = "/api/events/{id}",
    tag = "Events",
    params(("id" = String, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event", body = EventResponse),
        (status = 404, description = "Event not found")
    )
)]
pub async fn get_event_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EventResponse>, ApiError> {
    let event = load_event(&state, id).await?;
    let organizer = state.db.users().find_by_id(event.organizer_id).await?;

    let mut response = EventResponse::from(event);
    response.organizer = organizer.map(|u| OrganizerSummary {
        id: u.id,
        name: u.name,
        email: u.email,
    });
    Ok(Json(response))
}

/// Update an event (organizer or admin)
#[utoipa::path(
    put,
    path = "/api/events/{id}",
    tag = "Events",
    params(("id" = String, Path, description = "Event ID")),
    request_body = UpdateEventRequest,
    responses(
        (status = 200, description = "Updated event", body = EventResponse),
        (status = 400, description = "Invalid event data"),
        (status = 403, description = "Not the organizer"),
        (status = 404, description = "Event not found")
    ),
    security(("bearer_token" = []))
)]
pub async fn update_event_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateEventRequest>,
) -> Result<Json<EventResponse>, ApiError> {
    let event = load_event(&state, id).await?;
    user.require_event_owner(&event)?;

    let patch = request.into_patch()?;
    let updated = state.db.events().update(id, &patch).await?;

    audit::record(
        &state.db,
        &headers,
        AuditEntry::new(audit::UPDATE_EVENT, Some(user.id()))
            .target("Event", updated.id)
            .details(json!({ "title": updated.title })),
    )
    .await;

    state.hub.event_updated(&updated);

    Ok(Json(EventResponse::from(updated)))
}

/// Delete an event and its registrations (organizer or admin)
///
/// Credits already earned at the event are kept.
#[utoipa::path(
    delete,
    path = "/api/events/{id}",
    tag = "Events",
    params(("id" = String, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event deleted", body = DeleteEventResponse),
        (status = 403, description = "Not the organizer"),
        (status = 404, description = "Event not found")
    ),
    security(("bearer_token" = []))
)]
pub async fn delete_event_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteEventResponse>, ApiError> {
    let event = load_event(&state, id).await?;
    user.require_event_owner(&event)?;

    if !state.db.events().delete(id).await? {
        return Err(ApiError::not_found("Event not found"));
    }

    audit::record(
        &state.db,
        &headers,
        AuditEntry::new(audit::DELETE_EVENT, Some(user.id()))
            .target("Event", event.id)
            .details(json!({ "title": event.title })),
    )
    .await;

    state.hub.event_deleted(&event);

    tracing::info!(event_id = %event.id, "Event deleted");
    Ok(Json(DeleteEventResponse {
        message: "Event deleted successfully".to_string(),
    }))
}

/// Review an event (admin)
#[utoipa::path(
    put,
    path = "/api/events/{id}/status",
    tag = "Events",
    params(("id" = String, Path, description = "Event ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Updated event", body = EventResponse),
        (status = 400, description = "Transition not allowed"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Event not found")
    ),
    security(("bearer_token" = []))
)]
pub async fn update_event_status_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<EventResponse>, ApiError> {
    user.require_admin()?;
    let next: EventStatus = request.status.parse()?;

    let (event, previous) = state.db.events().set_status(id, next).await?;

    audit::record(
        &state.db,
        &headers,
        AuditEntry::new(audit::UPDATE_EVENT_STATUS, Some(user.id()))
            .target("Event", event.id)
            .details(json!({ "from": previous, "status": event.status })),
    )
    .await;

    state.hub.event_status_updated(&event, previous);

    tracing::info!(event_id = %event.id, from = %previous, to = %event.status, "Event reviewed");
    Ok(Json(EventResponse::from(event)))
}

/// Generate the attendance QR for an approved event
///
/// Issuing a new QR revokes any earlier one for the same event.
#[utoipa::path(
    post,
    path = "/api/events/{id}/qr",
    tag = "Attendance",
    params(("id" = String, Path, description = "Event ID")),
    responses(
        (status = 200, description = "QR generated", body = QrResponse),
        (status = 400, description = "Event not approved"),
        (status = 403, description = "Not the organizer"),
        (status = 404, description = "Event not found")
    ),
    security(("bearer_token" = []))
)]
pub async fn generate_qr_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<QrResponse>, ApiError> {
    let event = load_event(&state, id).await?;
    user.require_event_owner(&event)?;
    event.status.ensure_open()?;

    let ttl = Duration::try_seconds(state.config.qr_token_ttl_secs)
        .ok_or_else(|| ApiError::internal("QR lifetime out of range"))?;
    let issued = state.signer.issue(event.id, ttl, Utc::now())?;
    let expires_at = issued
        .claims
        .expires_at_utc()
        .ok_or_else(|| ApiError::internal("QR expiry out of range"))?;

    let token = issued.token.clone();
    let qr_data_url = tokio::task::spawn_blocking(move || render_png_data_url(&token))
        .await
        .map_err(|e| ApiError::internal(format!("QR rendering task failed: {}", e)))??;

    state
        .db
        .events()
        .activate_qr(id, issued.claims.nonce, expires_at)
        .await?;

    audit::record(
        &state.db,
        &headers,
        AuditEntry::new(audit::GENERATE_QR, Some(user.id()))
            .target("Event", event.id)
            .details(json!({ "title": event.title, "expires_at": expires_at })),
    )
    .await;

    tracing::info!(event_id = %event.id, %expires_at, "Attendance QR generated");
    Ok(Json(QrResponse {
        qr_code: issued.token,
        qr_data_url,
        expires_at,
    }))
}

/// Stop accepting attendance for an event
#[utoipa::path(
    delete,
    path = "/api/events/{id}/qr",
    tag = "Attendance",
    params(("id" = String, Path, description = "Event ID")),
    responses(
        (status = 200, description = "QR closed", body = EventResponse),
        (status = 403, description = "Not the organizer"),
        (status = 404, description = "Event not found")
    ),
    security(("bearer_token" = []))
)]
pub async fn close_qr_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<EventResponse>, ApiError> {
    let event = load_event(&state, id).await?;
    user.require_event_owner(&event)?;

    let event = state.db.events().close_qr(id).await?;

    audit::record(
        &state.db,
        &headers,
        AuditEntry::new(audit::CLOSE_QR, Some(user.id())).target("Event", event.id),
    )
    .await;

    Ok(Json(EventResponse::from(event)))
}
