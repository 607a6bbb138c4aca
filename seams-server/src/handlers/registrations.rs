//! Registration and attendance handlers

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{NaiveDate, Utc};
use seams_core::{EventCategory, EventStatus, Role};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::audit::{self, AuditEntry};
use crate::auth::AuthenticatedUser;
use crate::db::{AttendanceCheck, AttendanceOutcome, Registration, RegistrationWithEvent};
use crate::error::ApiError;
use crate::handlers::events::load_event;
use crate::handlers::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRegistrationRequest {
    #[schema(value_type = String)]
    pub event_id: Uuid,
}

/// Event summary inside a student's registration list
#[derive(Debug, Serialize, ToSchema)]
pub struct RegistrationEventSummary {
    #[schema(value_type = String)]
    pub id: Uuid,
    pub title: String,
    #[schema(value_type = String)]
    pub date: NaiveDate,
    pub venue: String,
    pub points: i32,
    #[schema(value_type = String)]
    pub status: EventStatus,
    #[schema(value_type = String)]
    pub category: EventCategory,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MyRegistration {
    #[serde(flatten)]
    pub registration: Registration,
    pub event: RegistrationEventSummary,
}

impl From<RegistrationWithEvent> for MyRegistration {
    fn from(row: RegistrationWithEvent) -> Self {
        Self {
            event: RegistrationEventSummary {
                id: row.registration.event_id,
                title: row.event_title,
                date: row.event_date,
                venue: row.event_venue,
                points: row.event_points,
                status: row.event_status,
                category: row.event_category,
            },
            registration: row.registration,
        }
    }
}

/// Student summary inside an event's registration list
#[derive(Debug, Serialize, ToSchema)]
pub struct RegistrationStudentSummary {
    #[schema(value_type = String)]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub usn: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EventRegistration {
    #[serde(flatten)]
    pub registration: Registration,
    pub student: RegistrationStudentSummary,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EventRegistrationsQuery {
    /// Event to list registrations for
    pub event_id: Option<Uuid>,
}

/// A coordinator scanning on behalf of a student
#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyAttendanceRequest {
    /// Token from the event QR code
    pub qr_token: String,
    #[schema(value_type = String)]
    pub student_id: Uuid,
}

/// A student scanning the event QR
#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifySelfRequest {
    pub qr_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyAttendanceResponse {
    pub message: String,
    /// Student name; set when verified by a coordinator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student: Option<String>,
    /// Points credited by this request (0 when already verified)
    pub credits: i32,
    /// Student's credit total afterwards
    pub total_credits: i64,
    /// False when attendance had already been recorded
    pub newly_verified: bool,
}

impl VerifyAttendanceResponse {
    fn from_outcome(outcome: &AttendanceOutcome, student: Option<String>) -> Self {
        let message = if outcome.newly_verified {
            "Attendance verified successfully"
        } else {
            "Attendance was already verified"
        };
        Self {
            message: message.to_string(),
            student,
            credits: outcome.points_awarded,
            total_credits: outcome.total_credits,
            newly_verified: outcome.newly_verified,
        }
    }
}

/// Register for an approved event (students)
#[utoipa::path(
    post,
    path = "/api/registrations",
    tag = "Registrations",
    request_body = CreateRegistrationRequest,
    responses(
        (status = 201, description = "Registered", body = Registration),
        (status = 400, description = "Event not open, or registration was rejected"),
        (status = 403, description = "Students only"),
        (status = 404, description = "Event not found"),
        (status = 409, description = "Event full or already registered")
    ),
    security(("bearer_token" = []))
)]
pub async fn create_registration_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(request): Json<CreateRegistrationRequest>,
) -> Result<(StatusCode, Json<Registration>), ApiError> {
    user.require_role(Role::Student)?;

    let (registration, event) = state
        .db
        .registrations()
        .register(user.id(), request.event_id)
        .await?;

    audit::record(
        &state.db,
        &headers,
        AuditEntry::new(audit::REGISTER_EVENT, Some(user.id()))
            .target("Registration", registration.id)
            .details(json!({ "event": event.title })),
    )
    .await;

    state.hub.registration_created(&registration, &event);

    tracing::info!(
        registration_id = %registration.id,
        event_id = %event.id,
        registered_count = event.registered_count,
        "Student registered for event"
    );
    Ok((StatusCode::CREATED, Json(registration)))
}

/// The caller's registrations, newest first
#[utoipa::path(
    get,
    path = "/api/registrations/my",
    tag = "Registrations",
    responses(
        (status = 200, description = "Own registrations", body = [MyRegistration]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_token" = []))
)]
pub async fn my_registrations_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<MyRegistration>>, ApiError> {
    let rows = state.db.registrations().list_for_student(user.id()).await?;
    Ok(Json(rows.into_iter().map(MyRegistration::from).collect()))
}

/// Registrations for one event, newest first
#[utoipa::path(
    get,
    path = "/api/registrations",
    tag = "Registrations",
    params(EventRegistrationsQuery),
    responses(
        (status = 200, description = "Event registrations", body = [EventRegistration]),
        (status = 400, description = "event_id missing"),
        (status = 403, description = "Role cannot manage events")
    ),
    security(("bearer_token" = []))
)]
pub async fn event_registrations_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<EventRegistrationsQuery>,
) -> Result<Json<Vec<EventRegistration>>, ApiError> {
    user.require_event_manager()?;
    let event_id = query
        .event_id
        .ok_or_else(|| ApiError::bad_request("event_id is required"))?;

    let rows = state.db.registrations().list_for_event(event_id).await?;
    Ok(Json(
        rows.into_iter()
            .map(|row| EventRegistration {
                student: RegistrationStudentSummary {
                    id: row.registration.student_id,
                    name: row.student_name,
                    email: row.student_email,
                    usn: row.student_usn,
                },
                registration: row.registration,
            })
            .collect(),
    ))
}

/// Record attendance as the given verifier
async fn verify_attendance(
    state: &AppState,
    qr_token: &str,
    student_id: Uuid,
    verified_by: Uuid,
) -> Result<AttendanceOutcome, ApiError> {
    let now = Utc::now();
    let claims = state.signer.verify(qr_token.trim(), now)?;

    let outcome = state
        .db
        .registrations()
        .record_attendance(AttendanceCheck {
            event_id: claims.event_id,
            nonce: claims.nonce,
            student_id,
            verified_by,
            now,
        })
        .await?;

    if outcome.newly_verified {
        state.hub.attendance_verified(
            &outcome.registration,
            &outcome.event,
            outcome.points_awarded,
        );
        tracing::info!(
            registration_id = %outcome.registration.id,
            event_id = %outcome.event.id,
            points = outcome.points_awarded,
            "Attendance verified"
        );
    }
    Ok(outcome)
}

/// Verify a student's attendance from the event QR (coordinators)
#[utoipa::path(
    post,
    path = "/api/registrations/verify",
    tag = "Attendance",
    request_body = VerifyAttendanceRequest,
    responses(
        (status = 200, description = "Attendance recorded", body = VerifyAttendanceResponse),
        (status = 400, description = "QR invalid, inactive, expired or replaced"),
        (status = 403, description = "Role cannot manage events"),
        (status = 404, description = "Student not registered")
    ),
    security(("bearer_token" = []))
)]
pub async fn verify_attendance_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(request): Json<VerifyAttendanceRequest>,
) -> Result<Json<VerifyAttendanceResponse>, ApiError> {
    user.require_event_manager()?;

    let student = state
        .db
        .users()
        .find_by_id(request.student_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Student not found"))?;

    let outcome = verify_attendance(&state, &request.qr_token, student.id, user.id()).await?;

    if outcome.newly_verified {
        audit::record(
            &state.db,
            &headers,
            AuditEntry::new(audit::VERIFY_ATTENDANCE, Some(user.id()))
                .target("Registration", outcome.registration.id)
                .details(json!({
                    "student": student.name,
                    "event": outcome.event.title,
                    "points": outcome.points_awarded,
                })),
        )
        .await;
    }

    Ok(Json(VerifyAttendanceResponse::from_outcome(
        &outcome,
        Some(student.name),
    )))
}

/// Verify one's own attendance by scanning the event QR (students)
#[utoipa::path(
    post,
    path = "/api/registrations/verify-self",
    tag = "Attendance",
    request_body = VerifySelfRequest,
    responses(
        (status = 200, description = "Attendance recorded", body = VerifyAttendanceResponse),
        (status = 400, description = "QR invalid, inactive, expired or replaced"),
        (status = 403, description = "Students only"),
        (status = 404, description = "Not registered for this event")
    ),
    security(("bearer_token" = []))
)]
pub async fn verify_self_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(request): Json<VerifySelfRequest>,
) -> Result<Json<VerifyAttendanceResponse>, ApiError> {
    user.require_role(Role::Student)?;

    let outcome = verify_attendance(&state, &request.qr_token, user.id(), user.id()).await?;

    if outcome.newly_verified {
        audit::record(
            &state.db,
            &headers,
            AuditEntry::new(audit::VERIFY_SELF, Some(user.id()))
                .target("Registration", outcome.registration.id)
                .details(json!({
                    "event": outcome.event.title,
                    "points": outcome.points_awarded,
                })),
        )
        .await;
    }

    Ok(Json(VerifyAttendanceResponse::from_outcome(&outcome, None)))
}

/// Reject a registration and free its seat (organizer or admin)
#[utoipa::path(
    post,
    path = "/api/registrations/{id}/reject",
    tag = "Registrations",
    params(("id" = String, Path, description = "Registration ID")),
    responses(
        (status = 200, description = "Registration rejected", body = Registration),
        (status = 403, description = "Not the organizer"),
        (status = 404, description = "Registration not found"),
        (status = 409, description = "Attendance already verified")
    ),
    security(("bearer_token" = []))
)]
pub async fn reject_registration_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Registration>, ApiError> {
    let registrations = state.db.registrations();
    let registration = registrations
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Registration not found"))?;

    let event = load_event(&state, registration.event_id).await?;
    user.require_event_owner(&event)?;

    let (registration, event) = registrations.reject(id).await?;

    audit::record(
        &state.db,
        &headers,
        AuditEntry::new(audit::REJECT_REGISTRATION, Some(user.id()))
            .target("Registration", registration.id)
            .details(json!({
                "event": event.title,
                "student_id": registration.student_id,
            })),
    )
    .await;

    state.hub.registration_rejected(&registration, &event);

    Ok(Json(registration))
}
