//! OpenAPI documentation configuration
//!
//! Generates the OpenAPI 3 document for the SEAMS API.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::db::{
    AuditLogResponse, EventResponse, OrganizerSummary, PerformerSummary, Registration,
    UserResponse,
};
use crate::handlers::{
    CreateEventRequest, CreateRegistrationRequest, CreateUserRequest, DeleteEventResponse,
    DeleteUserResponse, EventRegistration, EventStats, ForgotPasswordRequest, HealthResponse,
    HistoryEntry, LoginRequest, LoginResponse, MessageResponse, MyRegistration, Participant,
    ParticipantStudent, ProfileResponse, QrResponse, ReadyResponse, RegisterRequest,
    RegistrationEventSummary, RegistrationStudentSummary, ResetPasswordRequest,
    UpdateEventRequest, UpdateStatusRequest, UpdateUserRequest, VerifyAttendanceRequest,
    VerifyAttendanceResponse, VerifySelfRequest,
};

/// Registers the Bearer session token scheme
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_token",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// SEAMS API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "SEAMS - Student Engagement & Activity Management System",
        version = "0.1.0",
        description = r#"
## Campus events, registrations and attendance credits

- Students browse approved events, register, and scan the event QR code to record attendance
- Coordinators and faculty create events and run attendance
- Admins review events, manage accounts and read the audit trail

### Attendance

An event QR code carries a signed, time-boxed token. Generating a new QR
revokes the previous one. Each registration earns credit at most once;
repeating a scan reports `newly_verified: false`.

### Live updates

`GET /api/notifications/stream` is a Server-Sent Events stream. Reconnect
with `Last-Event-ID` to receive what was missed.
"#,
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:5000", description = "Local development server")
    ),
    tags(
        (name = "Auth", description = "Registration, login, email verification and password reset"),
        (name = "Events", description = "Event browsing, management and review"),
        (name = "Registrations", description = "Event sign-ups"),
        (name = "Attendance", description = "QR generation and attendance verification"),
        (name = "Users", description = "Accounts, profiles and history"),
        (name = "Audit", description = "Audit trail"),
        (name = "Notifications", description = "Live notification stream"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::handlers::auth::register_handler,
        crate::handlers::auth::login_handler,
        crate::handlers::auth::verify_email_handler,
        crate::handlers::auth::forgot_password_handler,
        crate::handlers::auth::reset_password_handler,
        crate::handlers::events::list_events_handler,
        crate::handlers::events::create_event_handler,
        crate::handlers::events::coordinator_stats_handler,
        crate::handlers::events::get_event_handler,
        crate::handlers::events::update_event_handler,
        crate::handlers::events::delete_event_handler,
        crate::handlers::events::update_event_status_handler,
        crate::handlers::events::generate_qr_handler,
        crate::handlers::events::close_qr_handler,
        crate::handlers::registrations::create_registration_handler,
        crate::handlers::registrations::my_registrations_handler,
        crate::handlers::registrations::event_registrations_handler,
        crate::handlers::registrations::verify_attendance_handler,
        crate::handlers::registrations::verify_self_handler,
        crate::handlers::registrations::reject_registration_handler,
        crate::handlers::users::list_users_handler,
        crate::handlers::users::create_user_handler,
        crate::handlers::users::update_user_handler,
        crate::handlers::users::delete_user_handler,
        crate::handlers::users::profile_handler,
        crate::handlers::users::history_handler,
        crate::handlers::audit::list_audit_logs_handler,
        crate::handlers::notifications::notification_stream_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ReadyResponse,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            MessageResponse,
            ForgotPasswordRequest,
            ResetPasswordRequest,
            UserResponse,
            EventResponse,
            OrganizerSummary,
            CreateEventRequest,
            UpdateEventRequest,
            UpdateStatusRequest,
            DeleteEventResponse,
            QrResponse,
            EventStats,
            Participant,
            ParticipantStudent,
            Registration,
            CreateRegistrationRequest,
            MyRegistration,
            RegistrationEventSummary,
            EventRegistration,
            RegistrationStudentSummary,
            VerifyAttendanceRequest,
            VerifySelfRequest,
            VerifyAttendanceResponse,
            CreateUserRequest,
            UpdateUserRequest,
            DeleteUserResponse,
            ProfileResponse,
            HistoryEntry,
            AuditLogResponse,
            PerformerSummary,
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;
