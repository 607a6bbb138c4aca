//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod audit;
pub mod auth;
pub mod events;
pub mod health;
pub mod notifications;
pub mod registrations;
pub mod users;

pub use crate::state::AppState;
pub use audit::{list_audit_logs_handler, AuditQuery};
pub use auth::{
    forgot_password_handler, login_handler, register_handler, reset_password_handler,
    verify_email_handler, ForgotPasswordRequest, LoginRequest, LoginResponse, MessageResponse,
    RegisterRequest, ResetPasswordRequest,
};
pub use events::{
    close_qr_handler, coordinator_stats_handler, create_event_handler, delete_event_handler,
    generate_qr_handler, get_event_handler, list_events_handler, update_event_handler,
    update_event_status_handler, CreateEventRequest, DeleteEventResponse, EventStats,
    ListEventsQuery, Participant, ParticipantStudent, QrResponse, UpdateEventRequest,
    UpdateStatusRequest,
};
pub use health::{health, ready, HealthResponse, ReadyResponse};
pub use notifications::{notification_stream_handler, StreamQuery};
pub use registrations::{
    create_registration_handler, event_registrations_handler, my_registrations_handler,
    reject_registration_handler, verify_attendance_handler, verify_self_handler,
    CreateRegistrationRequest, EventRegistration, MyRegistration, RegistrationEventSummary,
    RegistrationStudentSummary, VerifyAttendanceRequest, VerifyAttendanceResponse,
    VerifySelfRequest,
};
pub use users::{
    create_user_handler, delete_user_handler, history_handler, list_users_handler,
    profile_handler, update_user_handler, CreateUserRequest, DeleteUserResponse, HistoryEntry,
    ListUsersQuery, ProfileResponse, UpdateUserRequest,
};
