//! SEAMS Server Library - REST API for campus event management and attendance credits
//!
//! This library exposes the server components for use in integration tests
//! and the admin CLI. The main binary uses these same components.

pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod notify;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod validation;

pub use auth::{AuthenticatedUser, JwtKeys, SessionClaims, StreamUser};
pub use config::Config;
pub use db::{
    AuditLog, AuditRepository, CreditRepository, Database, Event, EventRepository, NewUser,
    Registration, RegistrationRepository, StoreError, User, UserRepository, UserResponse,
    UserUpdate,
};
pub use error::ApiError;
pub use mailer::{LogMailer, MailError, Mailer, OutgoingMail};
pub use notify::{Frame, Notification, NotificationHub, NotificationKind, Room, Subscription};
pub use openapi::ApiDoc;
pub use routes::{create_router_with_config, create_router_with_state};
pub use state::AppState;
