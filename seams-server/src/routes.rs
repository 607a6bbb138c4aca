//! Router configuration module
//!
//! Configures all routes, middleware layers, and creates the application router.

use std::{sync::Arc, time::Duration};

use axum::{
    http::{header, HeaderName, Method, StatusCode},
    routing::{get, post, put},
    Router,
};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use seams_core::SeamsError;

use crate::config::Config;
use crate::db::Database;
use crate::handlers::{
    close_qr_handler, coordinator_stats_handler, create_event_handler,
    create_registration_handler, create_user_handler, delete_event_handler, delete_user_handler,
    event_registrations_handler, forgot_password_handler, generate_qr_handler, get_event_handler,
    health, history_handler, list_audit_logs_handler, list_events_handler, list_users_handler,
    login_handler, my_registrations_handler, notification_stream_handler, profile_handler, ready,
    register_handler, reject_registration_handler, reset_password_handler, update_event_handler,
    update_event_status_handler, update_user_handler, verify_attendance_handler,
    verify_email_handler, verify_self_handler,
};
use crate::mailer::LogMailer;
use crate::openapi::ApiDoc;
use crate::state::AppState;

const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
const LAST_EVENT_ID: HeaderName = HeaderName::from_static("last-event-id");

/// Create the application router with in-memory storage and logged mail (for testing)
pub fn create_router_with_config(config: Config) -> Result<Router, SeamsError> {
    let state = AppState::new(config, Database::in_memory(), Arc::new(LogMailer))?;
    Ok(create_router_with_state(state))
}

/// API routes without middleware
fn api_routes() -> Router<AppState> {
    Router::new()
        // Auth
        .route("/api/auth/register", post(register_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/verifyemail/{token}", get(verify_email_handler))
        .route("/api/auth/forgotpassword", post(forgot_password_handler))
        .route("/api/auth/resetpassword/{token}", put(reset_password_handler))
        // Events
        .route(
            "/api/events",
            get(list_events_handler).post(create_event_handler),
        )
        .route("/api/events/coordinator/stats", get(coordinator_stats_handler))
        .route(
            "/api/events/{id}",
            get(get_event_handler)
                .put(update_event_handler)
                .delete(delete_event_handler),
        )
        .route("/api/events/{id}/status", put(update_event_status_handler))
        .route(
            "/api/events/{id}/qr",
            post(generate_qr_handler).delete(close_qr_handler),
        )
        // Registrations and attendance
        .route(
            "/api/registrations",
            get(event_registrations_handler).post(create_registration_handler),
        )
        .route("/api/registrations/my", get(my_registrations_handler))
        .route("/api/registrations/verify", post(verify_attendance_handler))
        .route("/api/registrations/verify-self", post(verify_self_handler))
        .route(
            "/api/registrations/{id}/reject",
            post(reject_registration_handler),
        )
        // Users
        .route(
            "/api/users",
            get(list_users_handler).post(create_user_handler),
        )
        .route("/api/users/profile", get(profile_handler))
        .route("/api/users/history", get(history_handler))
        .route(
            "/api/users/{id}",
            put(update_user_handler).delete(delete_user_handler),
        )
        // Audit and notifications
        .route("/api/audit", get(list_audit_logs_handler))
        .route("/api/notifications/stream", get(notification_stream_handler))
        // Health
        .route("/health", get(health))
        .route("/ready", get(ready))
}

/// Create the application router around prepared state
pub fn create_router_with_state(state: AppState) -> Router {
    let config = state.config.clone();

    // Configure CORS based on allowed_origins
    let cors = match &config.allowed_origins {
        Some(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            tracing::info!("CORS: Restricting to {} origin(s)", origins.len());
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::ACCEPT,
                    header::AUTHORIZATION,
                    LAST_EVENT_ID,
                ])
        }
        _ => {
            tracing::warn!("CORS: Allowing all origins (dev mode)");
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    };

    // Request body limit
    let body_limit = RequestBodyLimitLayer::new(config.body_limit_mb * 1024 * 1024);

    // Request timeout (applies until response headers; SSE bodies stream on)
    let timeout = TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        Duration::from_secs(config.timeout_secs),
    );

    // Base router with common layers
    let router = api_routes()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(cors)
        .layer(body_limit)
        .layer(timeout);

    // Conditionally apply rate limiting (disabled in tests, enabled in production)
    let router = if config.rate_limit_enabled {
        let governor_conf = GovernorConfigBuilder::default()
            .per_second(config.rate_limit_per_sec)
            .burst_size(config.rate_limit_burst)
            .finish();

        match governor_conf {
            Some(governor_conf) => {
                tracing::info!(
                    "Rate limiting: {} req/s (burst: {})",
                    config.rate_limit_per_sec,
                    config.rate_limit_burst
                );
                router.layer(GovernorLayer::new(Arc::new(governor_conf)))
            }
            None => {
                tracing::error!(
                    per_sec = config.rate_limit_per_sec,
                    burst = config.rate_limit_burst,
                    "Invalid rate limit settings, rate limiting DISABLED"
                );
                router
            }
        }
    } else {
        tracing::warn!("Rate limiting: DISABLED");
        router
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(REQUEST_ID))
        .layer(SetRequestIdLayer::new(REQUEST_ID, MakeRequestUuid))
}
