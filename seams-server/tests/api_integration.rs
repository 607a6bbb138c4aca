//! API integration tests for seams-server.
//!
//! These drive the full router over the in-memory store: account
//! lifecycle, event review, registration, the attendance QR flow and the
//! admin surfaces.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{Body, BodyDataStream},
    http::{header, Request, StatusCode},
    Router,
};
use futures_util::StreamExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use seams_core::Role;
use seams_server::{
    auth::hash_password, create_router_with_state, AppState, Config, Database, MailError,
    Mailer, NewUser, OutgoingMail, User,
};

/// Keeps every message so tests can follow the emailed links
#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
}

impl RecordingMailer {
    /// Token at the end of the last link sent to `to`
    fn last_token_for(&self, to: &str) -> String {
        let sent = self.sent.lock().unwrap();
        let mail = sent.iter().rev().find(|m| m.to == to).expect("no mail sent");
        mail.text
            .split_whitespace()
            .find(|word| word.starts_with("http"))
            .and_then(|link| link.rsplit('/').next())
            .expect("no link in mail")
            .to_string()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

/// Rejects everything, as an unreachable relay would
struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _mail: OutgoingMail) -> Result<(), MailError> {
        Err(MailError::Rejected("relay down".to_string()))
    }
}

/// Fails only after outliving a short request timeout
struct StalledMailer;

#[async_trait]
impl Mailer for StalledMailer {
    async fn send(&self, _mail: OutgoingMail) -> Result<(), MailError> {
        tokio::time::sleep(Duration::from_secs(3)).await;
        Err(MailError::Transport("relay timed out".to_string()))
    }
}

struct TestApp {
    state: AppState,
    mailer: Arc<RecordingMailer>,
}

impl TestApp {
    fn new() -> Self {
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::new(Config::default(), Database::in_memory(), mailer.clone())
            .expect("default config is valid");
        Self { state, mailer }
    }

    fn with_mailer(mailer: Arc<dyn Mailer>) -> AppState {
        AppState::new(Config::default(), Database::in_memory(), mailer)
            .expect("default config is valid")
    }

    fn router(&self) -> Router {
        create_router_with_state(self.state.clone())
    }

    /// Insert a verified account directly and return it with a session token
    async fn seed_user(&self, name: &str, role: Role) -> (User, String) {
        let email = format!("{}@college.edu", name.to_lowercase());
        let user = self
            .state
            .db
            .users()
            .create(NewUser {
                name: name.to_string(),
                email,
                password_hash: hash_password("password123").await.unwrap(),
                role,
                usn: None,
                branch: None,
                semester: None,
                department: None,
                phone: None,
                is_verified: true,
                verification_token_hash: None,
                verification_expires_at: None,
            })
            .await
            .unwrap();
        let token = self.state.jwt.issue(&user).unwrap();
        (user, token)
    }

    async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        send(self.router(), method, uri, token, body).await
    }
}

async fn send(
    app: Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

fn event_body(title: &str, points: i32, max: Option<i32>) -> Value {
    json!({
        "title": title,
        "description": "Annual campus event",
        "date": "2026-11-20",
        "time": "09:30",
        "venue": "Main Hall",
        "category": "Technical",
        "points": points,
        "max_participants": max,
    })
}

/// Create an event as an admin (approved immediately) and return its ID
async fn approved_event(app: &TestApp, admin_token: &str, points: i32, max: Option<i32>) -> String {
    let (status, json) = app
        .send("POST", "/api/events", Some(admin_token), Some(event_body("Hackathon", points, max)))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "approved");
    json["id"].as_str().unwrap().to_string()
}

// ============================================================================
// Health & Readiness Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint_reports_memory_backend() {
    let app = TestApp::new();
    let (status, json) = app.send("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "seams-server");
    assert_eq!(json["database"], "memory");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_ready_endpoint_returns_ok() {
    let app = TestApp::new();
    let (status, json) = app.send("GET", "/ready", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = TestApp::new();
    let (status, json) = app.send("GET", "/api-docs/openapi.json", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/api/registrations/verify-self"].is_object());
}

// ============================================================================
// Account Tests
// ============================================================================

#[tokio::test]
async fn test_register_verify_login_flow() {
    let app = TestApp::new();
    let body = json!({
        "name": "Asha Rao",
        "email": "Asha@College.edu",
        "password": "password123",
        "usn": "1XX21CS001",
    });

    let (status, json) = app.send("POST", "/api/auth/register", None, Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["success"], true);

    // Cannot log in before verifying
    let login = json!({ "email": "asha@college.edu", "password": "password123" });
    let (status, json) = app.send("POST", "/api/auth/login", None, Some(login.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "AUTH_EMAIL_NOT_VERIFIED");

    let token = app.mailer.last_token_for("asha@college.edu");
    let (status, _) = app
        .send("GET", &format!("/api/auth/verifyemail/{}", token), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);

    // The link is single-use
    let (status, _) = app
        .send("GET", &format!("/api/auth/verifyemail/{}", token), None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = app.send("POST", "/api/auth/login", None, Some(login)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["role"], "student");
    assert_eq!(json["user"]["email"], "asha@college.edu");
    assert!(json["user"].get("password_hash").is_none());
    assert!(json["token"].is_string());
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let app = TestApp::new();
    app.seed_user("Ravi", Role::Student).await;

    let body = json!({
        "name": "Ravi Again",
        "email": "ravi@college.edu",
        "password": "password123",
    });
    let (status, json) = app.send("POST", "/api/auth/register", None, Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CONFLICT");
}

#[tokio::test]
async fn test_register_rejects_short_password() {
    let app = TestApp::new();
    let body = json!({ "name": "Kim", "email": "kim@college.edu", "password": "short" });
    let (status, _) = app.send("POST", "/api/auth/register", None, Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_mail_failure_removes_account() {
    let state = TestApp::with_mailer(Arc::new(FailingMailer));
    let body = json!({ "name": "Lee", "email": "lee@college.edu", "password": "password123" });

    let (status, _) = send(
        create_router_with_state(state.clone()),
        "POST",
        "/api/auth/register",
        None,
        Some(body),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let user = state.db.users().find_by_email("lee@college.edu").await.unwrap();
    assert!(user.is_none());
}

#[tokio::test]
async fn test_register_slow_mail_never_leaves_account_behind() {
    let config = Config {
        timeout_secs: 2,
        ..Config::default()
    };
    let state = AppState::new(config, Database::in_memory(), Arc::new(StalledMailer)).unwrap();
    let body = json!({ "name": "Lee", "email": "lee@college.edu", "password": "password123" });

    async fn account_gone(state: &AppState) -> bool {
        for _ in 0..100 {
            let user = state.db.users().find_by_email("lee@college.edu").await.unwrap();
            if user.is_none() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    let (status, _) = send(
        create_router_with_state(state.clone()),
        "POST",
        "/api/auth/register",
        None,
        Some(body.clone()),
    )
    .await;
    assert!(
        status == StatusCode::INTERNAL_SERVER_ERROR || status == StatusCode::REQUEST_TIMEOUT,
        "unexpected status {}",
        status
    );
    assert!(account_gone(&state).await);

    // Trying again is not blocked by a leftover account
    let (status, _) = send(
        create_router_with_state(state.clone()),
        "POST",
        "/api/auth/register",
        None,
        Some(body),
    )
    .await;
    assert_ne!(status, StatusCode::CONFLICT);
    assert!(account_gone(&state).await);
}

#[tokio::test]
async fn test_login_wrong_password() {
    let app = TestApp::new();
    app.seed_user("Meera", Role::Student).await;

    let body = json!({ "email": "meera@college.edu", "password": "wrong-password" });
    let (status, json) = app.send("POST", "/api/auth/login", None, Some(body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "AUTH_INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_password_reset_flow() {
    let app = TestApp::new();
    app.seed_user("Nina", Role::Student).await;

    let (status, _) = app
        .send(
            "POST",
            "/api/auth/forgotpassword",
            None,
            Some(json!({ "email": "nina@college.edu" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let token = app.mailer.last_token_for("nina@college.edu");
    let (status, _) = app
        .send(
            "PUT",
            &format!("/api/auth/resetpassword/{}", token),
            None,
            Some(json!({ "password": "brand-new-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let login = json!({ "email": "nina@college.edu", "password": "brand-new-pass" });
    let (status, _) = app.send("POST", "/api/auth/login", None, Some(login)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_forgot_password_unknown_account() {
    let app = TestApp::new();
    let (status, _) = app
        .send(
            "POST",
            "/api/auth/forgotpassword",
            None,
            Some(json!({ "email": "ghost@college.edu" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Event Tests
// ============================================================================

#[tokio::test]
async fn test_coordinator_event_needs_approval() {
    let app = TestApp::new();
    let (_, coordinator) = app.seed_user("Cora", Role::Coordinator).await;
    let (_, admin) = app.seed_user("Ada", Role::Admin).await;

    let (status, json) = app
        .send("POST", "/api/events", Some(&coordinator), Some(event_body("Robotics", 10, None)))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "pending");
    let id = json["id"].as_str().unwrap().to_string();

    // Pending events are hidden from the default listing
    let (_, list) = app.send("GET", "/api/events", None, None).await;
    assert_eq!(list.as_array().unwrap().len(), 0);
    let (_, list) = app.send("GET", "/api/events?show_all=true", None, None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    // Only admins review
    let review = json!({ "status": "approved" });
    let (status, _) = app
        .send("PUT", &format!("/api/events/{}/status", id), Some(&coordinator), Some(review.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = app
        .send("PUT", &format!("/api/events/{}/status", id), Some(&admin), Some(review))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "approved");

    let (_, list) = app.send("GET", "/api/events", None, None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_student_cannot_create_event() {
    let app = TestApp::new();
    let (_, student) = app.seed_user("Sam", Role::Student).await;

    let (status, json) = app
        .send("POST", "/api/events", Some(&student), Some(event_body("Nope", 5, None)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_create_event_requires_auth() {
    let app = TestApp::new();
    let (status, json) = app
        .send("POST", "/api/events", None, Some(event_body("Anon", 5, None)))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "AUTH_MISSING_TOKEN");
}

#[tokio::test]
async fn test_create_event_validates_fields() {
    let app = TestApp::new();
    let (_, admin) = app.seed_user("Ada", Role::Admin).await;

    let mut body = event_body("Bad time", 5, None);
    body["time"] = json!("9.30am");
    let (status, _) = app.send("POST", "/api/events", Some(&admin), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut body = event_body("Bad category", 5, None);
    body["category"] = json!("Gaming");
    let (status, _) = app.send("POST", "/api/events", Some(&admin), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_event_includes_organizer_and_404() {
    let app = TestApp::new();
    let (admin_user, admin) = app.seed_user("Ada", Role::Admin).await;
    let id = approved_event(&app, &admin, 10, None).await;

    let (status, json) = app.send("GET", &format!("/api/events/{}", id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["organizer"]["name"], admin_user.name);

    let missing = uuid::Uuid::new_v4();
    let (status, _) = app.send("GET", &format!("/api/events/{}", missing), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_only_organizer_updates_event() {
    let app = TestApp::new();
    let (_, owner) = app.seed_user("Cora", Role::Coordinator).await;
    let (_, other) = app.seed_user("Finn", Role::Faculty).await;

    let (_, json) = app
        .send("POST", "/api/events", Some(&owner), Some(event_body("Quiz", 5, None)))
        .await;
    let id = json["id"].as_str().unwrap().to_string();

    let patch = json!({ "venue": "Seminar Hall" });
    let (status, _) = app
        .send("PUT", &format!("/api/events/{}", id), Some(&other), Some(patch.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = app
        .send("PUT", &format!("/api/events/{}", id), Some(&owner), Some(patch))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["venue"], "Seminar Hall");
    assert_eq!(json["title"], "Quiz");
}

// ============================================================================
// Registration & Attendance Tests
// ============================================================================

#[tokio::test]
async fn test_registration_and_self_verification_are_idempotent() {
    let app = TestApp::new();
    let (_, admin) = app.seed_user("Ada", Role::Admin).await;
    let (_, student) = app.seed_user("Sam", Role::Student).await;
    let event_id = approved_event(&app, &admin, 15, Some(10)).await;

    let (status, json) = app
        .send("POST", "/api/registrations", Some(&student), Some(json!({ "event_id": event_id })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "registered");

    let (status, json) = app
        .send("POST", "/api/registrations", Some(&student), Some(json!({ "event_id": event_id })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "ALREADY_REGISTERED");

    let (status, qr) = app
        .send("POST", &format!("/api/events/{}/qr", event_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let qr_token = qr["qr_code"].as_str().unwrap().to_string();
    assert!(qr["qr_data_url"].as_str().unwrap().starts_with("data:image/png;base64,"));

    let verify = json!({ "qr_token": qr_token });
    let (status, json) = app
        .send("POST", "/api/registrations/verify-self", Some(&student), Some(verify.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["newly_verified"], true);
    assert_eq!(json["credits"], 15);
    assert_eq!(json["total_credits"], 15);

    // Scanning again awards nothing
    let (status, json) = app
        .send("POST", "/api/registrations/verify-self", Some(&student), Some(verify))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["newly_verified"], false);
    assert_eq!(json["credits"], 0);
    assert_eq!(json["total_credits"], 15);

    let (_, profile) = app.send("GET", "/api/users/profile", Some(&student), None).await;
    assert_eq!(profile["total_credits"], 15);
    assert_eq!(profile["history"][0]["status"], "verified");
    assert_eq!(profile["history"][0]["points_awarded"], 15);

    let (_, mine) = app.send("GET", "/api/registrations/my", Some(&student), None).await;
    assert_eq!(mine[0]["event"]["title"], "Hackathon");
    assert_eq!(mine[0]["status"], "verified");
}

#[tokio::test]
async fn test_regenerated_qr_revokes_previous() {
    let app = TestApp::new();
    let (_, admin) = app.seed_user("Ada", Role::Admin).await;
    let (_, student) = app.seed_user("Sam", Role::Student).await;
    let event_id = approved_event(&app, &admin, 5, None).await;
    app.send("POST", "/api/registrations", Some(&student), Some(json!({ "event_id": event_id })))
        .await;

    let qr_path = format!("/api/events/{}/qr", event_id);
    let (_, first) = app.send("POST", &qr_path, Some(&admin), None).await;
    let (_, _second) = app.send("POST", &qr_path, Some(&admin), None).await;

    let (status, json) = app
        .send(
            "POST",
            "/api/registrations/verify-self",
            Some(&student),
            Some(json!({ "qr_token": first["qr_code"] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "QR_REVOKED");
}

#[tokio::test]
async fn test_closed_qr_is_rejected() {
    let app = TestApp::new();
    let (_, admin) = app.seed_user("Ada", Role::Admin).await;
    let (_, student) = app.seed_user("Sam", Role::Student).await;
    let event_id = approved_event(&app, &admin, 5, None).await;
    app.send("POST", "/api/registrations", Some(&student), Some(json!({ "event_id": event_id })))
        .await;

    let qr_path = format!("/api/events/{}/qr", event_id);
    let (_, qr) = app.send("POST", &qr_path, Some(&admin), None).await;
    let (status, json) = app.send("DELETE", &qr_path, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["qr_active"], false);

    let (status, json) = app
        .send(
            "POST",
            "/api/registrations/verify-self",
            Some(&student),
            Some(json!({ "qr_token": qr["qr_code"] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "QR_INACTIVE");
}

#[tokio::test]
async fn test_tampered_qr_token_is_rejected() {
    let app = TestApp::new();
    let (_, student) = app.seed_user("Sam", Role::Student).await;

    let (status, json) = app
        .send(
            "POST",
            "/api/registrations/verify-self",
            Some(&student),
            Some(json!({ "qr_token": "not-a-real-token" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "QR_MALFORMED");
}

#[tokio::test]
async fn test_unregistered_student_cannot_verify() {
    let app = TestApp::new();
    let (_, admin) = app.seed_user("Ada", Role::Admin).await;
    let (_, student) = app.seed_user("Sam", Role::Student).await;
    let event_id = approved_event(&app, &admin, 5, None).await;

    let (_, qr) = app
        .send("POST", &format!("/api/events/{}/qr", event_id), Some(&admin), None)
        .await;
    let (status, json) = app
        .send(
            "POST",
            "/api/registrations/verify-self",
            Some(&student),
            Some(json!({ "qr_token": qr["qr_code"] })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_REGISTERED");
}

#[tokio::test]
async fn test_coordinator_verifies_on_behalf_of_student() {
    let app = TestApp::new();
    let (_, admin) = app.seed_user("Ada", Role::Admin).await;
    let (_, coordinator) = app.seed_user("Cora", Role::Coordinator).await;
    let (student_user, student) = app.seed_user("Sam", Role::Student).await;
    let event_id = approved_event(&app, &admin, 20, None).await;
    app.send("POST", "/api/registrations", Some(&student), Some(json!({ "event_id": event_id })))
        .await;

    let (_, qr) = app
        .send("POST", &format!("/api/events/{}/qr", event_id), Some(&admin), None)
        .await;
    let body = json!({ "qr_token": qr["qr_code"], "student_id": student_user.id });

    // Students cannot use the coordinator endpoint
    let (status, _) = app
        .send("POST", "/api/registrations/verify", Some(&student), Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = app
        .send("POST", "/api/registrations/verify", Some(&coordinator), Some(body))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["student"], "Sam");
    assert_eq!(json["credits"], 20);
}

#[tokio::test]
async fn test_capacity_is_enforced() {
    let app = TestApp::new();
    let (_, admin) = app.seed_user("Ada", Role::Admin).await;
    let (_, first) = app.seed_user("Sam", Role::Student).await;
    let (_, second) = app.seed_user("Tara", Role::Student).await;
    let event_id = approved_event(&app, &admin, 5, Some(1)).await;

    let body = json!({ "event_id": event_id });
    let (status, _) = app
        .send("POST", "/api/registrations", Some(&first), Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = app
        .send("POST", "/api/registrations", Some(&second), Some(body))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "EVENT_FULL");

    let (_, event) = app.send("GET", &format!("/api/events/{}", event_id), None, None).await;
    assert_eq!(event["registered_count"], 1);
}

#[tokio::test]
async fn test_pending_event_rejects_registration() {
    let app = TestApp::new();
    let (_, coordinator) = app.seed_user("Cora", Role::Coordinator).await;
    let (_, student) = app.seed_user("Sam", Role::Student).await;

    let (_, event) = app
        .send("POST", "/api/events", Some(&coordinator), Some(event_body("Pending", 5, None)))
        .await;
    let (status, json) = app
        .send(
            "POST",
            "/api/registrations",
            Some(&student),
            Some(json!({ "event_id": event["id"] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "EVENT_NOT_OPEN");
}

#[tokio::test]
async fn test_reject_frees_seat_and_blocks_reregistration() {
    let app = TestApp::new();
    let (_, admin) = app.seed_user("Ada", Role::Admin).await;
    let (_, student) = app.seed_user("Sam", Role::Student).await;
    let (_, other) = app.seed_user("Tara", Role::Student).await;
    let event_id = approved_event(&app, &admin, 5, Some(1)).await;

    let body = json!({ "event_id": event_id });
    let (_, registration) = app
        .send("POST", "/api/registrations", Some(&student), Some(body.clone()))
        .await;
    let registration_id = registration["id"].as_str().unwrap();

    let (status, json) = app
        .send(
            "POST",
            &format!("/api/registrations/{}/reject", registration_id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "rejected");

    let (status, json) = app
        .send("POST", "/api/registrations", Some(&student), Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "REGISTRATION_REJECTED");

    // The freed seat goes to someone else
    let (status, _) = app
        .send("POST", "/api/registrations", Some(&other), Some(body))
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_event_registrations_listing() {
    let app = TestApp::new();
    let (_, admin) = app.seed_user("Ada", Role::Admin).await;
    let (_, student) = app.seed_user("Sam", Role::Student).await;
    let event_id = approved_event(&app, &admin, 5, None).await;
    app.send("POST", "/api/registrations", Some(&student), Some(json!({ "event_id": event_id })))
        .await;

    let (status, _) = app.send("GET", "/api/registrations", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = app
        .send("GET", &format!("/api/registrations?event_id={}", event_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["student"]["name"], "Sam");

    let (_, stats) = app.send("GET", "/api/events/coordinator/stats", Some(&admin), None).await;
    assert_eq!(stats[0]["participants"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_credits_survive_event_deletion() {
    let app = TestApp::new();
    let (_, admin) = app.seed_user("Ada", Role::Admin).await;
    let (_, student) = app.seed_user("Sam", Role::Student).await;
    let event_id = approved_event(&app, &admin, 12, None).await;
    app.send("POST", "/api/registrations", Some(&student), Some(json!({ "event_id": event_id })))
        .await;
    let (_, qr) = app
        .send("POST", &format!("/api/events/{}/qr", event_id), Some(&admin), None)
        .await;
    app.send(
        "POST",
        "/api/registrations/verify-self",
        Some(&student),
        Some(json!({ "qr_token": qr["qr_code"] })),
    )
    .await;

    let (status, _) = app
        .send("DELETE", &format!("/api/events/{}", event_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, profile) = app.send("GET", "/api/users/profile", Some(&student), None).await;
    assert_eq!(profile["total_credits"], 12);
    assert_eq!(profile["history"].as_array().unwrap().len(), 0);
}

// ============================================================================
// Admin Tests
// ============================================================================

#[tokio::test]
async fn test_admin_user_management() {
    let app = TestApp::new();
    let (admin_user, admin) = app.seed_user("Ada", Role::Admin).await;
    let (_, student) = app.seed_user("Sam", Role::Student).await;

    let body = json!({
        "name": "Faye",
        "email": "faye@college.edu",
        "password": "password123",
        "role": "faculty",
    });
    let (status, _) = app.send("POST", "/api/users", Some(&student), Some(body.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = app.send("POST", "/api/users", Some(&admin), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["role"], "faculty");
    let id = created["id"].as_str().unwrap().to_string();

    // Admin-created accounts can log in straight away
    let login = json!({ "email": "faye@college.edu", "password": "password123" });
    let (status, _) = app.send("POST", "/api/auth/login", None, Some(login)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, faculty) = app.send("GET", "/api/users?role=faculty", Some(&admin), None).await;
    assert_eq!(faculty.as_array().unwrap().len(), 1);

    let (status, updated) = app
        .send("PUT", &format!("/api/users/{}", id), Some(&admin), Some(json!({ "role": "coordinator" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["role"], "coordinator");

    let (status, _) = app
        .send("DELETE", &format!("/api/users/{}", admin_user.id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send("DELETE", &format!("/api/users/{}", id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send("DELETE", &format!("/api/users/{}", id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_audit_log_records_actions() {
    let app = TestApp::new();
    let (_, admin) = app.seed_user("Ada", Role::Admin).await;
    let (_, student) = app.seed_user("Sam", Role::Student).await;
    approved_event(&app, &admin, 5, None).await;

    let (status, _) = app.send("GET", "/api/audit", Some(&student), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, logs) = app.send("GET", "/api/audit?limit=10", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let entry = &logs[0];
    assert_eq!(entry["action"], "CREATE_EVENT");
    assert_eq!(entry["target_type"], "Event");
    assert_eq!(entry["performed_by"]["name"], "Ada");
    assert_eq!(entry["details"]["title"], "Hackathon");
}

// ============================================================================
// Notification Stream Tests
// ============================================================================

#[tokio::test]
async fn test_notification_stream_requires_auth() {
    let app = TestApp::new();
    let (status, json) = app.send("GET", "/api/notifications/stream", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "AUTH_MISSING_TOKEN");
}

#[tokio::test]
async fn test_notification_stream_accepts_query_token() {
    let app = TestApp::new();
    let (_, student) = app.seed_user("Sam", Role::Student).await;

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .uri(format!("/api/notifications/stream?access_token={}", student))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/event-stream"));
}

/// Open the notification stream and return its body
async fn open_stream(app: &TestApp, token: &str, last_event_id: Option<u64>) -> BodyDataStream {
    let mut builder =
        Request::builder().uri(format!("/api/notifications/stream?access_token={}", token));
    if let Some(id) = last_event_id {
        builder = builder.header("last-event-id", id.to_string());
    }
    let response = app
        .router()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response.into_body().into_data_stream()
}

/// One parsed SSE message
#[derive(Debug, Default)]
struct SseMessage {
    id: Option<String>,
    event: Option<String>,
    data: Value,
}

/// Read until the next complete message, skipping keep-alive comments
async fn next_message(body: &mut BodyDataStream, buffer: &mut String) -> SseMessage {
    loop {
        if let Some(end) = buffer.find("\n\n") {
            let block: String = buffer.drain(..end + 2).collect();
            let mut message = SseMessage::default();
            for line in block.lines() {
                if let Some(v) = line.strip_prefix("id:") {
                    message.id = Some(v.trim().to_string());
                } else if let Some(v) = line.strip_prefix("event:") {
                    message.event = Some(v.trim().to_string());
                } else if let Some(v) = line.strip_prefix("data:") {
                    message.data = serde_json::from_str(v.trim()).unwrap();
                }
            }
            if message.event.is_some() {
                return message;
            }
            continue;
        }
        let chunk = tokio::time::timeout(Duration::from_secs(5), body.next())
            .await
            .expect("no SSE message within 5s")
            .expect("stream ended")
            .unwrap();
        buffer.push_str(std::str::from_utf8(&chunk).unwrap());
    }
}

#[tokio::test]
async fn test_notification_stream_delivers_framed_events() {
    let app = TestApp::new();
    let (_, admin) = app.seed_user("Ada", Role::Admin).await;
    let (_, student) = app.seed_user("Sam", Role::Student).await;

    let mut body = open_stream(&app, &student, None).await;
    let mut buffer = String::new();

    let event_id = approved_event(&app, &admin, 5, None).await;

    let message = next_message(&mut body, &mut buffer).await;
    assert_eq!(message.id.as_deref(), Some("1"));
    assert_eq!(message.event.as_deref(), Some("event_created"));
    assert_eq!(message.data["seq"], 1);
    assert_eq!(message.data["kind"], "event_created");
    assert_eq!(message.data["payload"]["id"], event_id);
    assert_eq!(message.data["payload"]["title"], "Hackathon");
}

#[tokio::test]
async fn test_notification_stream_resumes_after_last_event_id() {
    let app = TestApp::new();
    let (_, admin) = app.seed_user("Ada", Role::Admin).await;
    let (_, student) = app.seed_user("Sam", Role::Student).await;

    approved_event(&app, &admin, 5, None).await;
    let second = approved_event(&app, &admin, 5, None).await;

    let mut body = open_stream(&app, &student, Some(1)).await;
    let mut buffer = String::new();

    let message = next_message(&mut body, &mut buffer).await;
    assert_eq!(message.id.as_deref(), Some("2"));
    assert_eq!(message.data["payload"]["id"], second);
}

#[tokio::test]
async fn test_notification_stream_reports_lost_history() {
    let app = TestApp::new();
    let (_, student) = app.seed_user("Sam", Role::Student).await;

    let mut body = open_stream(&app, &student, Some(40)).await;
    let mut buffer = String::new();

    let message = next_message(&mut body, &mut buffer).await;
    assert_eq!(message.event.as_deref(), Some("resync_required"));
    assert_eq!(message.data["latest_seq"], 0);
}

#[tokio::test]
async fn test_notification_stream_ends_when_hub_closes() {
    let app = TestApp::new();
    let (_, student) = app.seed_user("Sam", Role::Student).await;
    let mut body = open_stream(&app, &student, None).await;

    app.state.hub.close();

    let ended = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(chunk) = body.next().await {
            chunk.unwrap();
        }
    })
    .await;
    assert!(ended.is_ok(), "stream still open after hub closed");
}
