//! Audit trail helpers
//!
//! Handlers call [`record`] after a mutation succeeds. Recording is
//! best-effort: a failed insert is logged and the request still succeeds.

use axum::http::HeaderMap;
use uuid::Uuid;

use crate::db::{Database, NewAuditLog};

pub const REGISTER_USER: &str = "REGISTER_USER";
pub const VERIFY_EMAIL: &str = "VERIFY_EMAIL";
pub const RESET_PASSWORD: &str = "RESET_PASSWORD";
pub const CREATE_USER: &str = "CREATE_USER";
pub const UPDATE_USER: &str = "UPDATE_USER";
pub const DELETE_USER: &str = "DELETE_USER";
pub const CREATE_EVENT: &str = "CREATE_EVENT";
pub const UPDATE_EVENT: &str = "UPDATE_EVENT";
pub const DELETE_EVENT: &str = "DELETE_EVENT";
pub const UPDATE_EVENT_STATUS: &str = "UPDATE_EVENT_STATUS";
pub const GENERATE_QR: &str = "GENERATE_QR";
pub const CLOSE_QR: &str = "CLOSE_QR";
pub const REGISTER_EVENT: &str = "REGISTER_EVENT";
pub const REJECT_REGISTRATION: &str = "REJECT_REGISTRATION";
pub const VERIFY_ATTENDANCE: &str = "VERIFY_ATTENDANCE";
pub const VERIFY_SELF: &str = "VERIFY_SELF";

/// Client address: first `X-Forwarded-For` hop, then `X-Real-IP`
pub fn client_ip(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    forwarded
        .or_else(real_ip)
        .unwrap_or("unknown")
        .to_string()
}

/// One audit entry about to be written
pub struct AuditEntry {
    action: &'static str,
    performed_by: Option<Uuid>,
    target: Option<(&'static str, String)>,
    details: serde_json::Value,
}

impl AuditEntry {
    pub fn new(action: &'static str, performed_by: Option<Uuid>) -> Self {
        Self {
            action,
            performed_by,
            target: None,
            details: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn target(mut self, target_type: &'static str, id: impl ToString) -> Self {
        self.target = Some((target_type, id.to_string()));
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Write an audit entry, logging instead of failing
pub async fn record(db: &Database, headers: &HeaderMap, entry: AuditEntry) {
    let (target_type, target_id) = match entry.target {
        Some((kind, id)) => (Some(kind), Some(id)),
        None => (None, None),
    };
    let result = db
        .audit()
        .record(NewAuditLog {
            action: entry.action,
            performed_by: entry.performed_by,
            target_id,
            target_type,
            details: entry.details,
            ip_address: Some(client_ip(headers)),
        })
        .await;

    if let Err(e) = result {
        tracing::error!(action = entry.action, error = %e, "Failed to write audit log");
    }
}
