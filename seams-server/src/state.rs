//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use seams_core::AttendanceSigner;

use crate::auth::JwtKeys;
use crate::config::Config;
use crate::db::Database;
use crate::mailer::Mailer;
use crate::notify::NotificationHub;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Storage (PostgreSQL or in-memory)
    pub db: Database,
    /// Session token keys
    pub jwt: Arc<JwtKeys>,
    /// Attendance QR token signer
    pub signer: Arc<AttendanceSigner>,
    /// Outgoing mail (verification and password reset links)
    pub mailer: Arc<dyn Mailer>,
    /// Live notification fan-out
    pub hub: NotificationHub,
    pub config: Arc<Config>,
}

impl AppState {
    /// Build state from configuration around an already-opened database
    pub fn new(
        config: Config,
        db: Database,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, seams_core::SeamsError> {
        let signer = AttendanceSigner::new(config.qr_signing_key.clone())?;
        let jwt = JwtKeys::new(config.jwt_secret.as_bytes(), config.jwt_ttl_days);
        let hub = NotificationHub::new(
            config.notify_replay_capacity,
            config.notify_subscriber_buffer,
        );
        Ok(Self {
            db,
            jwt: Arc::new(jwt),
            signer: Arc::new(signer),
            mailer,
            hub,
            config: Arc::new(config),
        })
    }
}
