//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.

use std::net::SocketAddr;
use std::str::FromStr;

use rand::RngCore;
use seams_core::MIN_KEY_LEN;

/// Longest accepted session lifetime
pub const MAX_JWT_TTL_DAYS: i64 = 365;
/// Longest accepted attendance QR lifetime (one week)
pub const MAX_QR_TOKEN_TTL_SECS: i64 = 7 * 86_400;

/// Server configuration loaded from environment variables
#[derive(Clone)]
pub struct Config {
    /// Server port (default: 5000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: [u8; 4],
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in MB (default: 10)
    pub body_limit_mb: usize,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Enable rate limiting (default: false for tests, true when loaded from env)
    pub rate_limit_enabled: bool,
    /// Rate limit: requests per second (default: 10)
    pub rate_limit_per_sec: u64,
    /// Rate limit: burst size (default: 20)
    pub rate_limit_burst: u32,
    /// PostgreSQL connection string; in-memory storage when unset
    pub database_url: Option<String>,
    /// Database connection pool maximum connections (default: 20)
    pub database_max_connections: u32,
    /// Database connection pool minimum connections (default: 2)
    pub database_min_connections: u32,
    /// HS256 secret for session tokens
    pub jwt_secret: String,
    /// Session token lifetime in days (default: 30)
    pub jwt_ttl_days: i64,
    /// Key for attendance QR token tags (at least 32 bytes)
    pub qr_signing_key: Vec<u8>,
    /// Attendance QR lifetime in seconds (default: 3600)
    pub qr_token_ttl_secs: i64,
    /// Base URL of the web client, used in emailed links
    pub frontend_url: String,
    /// HTTP mail relay endpoint; mail is only logged when unset
    pub mail_relay_url: Option<String>,
    /// Bearer token for the mail relay
    pub mail_relay_token: Option<String>,
    /// Sender address for outgoing mail
    pub mail_from: String,
    /// Notifications retained for replay on reconnect (default: 1024)
    pub notify_replay_capacity: usize,
    /// Per-subscriber queue length before the subscriber is dropped (default: 64)
    pub notify_subscriber_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            host: [127, 0, 0, 1],
            allowed_origins: None, // None = allow all (dev mode)
            body_limit_mb: 10,
            timeout_secs: 30,
            rate_limit_enabled: false, // Disabled by default (for tests)
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
            database_url: None,
            database_max_connections: 20,
            database_min_connections: 2,
            jwt_secret: random_secret_hex(),
            jwt_ttl_days: 30,
            qr_signing_key: seams_core::AttendanceSigner::generate_key(),
            qr_token_ttl_secs: 3600,
            frontend_url: "http://localhost:5173".to_string(),
            mail_relay_url: None,
            mail_relay_token: None,
            mail_from: "SEAMS <no-reply@seams.local>".to_string(),
            notify_replay_capacity: 1024,
            notify_subscriber_buffer: 64,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("HOST")
            .ok()
            .map(|h| {
                if h == "0.0.0.0" {
                    [0, 0, 0, 0]
                } else {
                    [127, 0, 0, 1]
                }
            })
            .unwrap_or([127, 0, 0, 1]);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS").ok().map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        // Rate limiting enabled by default in production, can be disabled with RATE_LIMIT_ENABLED=false
        let rate_limit_enabled = std::env::var("RATE_LIMIT_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        let database_url = non_empty_var("DATABASE_URL");

        let jwt_secret = non_empty_var("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set, using a random secret; sessions end on restart");
            defaults.jwt_secret.clone()
        });

        let qr_signing_key = match non_empty_var("QR_SIGNING_KEY").map(|v| parse_signing_key(&v)) {
            Some(Some(key)) => key,
            Some(None) => {
                tracing::warn!(
                    min_bytes = MIN_KEY_LEN,
                    "QR_SIGNING_KEY too short, using a random key"
                );
                defaults.qr_signing_key.clone()
            }
            None => {
                tracing::warn!("QR_SIGNING_KEY not set, using a random key; QR codes end on restart");
                defaults.qr_signing_key.clone()
            }
        };

        let frontend_url = non_empty_var("FRONTEND_URL")
            .filter(|u| {
                let valid = url::Url::parse(u).is_ok();
                if !valid {
                    tracing::warn!(frontend_url = %u, "FRONTEND_URL is not a valid URL, ignoring");
                }
                valid
            })
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or(defaults.frontend_url);

        let mail_relay_url = non_empty_var("MAIL_RELAY_URL").filter(|u| {
            let valid = url::Url::parse(u).is_ok();
            if !valid {
                tracing::warn!(mail_relay_url = %u, "MAIL_RELAY_URL is not a valid URL, ignoring");
            }
            valid
        });

        Self {
            port: env_or("PORT", defaults.port),
            host,
            allowed_origins,
            body_limit_mb: env_or("BODY_LIMIT_MB", defaults.body_limit_mb),
            timeout_secs: env_or("REQUEST_TIMEOUT_SECS", defaults.timeout_secs),
            rate_limit_enabled,
            rate_limit_per_sec: env_or("RATE_LIMIT_PER_SEC", defaults.rate_limit_per_sec),
            rate_limit_burst: env_or("RATE_LIMIT_BURST", defaults.rate_limit_burst),
            database_url,
            database_max_connections: env_or(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            ),
            database_min_connections: env_or(
                "DATABASE_MIN_CONNECTIONS",
                defaults.database_min_connections,
            ),
            jwt_secret,
            jwt_ttl_days: env_or("JWT_TTL_DAYS", defaults.jwt_ttl_days)
                .clamp(1, MAX_JWT_TTL_DAYS),
            qr_signing_key,
            qr_token_ttl_secs: env_or("QR_TOKEN_TTL_SECS", defaults.qr_token_ttl_secs)
                .clamp(60, MAX_QR_TOKEN_TTL_SECS),
            frontend_url,
            mail_relay_url,
            mail_relay_token: non_empty_var("MAIL_RELAY_TOKEN"),
            mail_from: non_empty_var("MAIL_FROM").unwrap_or(defaults.mail_from),
            notify_replay_capacity: env_or(
                "NOTIFY_REPLAY_CAPACITY",
                defaults.notify_replay_capacity,
            )
            .max(1),
            notify_subscriber_buffer: env_or(
                "NOTIFY_SUBSCRIBER_BUFFER",
                defaults.notify_subscriber_buffer,
            )
            .max(1),
        }
    }

    /// Time allowed for sending one account email, retries included.
    /// Always below the request timeout.
    pub fn mail_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_secs.saturating_mul(500).max(100))
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("addr", &self.socket_addr())
            .field("allowed_origins", &self.allowed_origins)
            .field("rate_limit_enabled", &self.rate_limit_enabled)
            .field("database", &self.database_url.as_ref().map(|_| "postgres"))
            .field("jwt_ttl_days", &self.jwt_ttl_days)
            .field("qr_token_ttl_secs", &self.qr_token_ttl_secs)
            .field("frontend_url", &self.frontend_url)
            .field("mail_relay", &self.mail_relay_url.is_some())
            .field("notify_replay_capacity", &self.notify_replay_capacity)
            .field("notify_subscriber_buffer", &self.notify_subscriber_buffer)
            .finish_non_exhaustive()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn random_secret_hex() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Interpret a configured signing key.
///
/// Hex strings are decoded; anything else is used as raw UTF-8 bytes.
/// Returns `None` when the resulting key is too short.
pub fn parse_signing_key(value: &str) -> Option<Vec<u8>> {
    let key = match hex::decode(value) {
        Ok(bytes) => bytes,
        Err(_) => value.as_bytes().to_vec(),
    };
    (key.len() >= MIN_KEY_LEN).then_some(key)
}
