//! Common utility functions shared across CLI commands.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use seams_core::Role;
use seams_server::Database;
use tracing::info;

use crate::exit_codes::{classified, USAGE_ERROR};

/// Connect to PostgreSQL and apply pending migrations.
pub async fn connect(database_url: Option<String>) -> Result<Database> {
    let url = database_url.ok_or_else(|| {
        classified(
            USAGE_ERROR,
            "DATABASE_URL is not set (pass --database-url or set the environment variable)",
        )
    })?;

    let db = Database::connect(&url, 2, 1)
        .await
        .context("Failed to open database")?;
    info!("Connected to database");
    Ok(db)
}

/// Parse a role name, reporting the accepted values on failure.
pub fn parse_role(value: &str) -> Result<Role> {
    value.parse::<Role>().map_err(|_| {
        classified(
            USAGE_ERROR,
            format!(
                "Unknown role '{}' (expected student, coordinator, faculty or admin)",
                value
            ),
        )
    })
}

/// Format a timestamp as a human-readable UTC string.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Format Unix seconds, falling back to the raw number when out of range.
pub fn format_unix(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0)
        .map(format_timestamp)
        .unwrap_or_else(|| format!("{}s", secs))
}
