//! Account bootstrap commands: create-admin and promote.

use anyhow::{Context, Result};
use colored::Colorize;
use seams_core::Role;
use seams_server::audit;
use seams_server::auth::hash_password;
use seams_server::db::NewAuditLog;
use seams_server::validation::{normalize_email, require_text, validate_password};
use seams_server::{Database, NewUser, User, UserUpdate};
use serde_json::json;
use tracing::info;

use crate::exit_codes::{classified, USAGE_ERROR};
use crate::utils::{connect, parse_role};

/// Record an operator action; failures are logged, not fatal.
async fn record(db: &Database, action: &'static str, user: &User, details: serde_json::Value) {
    let entry = NewAuditLog {
        action,
        performed_by: None,
        target_id: Some(user.id.to_string()),
        target_type: Some("User"),
        details,
        ip_address: Some("cli".to_string()),
    };
    if let Err(e) = db.audit().record(entry).await {
        tracing::warn!(error = %e, action, "Failed to write audit log");
    }
}

/// Create a verified admin, or promote the account that already owns the email.
pub async fn create_admin(
    database_url: Option<String>,
    name: String,
    email: String,
    password: String,
) -> Result<()> {
    let name = require_text("name", &name).map_err(|e| classified(USAGE_ERROR, e.to_string()))?;
    let email = normalize_email(&email).map_err(|e| classified(USAGE_ERROR, e.to_string()))?;
    validate_password(&password).map_err(|e| classified(USAGE_ERROR, e.to_string()))?;

    let db = connect(database_url).await?;
    let users = db.users();

    if let Some(existing) = users
        .find_by_email(&email)
        .await
        .context("Failed to look up account")?
    {
        let user = promote_user(&db, &existing, Role::Admin).await?;
        if !user.is_verified {
            users
                .mark_verified(user.id)
                .await
                .context("Failed to mark account verified")?;
        }
        println!(
            "{} {} <{}> is now an admin (existing account, password unchanged)",
            "✓".green().bold(),
            user.name,
            user.email
        );
        return Ok(());
    }

    let password_hash = hash_password(&password)
        .await
        .context("Failed to hash password")?;
    let user = users
        .create(NewUser {
            name,
            email,
            password_hash,
            role: Role::Admin,
            is_verified: true,
            ..NewUser::default()
        })
        .await
        .context("Failed to create admin account")?;

    record(&db, audit::CREATE_USER, &user, json!({ "email": user.email, "role": user.role })).await;
    info!(user_id = %user.id, "Admin account created");

    println!(
        "{} Created admin {} <{}>",
        "✓".green().bold(),
        user.name,
        user.email
    );
    println!("   {} {}", "ID:".dimmed(), user.id);
    Ok(())
}

/// Change an existing account's role.
pub async fn promote(database_url: Option<String>, email: String, role: String) -> Result<()> {
    let role = parse_role(&role)?;
    let email = normalize_email(&email).map_err(|e| classified(USAGE_ERROR, e.to_string()))?;

    let db = connect(database_url).await?;
    let user = db
        .users()
        .find_by_email(&email)
        .await
        .context("Failed to look up account")?
        .ok_or_else(|| anyhow::anyhow!("No account with email {}", email))?;

    let previous = user.role;
    let user = promote_user(&db, &user, role).await?;

    println!(
        "{} {} <{}>: {} → {}",
        "✓".green().bold(),
        user.name,
        user.email,
        previous.to_string().dimmed(),
        user.role.to_string().bold()
    );
    Ok(())
}

async fn promote_user(db: &Database, user: &User, role: Role) -> Result<User> {
    if user.role == role {
        return Ok(user.clone());
    }

    let updated = db
        .users()
        .update(
            user.id,
            UserUpdate {
                role: Some(role),
                ..UserUpdate::default()
            },
        )
        .await
        .context("Failed to update role")?
        .ok_or_else(|| anyhow::anyhow!("Account {} disappeared during update", user.id))?;

    record(
        db,
        audit::UPDATE_USER,
        &updated,
        json!({ "fields": ["role"], "from": user.role, "to": updated.role }),
    )
    .await;
    info!(user_id = %updated.id, from = %user.role, to = %updated.role, "Role changed");
    Ok(updated)
}
