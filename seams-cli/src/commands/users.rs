//! list-users command.

use anyhow::{Context, Result};
use colored::Colorize;

use crate::utils::{connect, format_timestamp, parse_role};

pub async fn list(database_url: Option<String>, role: Option<String>) -> Result<()> {
    let role = role.as_deref().map(parse_role).transpose()?;
    let db = connect(database_url).await?;

    let users = db
        .users()
        .list(role)
        .await
        .context("Failed to list accounts")?;

    if users.is_empty() {
        println!("{}", "No accounts found".dimmed());
        return Ok(());
    }

    println!(
        "{:<36}  {:<24}  {:<32}  {:<11}  {:>7}  {}",
        "ID".bold(),
        "NAME".bold(),
        "EMAIL".bold(),
        "ROLE".bold(),
        "CREDITS".bold(),
        "CREATED".bold()
    );
    for user in &users {
        let verified = if user.is_verified {
            String::new()
        } else {
            " (unverified)".yellow().to_string()
        };
        println!(
            "{:<36}  {:<24}  {:<32}  {:<11}  {:>7}  {}{}",
            user.id,
            truncate(&user.name, 24),
            truncate(&user.email, 32),
            user.role.to_string(),
            user.credits,
            format_timestamp(user.created_at),
            verified
        );
    }
    println!();
    println!("{} account(s)", users.len());
    Ok(())
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        value.to_string()
    } else {
        let mut cut: String = value.chars().take(width.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}
