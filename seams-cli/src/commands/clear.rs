//! clear command: wipe every table.

use anyhow::{Context, Result};
use colored::Colorize;

use crate::exit_codes::{classified, USAGE_ERROR};
use crate::utils::connect;

pub async fn execute(database_url: Option<String>, yes: bool) -> Result<()> {
    if !yes {
        return Err(classified(
            USAGE_ERROR,
            "Refusing to delete all data without --yes",
        ));
    }

    let db = connect(database_url).await?;
    db.clear_all().await.context("Failed to clear database")?;

    println!(
        "{} All users, events, registrations, credits and audit entries deleted",
        "✓".green().bold()
    );
    Ok(())
}
