//! SEAMS CLI - operator tooling for the campus event system.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Usage error (e.g. clear without --yes)
  65  Attendance token invalid, tampered or expired
  69  Database unavailable";

#[derive(Parser)]
#[command(name = "seams")]
#[command(author, version, about = "Operator tools for the SEAMS campus event system", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,

    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a verified admin account, or promote an existing one
    CreateAdmin {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        /// At least 8 characters
        #[arg(long)]
        password: String,
    },

    /// Change the role of an existing account
    Promote {
        #[arg(long)]
        email: String,

        /// student, coordinator, faculty or admin
        #[arg(long)]
        role: String,
    },

    /// List accounts with their credit totals
    ListUsers {
        /// Only accounts with this role
        #[arg(long)]
        role: Option<String>,
    },

    /// Delete all data, audit log included
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Decode an attendance QR token, verifying it when a key is available
    InspectToken {
        /// Token as encoded in the QR code
        #[arg(value_name = "TOKEN")]
        token: String,

        /// Signing key (hex or passphrase)
        #[arg(long, env = "QR_SIGNING_KEY", hide_env_values = true)]
        key: Option<String>,
    },
}

async fn run(cli: Cli) -> Result<()> {
    let database_url = cli.database_url;
    match cli.command {
        Commands::CreateAdmin {
            name,
            email,
            password,
        } => commands::admin::create_admin(database_url, name, email, password).await,
        Commands::Promote { email, role } => {
            commands::admin::promote(database_url, email, role).await
        }
        Commands::ListUsers { role } => commands::users::list(database_url, role).await,
        Commands::Clear { yes } => commands::clear::execute(database_url, yes).await,
        Commands::InspectToken { token, key } => commands::inspect::execute(&token, key),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let exit = match run(cli).await {
        Ok(()) => ExitCode::success(),
        Err(e) => ExitCode::from_anyhow(&e),
    };

    if let Some(message) = &exit.message {
        eprintln!("{} {}", "error:".red().bold(), message);
    }
    std::process::exit(exit.code);
}
