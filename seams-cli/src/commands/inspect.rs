//! inspect-token command: offline decoding of attendance QR tokens.

use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use seams_core::{decode_unverified, AttendanceClaims, AttendanceSigner, SeamsError};
use seams_server::config::parse_signing_key;

use crate::exit_codes::{classified, TOKEN_INVALID, USAGE_ERROR};
use crate::utils::format_unix;

pub fn execute(token: &str, key: Option<String>) -> Result<()> {
    let claims = decode_unverified(token)
        .map_err(|e| classified(TOKEN_INVALID, format!("Token is malformed: {}", e)))?;
    print_claims(&claims);

    let Some(key) = key else {
        println!();
        println!(
            "   {} {}",
            "Signature:".dimmed(),
            "not checked (pass --key or set QR_SIGNING_KEY)".yellow()
        );
        return Ok(());
    };

    let key = parse_signing_key(&key)
        .ok_or_else(|| classified(USAGE_ERROR, "Signing key is too short"))?;
    let signer = AttendanceSigner::new(key).map_err(|e| classified(USAGE_ERROR, e.to_string()))?;

    println!();
    match signer.verify(token, Utc::now()) {
        Ok(_) => {
            println!("   {} {}", "Signature:".dimmed(), "valid".green().bold());
            println!("   {} {}", "Status:".dimmed(), "not expired".green());
            Ok(())
        }
        Err(SeamsError::QrExpired) => {
            println!("   {} {}", "Signature:".dimmed(), "valid".green());
            println!("   {} {}", "Status:".dimmed(), "EXPIRED".red().bold());
            Err(classified(TOKEN_INVALID, "Token has expired"))
        }
        Err(e) => {
            println!("   {} {}", "Signature:".dimmed(), "INVALID".red().bold());
            Err(classified(TOKEN_INVALID, e.to_string()))
        }
    }
}

fn print_claims(claims: &AttendanceClaims) {
    println!("{}", "Attendance token".bold());
    println!("   {} {}", "Version:".dimmed(), claims.v);
    println!("   {} {}", "Event:".dimmed(), claims.event_id);
    println!("   {} {}", "Nonce:".dimmed(), claims.nonce);
    println!("   {} {}", "Issued:".dimmed(), format_unix(claims.issued_at));
    println!("   {} {}", "Expires:".dimmed(), format_unix(claims.expires_at));
}
