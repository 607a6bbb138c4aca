//! Subcommand implementations.

pub mod admin;
pub mod clear;
pub mod inspect;
pub mod users;
