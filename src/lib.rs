//! Shepherd - inspect AI agent sessions from the terminal
//!
//! Shepherd fetches recorded agent sessions from the AIOBS observability
//! service and lets you list, search, inspect and compare them, either
//! one command at a time or from an interactive shell.

pub mod app;
pub mod cli;
pub mod config;
pub mod provider;
pub mod query;
pub mod session;
pub mod shell;

/// Crate version, as printed by `version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
