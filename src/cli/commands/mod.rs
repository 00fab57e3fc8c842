//! CLI commands for Shepherd.
//!
//! Each submodule implements one command group with its argument parsing
//! and execution logic. The shell calls the same functions.

/// AIOBS sessions, whatever the default provider.
pub mod aiobs;

/// Configuration viewing and management.
pub mod config;

/// Langfuse traces and sessions, whatever the default provider.
pub mod langfuse;

/// Sessions from the default provider.
pub mod sessions;

/// Traces from the default provider.
pub mod traces;

/// Print build metadata.
pub mod version;
