//! Command-line interface for Shepherd.
//!
//! Provides the one-shot commands, their output rendering and the shared
//! output format option.

/// Individual CLI command implementations.
pub mod commands;

/// Output format selection.
pub mod format;

/// Table, JSON and detail rendering.
pub mod render;

pub use format::OutputFormat;
