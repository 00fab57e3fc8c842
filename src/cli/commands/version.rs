//! Version command - print build metadata.

use anyhow::Result;
use colored::Colorize;

use crate::app::App;
use crate::VERSION;

/// Prints name, version and target platform.
pub fn run(app: &mut App) -> Result<()> {
    let out = app.out();
    writeln!(out, "{} {}", "shepherd".bold(), format!("v{VERSION}").cyan())?;
    writeln!(
        out,
        "{}",
        format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH).dimmed()
    )?;
    Ok(())
}
