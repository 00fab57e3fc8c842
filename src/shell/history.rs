//! Shell history.
//!
//! Submitted lines are kept in memory for Up/Down navigation and appended
//! to the history file as they are committed. At exit the file is
//! rewritten with the most recent `MAX_ENTRIES` lines.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Entries kept when the history file is rewritten.
pub const MAX_ENTRIES: usize = 1000;

#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<String>,
    path: Option<PathBuf>,
}

impl History {
    /// History that is never persisted.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads history from `path`. A missing file means empty history.
    pub fn load(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read history file {}", path.display()))?
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(str::to_string)
                .collect()
        } else {
            Vec::new()
        };

        tracing::debug!("Loaded {} history entries", entries.len());
        Ok(Self {
            entries,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends a committed line in memory and to the history file.
    ///
    /// The in-memory entry is kept even when the file write fails.
    pub fn push(&mut self, line: &str) -> Result<()> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }
        self.entries.push(line.to_string());

        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open history file {}", path.display()))?;
        writeln!(file, "{line}")
            .with_context(|| format!("Failed to write history file {}", path.display()))?;
        Ok(())
    }

    /// Rewrites the history file with the last `MAX_ENTRIES` entries.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let skip = self.entries.len().saturating_sub(MAX_ENTRIES);
        let mut content = self.entries[skip..].join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write history file {}", path.display()))?;
        tracing::debug!("Saved {} history entries", self.entries.len() - skip);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let history = History::load(&dir.path().join("history")).unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn test_push_appends_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("history");

        let mut history = History::load(&path).unwrap();
        history.push("sessions list").unwrap();
        history.push("  ").unwrap();
        history.push("config show").unwrap();

        assert_eq!(history.len(), 2);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "sessions list\nconfig show\n");

        let reloaded = History::load(&path).unwrap();
        assert_eq!(reloaded.entries(), history.entries());
    }

    #[test]
    fn test_save_keeps_most_recent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history");

        let mut history = History::in_memory();
        for i in 0..MAX_ENTRIES + 5 {
            history.push(&format!("version {i}")).unwrap();
        }
        let history = History {
            path: Some(path.clone()),
            ..history
        };
        history.save().unwrap();

        let reloaded = History::load(&path).unwrap();
        assert_eq!(reloaded.len(), MAX_ENTRIES);
        assert_eq!(reloaded.entries()[0], "version 5");
    }

    #[test]
    fn test_in_memory_never_touches_disk() {
        let mut history = History::in_memory();
        history.push("help").unwrap();
        history.save().unwrap();
        assert_eq!(history.entries(), ["help"]);
    }
}
