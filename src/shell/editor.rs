//! Line input for the shell.
//!
//! `TerminalEditor` is a small raw-mode line editor built on crossterm with
//! history navigation and tab completion. `PipedReader` reads plain lines
//! when stdin is not a terminal.

use colored::Colorize;
use crossterm::{
    cursor::{MoveTo, MoveToColumn},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute, queue,
    terminal::{self, Clear, ClearType},
};
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::completion;
use super::registry::CompletionIndex;

/// Result of reading one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A submitted line, without the trailing newline.
    Line(String),
    /// The user interrupted the line being edited.
    Interrupted,
    /// End of input.
    Eof,
}

/// Source of shell input lines.
pub trait LineReader {
    /// Reads one line. `buffer` holds the partial input while editing;
    /// `history` and `completions` back navigation and tab completion.
    fn read_line(
        &mut self,
        prompt: &str,
        buffer: &mut LineBuffer,
        history: &[String],
        completions: &CompletionIndex,
    ) -> io::Result<ReadOutcome>;
}

/// Editable input line with a character cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineBuffer {
    chars: Vec<char>,
    cursor: usize,
}

impl LineBuffer {
    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    /// Cursor position in characters.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Replaces the content and moves the cursor to the end.
    pub fn set(&mut self, text: &str) {
        self.chars = text.chars().collect();
        self.cursor = self.chars.len();
    }

    pub fn clear(&mut self) {
        self.chars.clear();
        self.cursor = 0;
    }

    pub fn insert(&mut self, c: char) {
        self.chars.insert(self.cursor, c);
        self.cursor += 1;
    }

    /// Deletes the character before the cursor.
    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.chars.remove(self.cursor);
        }
    }

    /// Deletes the character under the cursor.
    pub fn delete(&mut self) {
        if self.cursor < self.chars.len() {
            self.chars.remove(self.cursor);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.chars.len());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.chars.len();
    }

    /// Text before the cursor.
    fn head(&self) -> String {
        self.chars[..self.cursor].iter().collect()
    }

    /// Text from the cursor on.
    fn tail(&self) -> String {
        self.chars[self.cursor..].iter().collect()
    }
}

/// Up/Down navigation over the history entries.
struct HistoryCursor<'h> {
    entries: &'h [String],
    position: usize,
    draft: String,
}

impl<'h> HistoryCursor<'h> {
    fn new(entries: &'h [String]) -> Self {
        Self {
            entries,
            position: entries.len(),
            draft: String::new(),
        }
    }

    fn previous(&mut self, buffer: &mut LineBuffer) {
        if self.position == 0 {
            return;
        }
        if self.position == self.entries.len() {
            self.draft = buffer.text();
        }
        self.position -= 1;
        buffer.set(&self.entries[self.position]);
    }

    fn next(&mut self, buffer: &mut LineBuffer) {
        if self.position >= self.entries.len() {
            return;
        }
        self.position += 1;
        match self.entries.get(self.position) {
            Some(entry) => buffer.set(entry),
            None => buffer.set(&self.draft),
        }
    }
}

/// Disables raw mode when dropped.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            tracing::warn!("Failed to restore terminal mode: {e}");
        }
    }
}

/// Raw-mode line editor for interactive terminals.
pub struct TerminalEditor {
    out: io::Stdout,
}

impl Default for TerminalEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalEditor {
    pub fn new() -> Self {
        Self { out: io::stdout() }
    }

    fn redraw(&mut self, prompt: &str, buffer: &LineBuffer) -> io::Result<()> {
        let column = prompt.chars().count() + buffer.cursor();
        queue!(self.out, MoveToColumn(0), Clear(ClearType::UntilNewLine))?;
        write!(self.out, "{}{}", prompt.cyan().bold(), buffer.text())?;
        queue!(self.out, MoveToColumn(u16::try_from(column).unwrap_or(u16::MAX)))?;
        self.out.flush()
    }

    fn complete(
        &mut self,
        buffer: &mut LineBuffer,
        completions: &CompletionIndex,
    ) -> io::Result<()> {
        let head = buffer.head();
        let tail = buffer.tail();
        let found = completion::complete(completions, &head);

        match completion::apply(&head, &found) {
            Some(completed) => {
                buffer.set(&format!("{completed}{tail}"));
                for _ in tail.chars() {
                    buffer.left();
                }
            }
            None if found.candidates.len() > 1 => {
                write!(self.out, "\r\n{}\r\n", found.candidates.join("  ").dimmed())?;
            }
            None => {}
        }
        Ok(())
    }

    fn handle_key(
        &mut self,
        key: KeyEvent,
        buffer: &mut LineBuffer,
        history: &mut HistoryCursor<'_>,
        completions: &CompletionIndex,
    ) -> io::Result<Option<ReadOutcome>> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => {
                write!(self.out, "^C\r\n")?;
                buffer.clear();
                return Ok(Some(ReadOutcome::Interrupted));
            }
            KeyCode::Char('d') if ctrl => {
                if buffer.is_empty() {
                    write!(self.out, "\r\n")?;
                    return Ok(Some(ReadOutcome::Eof));
                }
                buffer.delete();
            }
            KeyCode::Char('l') if ctrl => {
                execute!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
            }
            KeyCode::Char('a') if ctrl => buffer.home(),
            KeyCode::Char('e') if ctrl => buffer.end(),
            KeyCode::Char('u') if ctrl => buffer.clear(),
            KeyCode::Char(c) if !ctrl && !key.modifiers.contains(KeyModifiers::ALT) => {
                buffer.insert(c)
            }
            KeyCode::Enter => {
                write!(self.out, "\r\n")?;
                let line = buffer.text();
                buffer.clear();
                return Ok(Some(ReadOutcome::Line(line)));
            }
            KeyCode::Backspace => buffer.backspace(),
            KeyCode::Delete => buffer.delete(),
            KeyCode::Left => buffer.left(),
            KeyCode::Right => buffer.right(),
            KeyCode::Home => buffer.home(),
            KeyCode::End => buffer.end(),
            KeyCode::Up => history.previous(buffer),
            KeyCode::Down => history.next(buffer),
            KeyCode::Tab => self.complete(buffer, completions)?,
            _ => {}
        }
        Ok(None)
    }
}

impl LineReader for TerminalEditor {
    fn read_line(
        &mut self,
        prompt: &str,
        buffer: &mut LineBuffer,
        history: &[String],
        completions: &CompletionIndex,
    ) -> io::Result<ReadOutcome> {
        let _raw = RawModeGuard::enable()?;
        let mut history = HistoryCursor::new(history);
        buffer.clear();
        self.redraw(prompt, buffer)?;

        loop {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind == KeyEventKind::Release {
                continue;
            }
            if let Some(outcome) = self.handle_key(key, buffer, &mut history, completions)? {
                self.out.flush()?;
                return Ok(outcome);
            }
            self.redraw(prompt, buffer)?;
        }
    }
}

/// Line reader for piped or redirected input. Prints no prompt.
pub struct PipedReader<R> {
    reader: R,
    interrupted: Option<Arc<AtomicBool>>,
}

impl<R: BufRead> PipedReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            interrupted: None,
        }
    }

    /// Discards a line read while `flag` was raised.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupted = Some(flag);
        self
    }
}

impl<R: BufRead> LineReader for PipedReader<R> {
    fn read_line(
        &mut self,
        _prompt: &str,
        buffer: &mut LineBuffer,
        _history: &[String],
        _completions: &CompletionIndex,
    ) -> io::Result<ReadOutcome> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(ReadOutcome::Eof);
        }
        if let Some(flag) = &self.interrupted {
            if flag.swap(false, Ordering::SeqCst) {
                return Ok(ReadOutcome::Interrupted);
            }
        }

        let line = line.trim_end_matches(['\n', '\r']);
        buffer.set(line);
        let text = buffer.text();
        buffer.clear();
        Ok(ReadOutcome::Line(text))
    }
}
