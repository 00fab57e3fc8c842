//! Interactive shell.
//!
//! A single-threaded read-eval-print loop: read a line, tokenize it,
//! resolve it against the command registry, run the handler, print the
//! result. All loop state lives in one `ShellState` value that each
//! iteration takes and returns.
//!
//! # Submodules
//!
//! - `tokenizer` - Splits input lines into tokens
//! - `registry` - Command tree and completion index
//! - `dispatch` - Resolves tokens and invokes handlers
//! - `completion` - Tab completion over the index
//! - `history` - Persistent input history
//! - `editor` - Terminal line editor and piped reader
//! - `commands` - The shell's command table

pub mod commands;
pub mod completion;
pub mod dispatch;
pub mod editor;
pub mod history;
pub mod registry;
pub mod tokenizer;

use anyhow::{Context, Result};
use colored::Colorize;
use std::io::{self, IsTerminal};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::app::App;
use crate::config::Config;

use dispatch::Dispatcher;
use editor::{LineBuffer, LineReader, PipedReader, ReadOutcome, TerminalEditor};
use history::History;
use registry::{CompletionIndex, Registry};

const PROMPT: &str = "shepherd> ";

/// What the loop does after a line has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Everything the shell keeps between iterations.
pub struct ShellState {
    pub history: History,
    registry: Rc<Registry>,
    completions: CompletionIndex,
    /// Partial input while a line is being edited
    pub buffer: LineBuffer,
    interrupted: Arc<AtomicBool>,
}

impl ShellState {
    pub fn new(registry: Rc<Registry>, history: History) -> Self {
        let completions = CompletionIndex::build(&registry);
        Self {
            history,
            registry,
            completions,
            buffer: LineBuffer::default(),
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn completions(&self) -> &CompletionIndex {
        &self.completions
    }

    /// Flag raised by the interrupt handler.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }
}

/// Handles one read outcome.
///
/// Errors are printed and never end the loop; only `exit`, `quit` and end
/// of input do.
pub fn step(mut state: ShellState, outcome: ReadOutcome, app: &mut App) -> (ShellState, Flow) {
    let line = match outcome {
        ReadOutcome::Eof => return (state, Flow::Exit),
        ReadOutcome::Interrupted => return (state, Flow::Continue),
        ReadOutcome::Line(line) => line,
    };
    if tokenizer::normalize(&line).is_empty() {
        return (state, Flow::Continue);
    }

    let registry = Rc::clone(&state.registry);
    let resolved = tokenizer::tokenize(&line)
        .map_err(anyhow::Error::from)
        .and_then(|tokens| {
            Dispatcher::new(&registry)
                .resolve(&tokens)
                .map_err(anyhow::Error::from)
        });

    let flow = match resolved {
        Ok(resolved) => {
            if let Err(e) = state.history.push(&line) {
                tracing::warn!("Failed to record history: {e:#}");
            }
            let result = resolved.invoke(app);
            if state.interrupted.swap(false, Ordering::SeqCst) {
                tracing::debug!("Interrupt ignored while a command was running");
            }
            match result {
                Ok(flow) => flow,
                Err(e) => {
                    report(app, &e);
                    Flow::Continue
                }
            }
        }
        Err(e) => {
            report(app, &e);
            Flow::Continue
        }
    };
    (state, flow)
}

fn report(app: &mut App, error: &anyhow::Error) {
    tracing::debug!("Command failed: {error:?}");
    if let Err(e) = writeln!(app.out(), "{} {error:#}", "Error:".red().bold()) {
        tracing::warn!("Failed to write error: {e}");
    }
}

/// Reads and handles lines until `exit`, `quit` or end of input, then
/// saves history. Returns the final state.
pub fn run_with(
    app: &mut App,
    mut state: ShellState,
    reader: &mut dyn LineReader,
) -> Result<ShellState> {
    loop {
        let outcome = reader
            .read_line(
                PROMPT,
                &mut state.buffer,
                state.history.entries(),
                &state.completions,
            )
            .context("Failed to read input")?;

        let (next, flow) = step(state, outcome, app);
        state = next;
        if let Err(e) = app.out().flush() {
            tracing::warn!("Failed to flush output: {e}");
        }
        if flow == Flow::Exit {
            break;
        }
    }

    if let Err(e) = state.history.save() {
        tracing::warn!("Failed to save history: {e:#}");
    }
    Ok(state)
}

/// Starts the interactive shell on stdin.
pub fn run(app: &mut App) -> Result<()> {
    let history = match Config::history_path()
        .map_err(anyhow::Error::from)
        .and_then(|path| History::load(&path))
    {
        Ok(history) => history,
        Err(e) => {
            tracing::warn!("History disabled: {e:#}");
            History::in_memory()
        }
    };
    let state = ShellState::new(Rc::new(commands::build_registry()), history);

    let flag = state.interrupt_flag();
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        tracing::warn!("Failed to install interrupt handler: {e}");
    }

    if io::stdin().is_terminal() {
        writeln!(
            app.out(),
            "{} {}",
            format!("Shepherd v{}", crate::VERSION).bold(),
            "Type 'help' for commands, 'exit' to quit.".dimmed()
        )?;
        run_with(app, state, &mut TerminalEditor::new())?;
    } else {
        let flag = state.interrupt_flag();
        let mut reader = PipedReader::new(io::stdin().lock()).with_interrupt(flag);
        run_with(app, state, &mut reader)?;
    }
    Ok(())
}
