//! Dispatcher: resolves tokens against the registry and runs the handler.
//!
//! Resolution walks the command path, then binds options and positionals
//! against the resolved leaf. Nothing runs until the whole line has been
//! validated, so a handler is either invoked exactly once or not at all.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display};
use std::str::FromStr;

use crate::app::App;

use super::registry::{ArgKind, Arity, CommandNode, Handler, OptionSpec, Registry};
use super::tokenizer::Token;
use super::Flow;

/// Error raised while resolving a line against the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("No command given")]
    Empty,

    #[error("Unknown command '{0}'. Type 'help' for available commands.")]
    UnknownCommand(String),

    #[error("'{command}' needs a subcommand: {}", available.join(", "))]
    MissingSubcommand {
        command: String,
        available: Vec<&'static str>,
    },

    #[error("Unknown option '{option}' for '{command}'")]
    UnknownOption { command: String, option: String },

    #[error("Option '--{option}' requires a value <{value_name}>")]
    MissingOptionValue {
        option: &'static str,
        value_name: &'static str,
    },

    #[error("Option '--{0}' does not take a value")]
    UnexpectedValue(&'static str),

    #[error("Missing argument <{argument}> for '{command}'")]
    MissingArgument {
        command: String,
        argument: &'static str,
    },

    #[error("Unexpected argument '{argument}' for '{command}'")]
    UnexpectedArgument { command: String, argument: String },

    #[error("Invalid value '{value}' for '--{option}': {reason}")]
    InvalidValue {
        option: &'static str,
        value: String,
        reason: String,
    },
}

/// Options and positionals bound for one handler call.
pub struct CommandContext<'r> {
    registry: &'r Registry,
    path: Vec<&'static str>,
    args: BTreeMap<&'static str, String>,
    options: BTreeMap<&'static str, Vec<String>>,
    flags: BTreeSet<&'static str>,
}

impl fmt::Debug for CommandContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandContext")
            .field("path", &self.path)
            .field("args", &self.args)
            .field("options", &self.options)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl<'r> CommandContext<'r> {
    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Space-joined command path, e.g. `sessions list`.
    pub fn command(&self) -> String {
        self.path.join(" ")
    }

    pub fn arg(&self, name: &str) -> Option<&str> {
        self.args.get(name).map(String::as_str)
    }

    pub fn flag(&self, long: &str) -> bool {
        self.flags.contains(long)
    }

    /// Value of a single-valued option.
    pub fn value(&self, long: &str) -> Option<&str> {
        self.options
            .get(long)
            .and_then(|values| values.last())
            .map(String::as_str)
    }

    /// Every value of a repeatable option, in input order.
    pub fn values(&self, long: &str) -> &[String] {
        self.options.get(long).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Parses a single-valued option.
    pub fn parse_value<T>(&self, long: &'static str) -> Result<Option<T>, DispatchError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.value(long)
            .map(|raw| {
                raw.parse::<T>().map_err(|e| DispatchError::InvalidValue {
                    option: long,
                    value: raw.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }
}

/// A fully validated line, ready to run.
pub struct Resolved<'r> {
    handler: Handler,
    context: CommandContext<'r>,
}

impl<'r> Resolved<'r> {
    pub fn context(&self) -> &CommandContext<'r> {
        &self.context
    }

    /// Invokes the handler.
    pub fn invoke(self, app: &mut App) -> anyhow::Result<Flow> {
        tracing::debug!(command = %self.context.command(), "Dispatching");
        (self.handler)(app, &self.context)
    }
}

/// Resolves token lists against a registry.
pub struct Dispatcher<'r> {
    registry: &'r Registry,
}

impl<'r> Dispatcher<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Resolves the command path and binds options and positionals.
    pub fn resolve(&self, tokens: &[Token]) -> Result<Resolved<'r>, DispatchError> {
        let first = tokens.first().ok_or(DispatchError::Empty)?;

        let mut node = self.registry.root();
        let mut path = Vec::new();
        let mut rest = tokens;
        while let Some((token, tail)) = rest.split_first() {
            let child = if token.quoted {
                None
            } else {
                node.find_child(&token.text)
            };
            match child {
                Some(child) => {
                    node = child;
                    path.push(child.name);
                    rest = tail;
                }
                None => break,
            }
        }

        if path.is_empty() {
            return Err(DispatchError::UnknownCommand(first.text.clone()));
        }

        let handler = match node.handler {
            Some(handler) => handler,
            None => {
                return Err(match rest.first() {
                    Some(token) if !token.is_option() => {
                        DispatchError::UnknownCommand(format!("{} {}", path.join(" "), token.text))
                    }
                    _ => DispatchError::MissingSubcommand {
                        command: path.join(" "),
                        available: node.child_names(),
                    },
                });
            }
        };

        let mut context = CommandContext {
            registry: self.registry,
            path,
            args: BTreeMap::new(),
            options: BTreeMap::new(),
            flags: BTreeSet::new(),
        };
        let positionals = bind_options(node, &mut context, rest)?;
        bind_args(node, &mut context, positionals)?;

        Ok(Resolved { handler, context })
    }
}

/// Consumes options, returning the positional tokens in order.
fn bind_options(
    node: &CommandNode,
    context: &mut CommandContext<'_>,
    tokens: &[Token],
) -> Result<Vec<String>, DispatchError> {
    let mut positionals = Vec::new();
    let mut options_done = false;
    let mut iter = tokens.iter().peekable();

    while let Some(token) = iter.next() {
        if options_done || !token.is_option() {
            positionals.push(token.text.clone());
            continue;
        }
        if token.text == "--" {
            options_done = true;
            continue;
        }

        let unknown = || DispatchError::UnknownOption {
            command: context.command(),
            option: token.text.clone(),
        };
        let (spec, inline): (&OptionSpec, Option<&str>) = match token.text.strip_prefix("--") {
            Some(long) => {
                let (name, inline) = match long.split_once('=') {
                    Some((name, value)) => (name, Some(value)),
                    None => (long, None),
                };
                (node.find_long(name).ok_or_else(unknown)?, inline)
            }
            None => {
                let mut chars = token.text[1..].chars();
                let short = chars.next().ok_or_else(unknown)?;
                let attached = chars.as_str();
                let spec = node.find_short(short).ok_or_else(unknown)?;
                (spec, (!attached.is_empty()).then_some(attached))
            }
        };

        if spec.arity == Arity::Flag {
            if inline.is_some() {
                return Err(DispatchError::UnexpectedValue(spec.long));
            }
            context.flags.insert(spec.long);
            continue;
        }

        let value = match inline {
            Some(value) => value.to_string(),
            None => match iter.next_if(|next| !next.is_option()) {
                Some(next) => next.text.clone(),
                None => {
                    return Err(DispatchError::MissingOptionValue {
                        option: spec.long,
                        value_name: spec.value_name,
                    })
                }
            },
        };

        let values = context.options.entry(spec.long).or_default();
        if spec.arity == Arity::Single {
            values.clear();
        }
        values.push(value);
    }

    Ok(positionals)
}

fn bind_args(
    node: &CommandNode,
    context: &mut CommandContext<'_>,
    positionals: Vec<String>,
) -> Result<(), DispatchError> {
    let mut remaining = positionals.into_iter();

    for spec in &node.args {
        let value = match spec.kind {
            ArgKind::Single => remaining.next(),
            ArgKind::Text => {
                let words: Vec<String> = remaining.by_ref().collect();
                (!words.is_empty()).then(|| words.join(" "))
            }
        };
        match value {
            Some(value) => {
                context.args.insert(spec.name, value);
            }
            None if spec.required => {
                return Err(DispatchError::MissingArgument {
                    command: context.command(),
                    argument: spec.name,
                })
            }
            None => {}
        }
    }

    match remaining.next() {
        None => Ok(()),
        Some(extra) if node.args.is_empty() => Err(DispatchError::UnknownCommand(format!(
            "{} {extra}",
            context.command()
        ))),
        Some(extra) => Err(DispatchError::UnexpectedArgument {
            command: context.command(),
            argument: extra,
        }),
    }
}
