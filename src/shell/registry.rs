//! Command registry.
//!
//! An immutable tree of command nodes built once at shell start. The
//! dispatcher walks it to resolve input, `help` renders it, and the
//! completion index is precomputed from it.

use std::collections::BTreeMap;

use crate::app::App;

use super::dispatch::CommandContext;
use super::Flow;

/// Function invoked for a resolved leaf command.
pub type Handler = fn(&mut App, &CommandContext<'_>) -> anyhow::Result<Flow>;

/// How many values an option takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// No value; presence only.
    Flag,
    /// One value; given twice, the last wins.
    Single,
    /// One value per occurrence; all are kept in order.
    Repeatable,
}

#[derive(Debug, Clone)]
pub struct OptionSpec {
    pub long: &'static str,
    pub short: Option<char>,
    pub arity: Arity,
    pub value_name: &'static str,
    pub help: &'static str,
}

impl OptionSpec {
    /// `-n, --limit <N>` style label for help output.
    pub fn label(&self) -> String {
        let mut label = match self.short {
            Some(short) => format!("-{short}, --{}", self.long),
            None => format!("    --{}", self.long),
        };
        if self.arity != Arity::Flag {
            label.push_str(&format!(" <{}>", self.value_name));
        }
        label
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// Exactly one token.
    Single,
    /// All remaining positional tokens, joined by single spaces.
    Text,
}

#[derive(Debug, Clone)]
pub struct ArgSpec {
    pub name: &'static str,
    pub required: bool,
    pub kind: ArgKind,
}

/// A node of the command tree. Groups have children; leaves have a handler.
pub struct CommandNode {
    pub name: &'static str,
    pub about: &'static str,
    pub options: Vec<OptionSpec>,
    pub args: Vec<ArgSpec>,
    pub children: Vec<CommandNode>,
    pub handler: Option<Handler>,
}

impl CommandNode {
    pub fn group(name: &'static str, about: &'static str) -> Self {
        Self {
            name,
            about,
            options: Vec::new(),
            args: Vec::new(),
            children: Vec::new(),
            handler: None,
        }
    }

    pub fn leaf(name: &'static str, about: &'static str, handler: Handler) -> Self {
        Self {
            handler: Some(handler),
            ..Self::group(name, about)
        }
    }

    pub fn child(mut self, node: CommandNode) -> Self {
        self.children.push(node);
        self
    }

    pub fn flag(self, long: &'static str, short: Option<char>, help: &'static str) -> Self {
        self.option(long, short, Arity::Flag, "", help)
    }

    pub fn single(
        self,
        long: &'static str,
        short: Option<char>,
        value_name: &'static str,
        help: &'static str,
    ) -> Self {
        self.option(long, short, Arity::Single, value_name, help)
    }

    pub fn repeatable(
        self,
        long: &'static str,
        short: Option<char>,
        value_name: &'static str,
        help: &'static str,
    ) -> Self {
        self.option(long, short, Arity::Repeatable, value_name, help)
    }

    fn option(
        mut self,
        long: &'static str,
        short: Option<char>,
        arity: Arity,
        value_name: &'static str,
        help: &'static str,
    ) -> Self {
        self.options.push(OptionSpec {
            long,
            short,
            arity,
            value_name,
            help,
        });
        self
    }

    /// Adds a positional argument. Positionals bind in declaration order.
    pub fn arg(mut self, name: &'static str, required: bool) -> Self {
        self.args.push(ArgSpec {
            name,
            required,
            kind: ArgKind::Single,
        });
        self
    }

    /// Adds a trailing free-text positional.
    pub fn text_arg(mut self, name: &'static str) -> Self {
        self.args.push(ArgSpec {
            name,
            required: false,
            kind: ArgKind::Text,
        });
        self
    }

    pub fn find_child(&self, name: &str) -> Option<&CommandNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn find_long(&self, long: &str) -> Option<&OptionSpec> {
        self.options.iter().find(|o| o.long == long)
    }

    pub fn find_short(&self, short: char) -> Option<&OptionSpec> {
        self.options.iter().find(|o| o.short == Some(short))
    }

    pub fn is_group(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn child_names(&self) -> Vec<&'static str> {
        self.children.iter().map(|c| c.name).collect()
    }

    /// One-line usage, e.g. `sessions get <id> [--output <FORMAT>]`.
    pub fn usage(&self, path: &str) -> String {
        let mut usage = path.to_string();
        if self.is_group() {
            usage.push_str(" <");
            usage.push_str(&self.child_names().join("|"));
            usage.push('>');
        }
        for arg in &self.args {
            match (arg.kind, arg.required) {
                (ArgKind::Text, _) => usage.push_str(&format!(" [{}...]", arg.name)),
                (ArgKind::Single, true) => usage.push_str(&format!(" <{}>", arg.name)),
                (ArgKind::Single, false) => usage.push_str(&format!(" [{}]", arg.name)),
            }
        }
        for option in &self.options {
            match option.arity {
                Arity::Flag => usage.push_str(&format!(" [--{}]", option.long)),
                Arity::Single => {
                    usage.push_str(&format!(" [--{} <{}>]", option.long, option.value_name))
                }
                Arity::Repeatable => {
                    usage.push_str(&format!(" [--{} <{}>]...", option.long, option.value_name))
                }
            }
        }
        usage
    }
}

/// The root of the command tree.
pub struct Registry {
    root: CommandNode,
}

impl Registry {
    pub fn new(commands: Vec<CommandNode>) -> Self {
        let mut root = CommandNode::group("", "");
        root.children = commands;
        Self { root }
    }

    pub fn root(&self) -> &CommandNode {
        &self.root
    }

    /// Top-level commands in registration order.
    pub fn commands(&self) -> &[CommandNode] {
        &self.root.children
    }

    /// Looks up a node by its full path.
    pub fn find(&self, path: &[&str]) -> Option<&CommandNode> {
        path.iter()
            .try_fold(&self.root, |node, name| node.find_child(name))
    }
}

/// Precomputed completion candidates.
///
/// Keys are space-joined command paths; the root is the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionIndex {
    children: BTreeMap<String, Vec<&'static str>>,
    options: BTreeMap<String, Vec<String>>,
}

impl CompletionIndex {
    pub fn build(registry: &Registry) -> Self {
        let mut index = Self::default();
        index.add(registry.root(), String::new());
        index
    }

    fn add(&mut self, node: &CommandNode, path: String) {
        if node.is_group() {
            let mut names = node.child_names();
            names.sort_unstable();
            self.children.insert(path.clone(), names);
        }
        if !node.options.is_empty() {
            let mut longs: Vec<String> =
                node.options.iter().map(|o| format!("--{}", o.long)).collect();
            longs.sort();
            self.options.insert(path.clone(), longs);
        }
        for child in &node.children {
            let child_path = if path.is_empty() {
                child.name.to_string()
            } else {
                format!("{path} {}", child.name)
            };
            self.add(child, child_path);
        }
    }

    /// Child command names under `path`.
    pub fn children(&self, path: &str) -> &[&'static str] {
        self.children.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `--long` option names of the command at `path`.
    pub fn options(&self, path: &str) -> &[String] {
        self.options.get(path).map(Vec::as_slice).unwrap_or(&[])
    }
}
