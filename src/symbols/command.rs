//! Command Descriptors
//!
//! A [`Command`] is the tree the caller assembles; registration flattens it
//! into [`CommandEntry`] records keyed by full path. Paths join ancestor
//! names with a single space (`serve users create`).

use std::fmt;
use std::sync::Arc;

/// Callback invoked when a parsed command executes. Receives the parser (for
/// option lookups) and the registered entry.
pub type CommandCallback =
    Arc<dyn Fn(&crate::parser::Parser, &CommandEntry) -> Result<(), Box<dyn std::error::Error>>>;

/// User-facing command definition. Subcommands nest recursively.
#[derive(Clone, Default)]
pub struct Command {
    pub name: String,
    pub description: String,
    pub description_key: Option<String>,
    /// Translation key for the command name itself.
    pub name_key: Option<String>,
    pub subcommands: Vec<Command>,
    pub callback: Option<CommandCallback>,
    /// Execute the callback during parsing instead of queueing it.
    pub exec_on_parse: bool,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Command {
            name: name.into(),
            ..Command::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_description_key(mut self, key: impl Into<String>) -> Self {
        self.description_key = Some(key.into());
        self
    }

    pub fn with_name_key(mut self, key: impl Into<String>) -> Self {
        self.name_key = Some(key.into());
        self
    }

    pub fn with_subcommand(mut self, subcommand: Command) -> Self {
        self.subcommands.push(subcommand);
        self
    }

    pub fn with_subcommands(mut self, subcommands: Vec<Command>) -> Self {
        self.subcommands.extend(subcommands);
        self
    }

    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&crate::parser::Parser, &CommandEntry) -> Result<(), Box<dyn std::error::Error>>
            + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    pub fn exec_on_parse(mut self) -> Self {
        self.exec_on_parse = true;
        self
    }

    /// A command with no subcommands is terminal.
    pub fn is_terminal(&self) -> bool {
        self.subcommands.is_empty()
    }

    /// Depth of the subtree rooted at this command (a leaf has depth 1).
    pub fn depth(&self) -> usize {
        1 + self
            .subcommands
            .iter()
            .map(Command::depth)
            .max()
            .unwrap_or(0)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("subcommands", &self.subcommands)
            .field("callback", &self.callback.is_some())
            .field("exec_on_parse", &self.exec_on_parse)
            .finish()
    }
}

/// Registered, flattened form of a command: one entry per path.
#[derive(Clone)]
pub struct CommandEntry {
    pub name: String,
    /// Full space-joined path (`serve users create`).
    pub path: String,
    pub description: String,
    pub description_key: Option<String>,
    pub name_key: Option<String>,
    /// Names of direct subcommands, in declaration order.
    pub children: Vec<String>,
    pub callback: Option<CommandCallback>,
    pub exec_on_parse: bool,
}

impl CommandEntry {
    pub fn is_terminal(&self) -> bool {
        self.children.is_empty()
    }

    /// Path of the parent command, or `None` for a root command.
    pub fn parent_path(&self) -> Option<&str> {
        self.path.rsplit_once(' ').map(|(parent, _)| parent)
    }
}

impl fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandEntry")
            .field("path", &self.path)
            .field("children", &self.children)
            .field("callback", &self.callback.is_some())
            .field("exec_on_parse", &self.exec_on_parse)
            .finish()
    }
}
