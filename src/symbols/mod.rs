//! Symbol model
//!
//! Flag and command descriptors plus the insertion-ordered registries that
//! hold them during parsing.

pub mod command;
pub mod flag;
pub mod registry;

pub use command::{Command, CommandCallback, CommandEntry};
pub use flag::{AcceptedValue, Flag, FlagType, SecurePrompt};
pub use registry::{flag_key, CommandRegistry, FlagRegistry};
