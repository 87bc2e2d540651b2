//! argot - A localizable command-line argument parser
//!
//! This library provides a parsing engine for flags, positional arguments
//! and hierarchical subcommands, with translated flag/command names, POSIX
//! short-flag clustering, environment-variable injection, composable value
//! validators, flag dependencies and "did you mean" diagnostics.

pub mod callbacks;
pub mod completion;
pub mod errors;
pub mod i18n;
pub mod parser;
pub mod pipeline;
pub mod secure;
pub mod stream;
pub mod suggestions;
pub mod symbols;

pub use callbacks::{CommandHook, HookOrder};
pub use completion::CompletionData;
pub use errors::ParseError;
pub use i18n::{LangTag, MessageCatalog};
pub use parser::{HelpBehavior, Parser, PositionalArg};
pub use pipeline::convert::{Binding, FromArgValue};
pub use pipeline::validators;
pub use secure::{QueuedReader, SecureReader, TerminalReader};
pub use stream::ArgStream;
pub use symbols::{AcceptedValue, Command, Flag, FlagType};
