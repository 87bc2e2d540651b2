//! Parse Errors
//!
//! Every diagnostic the parser can produce is a variant of [`ParseError`].
//! Errors are translatable values: a variant carries its raw arguments and is
//! rendered against the active language only at display time, so a language
//! switch after parsing still yields localized output.
//!
//! Errors are collected, not raised: `Parser::parse` accumulates them and the
//! caller retrieves the list afterwards.

use std::fmt;

use thiserror::Error;

use crate::i18n::{LangTag, MessageCatalog};

/// All diagnostic kinds. Variants map 1:1 onto `argot.msg.*` catalog keys.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    UnknownFlag {
        name: String,
        suggestions: Option<String>,
    },
    UnknownCommand {
        name: String,
        suggestions: Option<String>,
    },
    CommandExpectsSubcommand {
        path: String,
    },
    FlagExpectsValue {
        name: String,
    },
    InvalidArgument {
        name: String,
        value: String,
        accepted: String,
    },
    /// Wrapper around a validator or filter failure for a specific flag.
    ProcessingFlag {
        name: String,
        cause: Box<ParseError>,
    },
    RequiredFlagMissing {
        name: String,
    },
    RequiredPositionalMissing {
        name: String,
        position: usize,
    },
    /// A `RequiredIf` predicate fired; the message comes from the predicate.
    RequiredIf {
        name: String,
        message: String,
    },
    DependencyNotFound {
        name: String,
        depends_on: String,
    },
    DependencyValueNotSpecified {
        name: String,
        depends_on: String,
        allowed: String,
    },
    CircularDependency {
        cycle: String,
    },
    RecursionDepthExceeded {
        path: String,
        max_depth: usize,
    },
    DependencyDepthExceeded {
        name: String,
        max_depth: usize,
    },
    ShortFlagConflict {
        short: String,
        new_flag: String,
        existing_flag: String,
    },
    FlagAlreadyExists {
        key: String,
    },
    SecureFlagExpectsValue {
        name: String,
    },
    NotFoundPath {
        path: String,
    },
    NotFilePath {
        path: String,
    },
    FileOperation {
        path: String,
        message: String,
    },
    InvalidListDelimiter,
    EmptyArgumentPrefixList,
    EmptyFlagName,
    EmptyCommandName,
    /// Malformed validator DSL. Fatal at construction time.
    InvalidValidator {
        spec: String,
        message: String,
    },
    CommandCallback {
        path: String,
        message: String,
    },
    IndexOutOfBounds {
        key: String,
        index: usize,
        capacity: usize,
    },
    ConversionFailed {
        value: String,
        target: &'static str,
    },
    /// Generic validator failure carrying its own catalog key.
    Validation {
        key: &'static str,
        args: Vec<String>,
    },
}

impl ParseError {
    /// The message-catalog key this error renders through.
    pub fn message_key(&self) -> &'static str {
        match self {
            ParseError::UnknownFlag { suggestions: None, .. } => "argot.msg.unknown_flag",
            ParseError::UnknownFlag { suggestions: Some(_), .. } => {
                "argot.msg.unknown_flag_with_suggestions"
            }
            ParseError::UnknownCommand { suggestions: None, .. } => "argot.msg.unknown_command",
            ParseError::UnknownCommand { suggestions: Some(_), .. } => {
                "argot.msg.unknown_command_with_suggestions"
            }
            ParseError::CommandExpectsSubcommand { .. } => "argot.msg.command_expects_subcommand",
            ParseError::FlagExpectsValue { .. } => "argot.msg.flag_expects_value",
            ParseError::InvalidArgument { .. } => "argot.msg.invalid_argument",
            ParseError::ProcessingFlag { .. } => "argot.msg.processing_flag",
            ParseError::RequiredFlagMissing { .. } => "argot.msg.required_flag_missing",
            ParseError::RequiredPositionalMissing { .. } => {
                "argot.msg.required_positional_missing"
            }
            ParseError::RequiredIf { .. } => "argot.msg.required_if",
            ParseError::DependencyNotFound { .. } => "argot.msg.dependency_not_found",
            ParseError::DependencyValueNotSpecified { .. } => {
                "argot.msg.dependency_value_not_specified"
            }
            ParseError::CircularDependency { .. } => "argot.msg.circular_dependency",
            ParseError::RecursionDepthExceeded { .. } => "argot.msg.recursion_depth_exceeded",
            ParseError::DependencyDepthExceeded { .. } => "argot.msg.dependency_depth_exceeded",
            ParseError::ShortFlagConflict { .. } => "argot.msg.short_flag_conflict",
            ParseError::FlagAlreadyExists { .. } => "argot.msg.flag_already_exists",
            ParseError::SecureFlagExpectsValue { .. } => "argot.msg.secure_flag_expects_value",
            ParseError::NotFoundPath { .. } => "argot.msg.not_found_path",
            ParseError::NotFilePath { .. } => "argot.msg.not_file_path",
            ParseError::FileOperation { .. } => "argot.msg.file_operation",
            ParseError::InvalidListDelimiter => "argot.msg.invalid_list_delimiter",
            ParseError::EmptyArgumentPrefixList => "argot.msg.empty_prefix_list",
            ParseError::EmptyFlagName => "argot.msg.empty_flag_name",
            ParseError::EmptyCommandName => "argot.msg.empty_command_name",
            ParseError::InvalidValidator { .. } => "argot.msg.invalid_validator",
            ParseError::CommandCallback { .. } => "argot.msg.command_callback_error",
            ParseError::IndexOutOfBounds { .. } => "argot.msg.index_out_of_bounds",
            ParseError::ConversionFailed { .. } => "argot.msg.conversion_failed",
            ParseError::Validation { key, .. } => key,
        }
    }

    /// The raw argument tuple, in placeholder order. Nested causes are not
    /// included here; [`ParseError::render`] resolves them recursively.
    fn raw_args(&self) -> Vec<String> {
        match self {
            ParseError::UnknownFlag { name, suggestions }
            | ParseError::UnknownCommand { name, suggestions } => match suggestions {
                Some(s) => vec![name.clone(), s.clone()],
                None => vec![name.clone()],
            },
            ParseError::CommandExpectsSubcommand { path } => vec![path.clone()],
            ParseError::FlagExpectsValue { name } => vec![name.clone()],
            ParseError::InvalidArgument { name, value, accepted } => {
                vec![name.clone(), value.clone(), accepted.clone()]
            }
            ParseError::ProcessingFlag { name, .. } => vec![name.clone()],
            ParseError::RequiredFlagMissing { name } => vec![name.clone()],
            ParseError::RequiredPositionalMissing { name, position } => {
                vec![name.clone(), position.to_string()]
            }
            ParseError::RequiredIf { name, message } => vec![name.clone(), message.clone()],
            ParseError::DependencyNotFound { name, depends_on } => {
                vec![name.clone(), depends_on.clone()]
            }
            ParseError::DependencyValueNotSpecified { name, depends_on, allowed } => {
                vec![name.clone(), depends_on.clone(), allowed.clone()]
            }
            ParseError::CircularDependency { cycle } => vec![cycle.clone()],
            ParseError::RecursionDepthExceeded { path, max_depth } => {
                vec![path.clone(), max_depth.to_string()]
            }
            ParseError::DependencyDepthExceeded { name, max_depth } => {
                vec![name.clone(), max_depth.to_string()]
            }
            ParseError::ShortFlagConflict { short, new_flag, existing_flag } => {
                vec![short.clone(), new_flag.clone(), existing_flag.clone()]
            }
            ParseError::FlagAlreadyExists { key } => vec![key.clone()],
            ParseError::SecureFlagExpectsValue { name } => vec![name.clone()],
            ParseError::NotFoundPath { path } | ParseError::NotFilePath { path } => {
                vec![path.clone()]
            }
            ParseError::FileOperation { path, message } => vec![path.clone(), message.clone()],
            ParseError::InvalidListDelimiter
            | ParseError::EmptyArgumentPrefixList
            | ParseError::EmptyFlagName
            | ParseError::EmptyCommandName => vec![],
            ParseError::InvalidValidator { spec, message } => {
                vec![spec.clone(), message.clone()]
            }
            ParseError::CommandCallback { path, message } => {
                vec![path.clone(), message.clone()]
            }
            ParseError::IndexOutOfBounds { key, index, capacity } => {
                vec![key.clone(), index.to_string(), capacity.to_string()]
            }
            ParseError::ConversionFailed { value, target } => {
                vec![value.clone(), target.to_string()]
            }
            ParseError::Validation { args, .. } => args.clone(),
        }
    }

    /// Render this error against `catalog` in `lang`. Wrapped causes are
    /// rendered in the same language and spliced into the argument list.
    pub fn render(&self, catalog: &MessageCatalog, lang: &LangTag) -> String {
        match self {
            ParseError::ProcessingFlag { name, cause } => {
                let inner = cause.render(catalog, lang);
                catalog.message(lang, self.message_key(), &[name.clone(), inner])
            }
            _ => catalog.message(lang, self.message_key(), &self.raw_args()),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::ProcessingFlag { name, cause } => {
                let args = vec![name.clone(), cause.to_string()];
                write!(f, "{}", MessageCatalog::default_message(self.message_key(), &args))
            }
            _ => write!(
                f,
                "{}",
                MessageCatalog::default_message(self.message_key(), &self.raw_args())
            ),
        }
    }
}
