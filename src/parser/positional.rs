//! Positional Binder
//!
//! Declared positional slots are flags with a `position` index, grouped by
//! their command path. During the main loop every token that is neither a
//! flag nor a command fills the lowest-index unfilled slot of the current
//! context, running the full value pipeline as if `--flag token` had been
//! written. Unplaceable tokens stay as free positionals, except where a
//! command was clearly expected, which is an unknown-command diagnostic.

use crate::errors::ParseError;
use crate::parser::engine::EngineState;
use crate::parser::Parser;
use crate::symbols::registry::split_key;

/// One positional argument as observed in argv.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionalArg {
    /// Index within the argument vector.
    pub position: usize,
    /// Raw token value.
    pub value: String,
    /// Registry key of the declaring flag; `None` for free positionals.
    pub flag_key: Option<String>,
    /// Logical slot index within the command context.
    pub slot: Option<usize>,
}

/// Route one unclassified token.
pub(crate) fn bind_token(
    parser: &mut Parser,
    state: &mut EngineState,
    token: &str,
    argv_index: usize,
) {
    let context = state.context_stack.last().cloned().unwrap_or_default();

    if let Some((key, slot)) = next_unfilled_slot(parser, state, &context) {
        state.filled_slots.insert(key.clone());
        parser.apply_flag_value(&key, token, None);
        parser.positionals.push(PositionalArg {
            position: argv_index,
            value: token.to_string(),
            flag_key: Some(key),
            slot: Some(slot),
        });
        return;
    }

    let command_expected = (state.context_stack.is_empty() && !parser.commands.is_empty())
        || state.expectations.front().is_some();
    if command_expected {
        parser.push_error(ParseError::UnknownCommand {
            name: token.to_string(),
            suggestions: None,
        });
        if let Some(suggestions) = parser.command_suggestions(token) {
            parser.push_error(ParseError::UnknownCommand {
                name: token.to_string(),
                suggestions: Some(suggestions),
            });
        }
        return;
    }

    parser.positionals.push(PositionalArg {
        position: argv_index,
        value: token.to_string(),
        flag_key: None,
        slot: None,
    });
}

/// Lowest-index declared slot of `context` that is still unfilled. A flag
/// set explicitly by name counts as filled.
fn next_unfilled_slot(
    parser: &Parser,
    state: &EngineState,
    context: &str,
) -> Option<(String, usize)> {
    let mut slots: Vec<(usize, String)> = Vec::new();
    for (key, flag) in parser.flags.iter() {
        let Some(position) = flag.borrow().position else {
            continue;
        };
        let (_, path) = split_key(key);
        if path == context {
            slots.push((position, key.clone()));
        }
    }
    slots.sort();
    slots
        .into_iter()
        .find(|(_, key)| !state.filled_slots.contains(key) && !parser.options.contains_key(key))
        .map(|(position, key)| (key, position))
}

/// Post-parse finalizer: assign defaults to unfilled slots of every observed
/// context. Required-but-unfilled slots are reported by the validation pass.
pub(crate) fn finalize(parser: &mut Parser, _state: &mut EngineState) {
    let mut contexts: Vec<String> = vec![String::new()];
    contexts.extend(parser.observed_commands.iter().cloned());

    let mut defaults: Vec<(String, String)> = Vec::new();
    for (key, flag) in parser.flags.iter() {
        let flag = flag.borrow();
        if flag.position.is_none() {
            continue;
        }
        let (_, path) = split_key(key);
        if !contexts.iter().any(|c| c == path) {
            continue;
        }
        if parser.options.contains_key(key) {
            continue;
        }
        if let Some(default) = &flag.default_value {
            defaults.push((key.clone(), default.clone()));
        }
    }
    for (key, value) in defaults {
        parser.apply_flag_value(&key, &value, None);
    }
}
