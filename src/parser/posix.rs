//! POSIX Short-Flag Normalization
//!
//! In POSIX mode a token like `-abc` is a cluster: each character naming a
//! registered short flag expands to its own `-x` token, and a trailing run
//! of unmatched characters becomes the value of the last matched flag when
//! that flag accepts one (`-ofoo` → `-o foo`). The stream is rewritten in
//! place and parsing resumes at the first expanded token.

use crate::parser::engine::EngineState;
use crate::parser::Parser;
use crate::stream::ArgStream;

/// Attempt to rewrite the current token as a short-flag cluster. Returns
/// true when the stream was rewritten; the caller re-enters its loop.
pub(crate) fn try_rewrite(
    parser: &Parser,
    stream: &mut ArgStream,
    state: &EngineState,
    token: &str,
) -> bool {
    let mut chars = token.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !parser.prefixes.contains(&first) {
        return false;
    }
    let rest = &token[first.len_utf8()..];
    if rest.chars().count() < 2 || rest.contains('=') {
        return false;
    }
    // A second prefix rune means a long flag, not a cluster.
    if rest
        .chars()
        .next()
        .map(|c| parser.prefixes.contains(&c))
        .unwrap_or(false)
    {
        return false;
    }

    let lookup = |c: char| -> Option<String> {
        let short = c.to_string();
        for ctx in state.context_stack.iter().rev() {
            if let Some(key) = parser.flags.lookup_short(&short, ctx) {
                return Some(key);
            }
        }
        parser.flags.lookup_short(&short, "")
    };

    let cs: Vec<char> = rest.chars().collect();
    let mut expansion: Vec<String> = Vec::new();
    let mut last_key: Option<String> = None;
    let mut value: Option<String> = None;

    for (i, &c) in cs.iter().enumerate() {
        match lookup(c) {
            Some(key) => {
                expansion.push(format!("{}{}", first, c));
                last_key = Some(key);
            }
            None => {
                let tail: String = cs[i..].iter().collect();
                let takes_value = last_key
                    .as_ref()
                    .and_then(|key| parser.flag_by_key(key))
                    .map(|flag| flag.borrow().flag_type.takes_value())
                    .unwrap_or(false);
                if !takes_value {
                    // Not a recognizable cluster; let the normal flag path
                    // report it.
                    return false;
                }
                value = Some(tail);
                break;
            }
        }
    }

    if expansion.len() <= 1 && value.is_none() {
        return false;
    }
    if let Some(v) = value {
        expansion.push(v);
    }

    let token_index = stream.pos().saturating_sub(1);
    let mut rewritten: Vec<String> = stream.args()[..token_index].to_vec();
    rewritten.extend(expansion);
    rewritten.extend(stream.args()[token_index + 1..].iter().cloned());
    stream.replace_args(rewritten);
    stream.set_pos(token_index);
    true
}
