//! Value Pipeline
//!
//! Every resolved `(flag, raw value)` pair runs through the same stages:
//! pre-filter, validators (accepted-value patterns were folded into the
//! validator list at registration), post-filter, then storage and conversion
//! into the bound variable. Chained flags run the stages per element.
//!
//! Failure kinds stay distinct: an accepted-value mismatch is already a
//! complete `InvalidArgument` naming the flag and surfaces as-is, while
//! user-supplied validator failures are wrapped in `ProcessingFlag`.

pub mod convert;
pub mod validators;

use crate::errors::ParseError;
use crate::symbols::flag::{Flag, FlagType};

/// Predicate deciding which characters split a chained value list.
pub type ListDelimiterFn = std::sync::Arc<dyn Fn(char) -> bool>;

/// Default list delimiters: comma, pipe, space.
pub fn default_list_delimiter(c: char) -> bool {
    matches!(c, ',' | '|' | ' ')
}

/// Run `raw` through the flag's pipeline and produce the storage value.
///
/// Chained values are split with `delimiter`, validated per element and
/// rejoined with `|`. The first validator failure aborts the pipeline: an
/// `InvalidArgument` (accepted-value mismatch) is returned unchanged, any
/// other failure is wrapped in a `ProcessingFlag` error naming the flag.
pub fn process_value(
    flag: &Flag,
    raw: &str,
    delimiter: &dyn Fn(char) -> bool,
) -> Result<String, ParseError> {
    let filtered = match &flag.pre_filter {
        Some(f) => f(raw),
        None => raw.to_string(),
    };

    let wrap = |cause: ParseError| {
        // Already terminal: it names the flag and renders on its own.
        if matches!(cause, ParseError::InvalidArgument { .. }) {
            return cause;
        }
        ParseError::ProcessingFlag {
            name: flag.name.clone(),
            cause: Box::new(cause),
        }
    };

    if flag.flag_type == FlagType::Chained {
        let mut elements = Vec::new();
        for element in filtered.split(delimiter).filter(|s| !s.is_empty()) {
            for validator in &flag.validators {
                validator(element).map_err(&wrap)?;
            }
            let element = match &flag.post_filter {
                Some(f) => f(element),
                None => element.to_string(),
            };
            elements.push(element);
        }
        return Ok(elements.join("|"));
    }

    for validator in &flag.validators {
        validator(&filtered).map_err(&wrap)?;
    }
    Ok(match &flag.post_filter {
        Some(f) => f(&filtered),
        None => filtered,
    })
}
