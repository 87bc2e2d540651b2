//! Composable Value Validators
//!
//! Validators are plain functions from a candidate string to success or a
//! translatable error. They compose with [`one_of`], [`all`] and [`not`],
//! and can be described in a compact string DSL (`oneof(email,regex(^x+$))`)
//! used by declarative builders. A malformed DSL expression is a hard error
//! at construction time, unlike value errors which are collected at parse
//! time.

use std::sync::Arc;

use regex_lite::Regex;

use crate::errors::ParseError;

/// A composable value check.
pub type Validator = Arc<dyn Fn(&str) -> Result<(), ParseError>>;

fn fail(key: &'static str, args: Vec<String>) -> ParseError {
    ParseError::Validation { key, args }
}

/// Wrap an arbitrary function as a validator.
pub fn custom<F>(f: F) -> Validator
where
    F: Fn(&str) -> Result<(), ParseError> + 'static,
{
    Arc::new(f)
}

/// Value must match `pattern` (full regex syntax of `regex-lite`).
/// `description` appears in diagnostics; when empty the pattern itself is
/// shown.
pub fn regex(pattern: &str, description: &str) -> Result<Validator, ParseError> {
    let re = Regex::new(pattern).map_err(|e| ParseError::InvalidValidator {
        spec: format!("regex({})", pattern),
        message: e.to_string(),
    })?;
    let shown = if description.is_empty() {
        pattern.to_string()
    } else {
        description.to_string()
    };
    Ok(Arc::new(move |value| {
        if re.is_match(value) {
            Ok(())
        } else {
            Err(fail(
                "argot.msg.validate_regex",
                vec![value.to_string(), shown.clone()],
            ))
        }
    }))
}

/// Short-circuit OR: accept when any inner validator accepts.
pub fn one_of(validators: Vec<Validator>) -> Validator {
    Arc::new(move |value| {
        for v in &validators {
            if v(value).is_ok() {
                return Ok(());
            }
        }
        Err(fail("argot.msg.validate_one_of", vec![value.to_string()]))
    })
}

/// AND: accept only when every inner validator accepts. The first failure
/// is propagated as-is.
pub fn all(validators: Vec<Validator>) -> Validator {
    Arc::new(move |value| {
        for v in &validators {
            v(value)?;
        }
        Ok(())
    })
}

/// Invert an inner validator.
pub fn not(inner: Validator) -> Validator {
    Arc::new(move |value| match inner(value) {
        Ok(()) => Err(fail("argot.msg.validate_not", vec![value.to_string()])),
        Err(_) => Ok(()),
    })
}

/// Numeric value within `lo..=hi`.
pub fn range(lo: f64, hi: f64) -> Validator {
    Arc::new(move |value| match value.trim().parse::<f64>() {
        Ok(n) if n >= lo && n <= hi => Ok(()),
        _ => Err(fail(
            "argot.msg.validate_range",
            vec![value.to_string(), lo.to_string(), hi.to_string()],
        )),
    })
}

/// Numeric value at least `lo`.
pub fn min(lo: f64) -> Validator {
    Arc::new(move |value| match value.trim().parse::<f64>() {
        Ok(n) if n >= lo => Ok(()),
        _ => Err(fail(
            "argot.msg.validate_min",
            vec![value.to_string(), lo.to_string()],
        )),
    })
}

/// Numeric value at most `hi`.
pub fn max(hi: f64) -> Validator {
    Arc::new(move |value| match value.trim().parse::<f64>() {
        Ok(n) if n <= hi => Ok(()),
        _ => Err(fail(
            "argot.msg.validate_max",
            vec![value.to_string(), hi.to_string()],
        )),
    })
}

pub fn min_length(n: usize) -> Validator {
    Arc::new(move |value| {
        if value.chars().count() >= n {
            Ok(())
        } else {
            Err(fail(
                "argot.msg.validate_min_length",
                vec![value.to_string(), n.to_string()],
            ))
        }
    })
}

pub fn max_length(n: usize) -> Validator {
    Arc::new(move |value| {
        if value.chars().count() <= n {
            Ok(())
        } else {
            Err(fail(
                "argot.msg.validate_max_length",
                vec![value.to_string(), n.to_string()],
            ))
        }
    })
}

lazy_static::lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref HOSTNAME_RE: Regex = Regex::new(
        r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$"
    ).unwrap();
    static ref URL_RE: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://[^\s]+$").unwrap();
    static ref IDENTIFIER_RE: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

pub fn email() -> Validator {
    Arc::new(|value| {
        if EMAIL_RE.is_match(value) {
            Ok(())
        } else {
            Err(fail("argot.msg.validate_email", vec![value.to_string()]))
        }
    })
}

pub fn port() -> Validator {
    Arc::new(|value| match value.trim().parse::<u32>() {
        Ok(n) if (1..=65535).contains(&n) => Ok(()),
        _ => Err(fail("argot.msg.validate_port", vec![value.to_string()])),
    })
}

pub fn hostname() -> Validator {
    Arc::new(|value| {
        if !value.is_empty() && value.len() <= 253 && HOSTNAME_RE.is_match(value) {
            Ok(())
        } else {
            Err(fail("argot.msg.validate_hostname", vec![value.to_string()]))
        }
    })
}

pub fn url() -> Validator {
    Arc::new(|value| {
        if URL_RE.is_match(value) {
            Ok(())
        } else {
            Err(fail("argot.msg.validate_url", vec![value.to_string()]))
        }
    })
}

/// Integer drawn from an explicit allow-list.
pub fn int_in(allowed: Vec<i64>) -> Validator {
    Arc::new(move |value| match value.trim().parse::<i64>() {
        Ok(n) if allowed.contains(&n) => Ok(()),
        _ => Err(fail(
            "argot.msg.validate_int_in",
            vec![
                value.to_string(),
                allowed
                    .iter()
                    .map(|n| n.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            ],
        )),
    })
}

pub fn boolean() -> Validator {
    Arc::new(|value| {
        match value.trim().to_ascii_lowercase().as_str() {
            "true" | "false" | "1" | "0" | "t" | "f" => Ok(()),
            _ => Err(fail("argot.msg.validate_boolean", vec![value.to_string()])),
        }
    })
}

pub fn integer() -> Validator {
    Arc::new(|value| match value.trim().parse::<i64>() {
        Ok(_) => Ok(()),
        Err(_) => Err(fail("argot.msg.validate_integer", vec![value.to_string()])),
    })
}

pub fn float() -> Validator {
    Arc::new(|value| match value.trim().parse::<f64>() {
        Ok(_) => Ok(()),
        Err(_) => Err(fail("argot.msg.validate_float", vec![value.to_string()])),
    })
}

pub fn alphanumeric() -> Validator {
    Arc::new(|value| {
        if !value.is_empty() && value.chars().all(|c| c.is_alphanumeric()) {
            Ok(())
        } else {
            Err(fail(
                "argot.msg.validate_alphanumeric",
                vec![value.to_string()],
            ))
        }
    })
}

pub fn identifier() -> Validator {
    Arc::new(|value| {
        if IDENTIFIER_RE.is_match(value) {
            Ok(())
        } else {
            Err(fail(
                "argot.msg.validate_identifier",
                vec![value.to_string()],
            ))
        }
    })
}

pub fn no_whitespace() -> Validator {
    Arc::new(|value| {
        if value.chars().any(|c| c.is_whitespace()) {
            Err(fail(
                "argot.msg.validate_no_whitespace",
                vec![value.to_string()],
            ))
        } else {
            Ok(())
        }
    })
}

/// Parse a comma-separated validator DSL into a validator list.
///
/// Grammar: `name` or `name(arg,arg)`; arguments may themselves be validator
/// expressions for the combinators (`oneof`, `all`, `not`). An argument
/// containing commas or parentheses can be wrapped in braces, which are
/// stripped: `regex({^[a,b]+$})`.
pub fn parse_spec(spec: &str) -> Result<Vec<Validator>, ParseError> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(ParseError::InvalidValidator {
            spec: spec.to_string(),
            message: "empty specification".to_string(),
        });
    }
    split_top_level(spec)?
        .into_iter()
        .map(|part| parse_one(&part))
        .collect()
}

fn parse_one(expr: &str) -> Result<Validator, ParseError> {
    let expr = expr.trim();
    let invalid = |message: &str| ParseError::InvalidValidator {
        spec: expr.to_string(),
        message: message.to_string(),
    };

    let (name, args) = match expr.find('(') {
        Some(open) => {
            if !expr.ends_with(')') {
                return Err(invalid("unbalanced parentheses"));
            }
            let inner = &expr[open + 1..expr.len() - 1];
            (expr[..open].trim(), split_top_level(inner)?)
        }
        None => (expr, Vec::new()),
    };

    let name = name.to_ascii_lowercase();
    let want =
        |n: usize| -> Result<(), ParseError> {
            if args.len() == n {
                Ok(())
            } else {
                Err(invalid(&format!("expected {} argument(s)", n)))
            }
        };
    let numeric = |s: &str| -> Result<f64, ParseError> {
        s.trim()
            .parse::<f64>()
            .map_err(|_| invalid(&format!("'{}' is not a number", s)))
    };
    let count = |s: &str| -> Result<usize, ParseError> {
        s.trim()
            .parse::<usize>()
            .map_err(|_| invalid(&format!("'{}' is not a count", s)))
    };

    match name.as_str() {
        "regex" => {
            if args.is_empty() || args.len() > 2 {
                return Err(invalid("expected regex(pattern) or regex(pattern,description)"));
            }
            regex(&args[0], args.get(1).map(String::as_str).unwrap_or(""))
        }
        "oneof" | "one_of" => {
            if args.is_empty() {
                return Err(invalid("oneof requires at least one inner validator"));
            }
            let inner = args
                .iter()
                .map(|a| parse_one(a))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(one_of(inner))
        }
        "all" => {
            if args.is_empty() {
                return Err(invalid("all requires at least one inner validator"));
            }
            let inner = args
                .iter()
                .map(|a| parse_one(a))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(all(inner))
        }
        "not" => {
            want(1)?;
            Ok(not(parse_one(&args[0])?))
        }
        "range" => {
            want(2)?;
            Ok(range(numeric(&args[0])?, numeric(&args[1])?))
        }
        "min" => {
            want(1)?;
            Ok(min(numeric(&args[0])?))
        }
        "max" => {
            want(1)?;
            Ok(max(numeric(&args[0])?))
        }
        "minlen" | "minlength" => {
            want(1)?;
            Ok(min_length(count(&args[0])?))
        }
        "maxlen" | "maxlength" => {
            want(1)?;
            Ok(max_length(count(&args[0])?))
        }
        "intin" | "int_in" => {
            if args.is_empty() {
                return Err(invalid("intin requires at least one value"));
            }
            let values = args
                .iter()
                .map(|a| {
                    a.trim()
                        .parse::<i64>()
                        .map_err(|_| invalid(&format!("'{}' is not an integer", a)))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(int_in(values))
        }
        "email" => {
            want(0)?;
            Ok(email())
        }
        "port" => {
            want(0)?;
            Ok(port())
        }
        "hostname" => {
            want(0)?;
            Ok(hostname())
        }
        "url" => {
            want(0)?;
            Ok(url())
        }
        "boolean" | "bool" => {
            want(0)?;
            Ok(boolean())
        }
        "integer" | "int" => {
            want(0)?;
            Ok(integer())
        }
        "float" | "number" => {
            want(0)?;
            Ok(float())
        }
        "alphanumeric" => {
            want(0)?;
            Ok(alphanumeric())
        }
        "identifier" => {
            want(0)?;
            Ok(identifier())
        }
        "nowhitespace" | "no_whitespace" => {
            want(0)?;
            Ok(no_whitespace())
        }
        _ => Err(invalid("unknown validator")),
    }
}

/// Split on top-level commas, ignoring commas nested in parentheses, and
/// strip one level of surrounding braces from each part.
fn split_top_level(s: &str) -> Result<Vec<String>, ParseError> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut brace_depth = 0i32;
    let mut start = 0;
    let bytes: Vec<char> = s.chars().collect();

    let push_part = |from: usize, to: usize, parts: &mut Vec<String>| {
        let part: String = bytes[from..to].iter().collect();
        let part = part.trim();
        if !part.is_empty() {
            let part = if part.starts_with('{') && part.ends_with('}') && part.len() >= 2 {
                part[1..part.len() - 1].to_string()
            } else {
                part.to_string()
            };
            parts.push(part);
        }
    };

    for (i, &c) in bytes.iter().enumerate() {
        match c {
            '(' if brace_depth == 0 => depth += 1,
            ')' if brace_depth == 0 => depth -= 1,
            '{' => brace_depth += 1,
            '}' => brace_depth -= 1,
            ',' if depth == 0 && brace_depth == 0 => {
                push_part(start, i, &mut parts);
                start = i + 1;
            }
            _ => {}
        }
        if depth < 0 || brace_depth < 0 {
            return Err(ParseError::InvalidValidator {
                spec: s.to_string(),
                message: "unbalanced delimiters".to_string(),
            });
        }
    }
    if depth != 0 || brace_depth != 0 {
        return Err(ParseError::InvalidValidator {
            spec: s.to_string(),
            message: "unbalanced delimiters".to_string(),
        });
    }
    push_part(start, bytes.len(), &mut parts);
    Ok(parts)
}
