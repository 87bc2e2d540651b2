//! Language Auto-Detection
//!
//! Before the main parse, argv is scanned linearly for a language selector
//! (`--lang fr`, `--lang=fr`, `-l fr`); the last occurrence wins. When argv
//! carries none, a configurable environment variable is consulted, then
//! (optionally) the POSIX locale variables `LC_ALL`, `LC_MESSAGES`, `LANG`.
//! Invalid tags are silently ignored so a bad value degrades to the default
//! language instead of failing the parse.

use crate::i18n::LangTag;

/// Strip prefix runes from a flag-shaped token and split an inline value.
/// Returns `None` for tokens that are not flag-shaped.
fn flag_name<'a>(token: &'a str, prefixes: &[char]) -> Option<(&'a str, Option<&'a str>)> {
    let mut rest = token;
    let mut stripped = 0;
    while stripped < 2 {
        match rest.chars().next() {
            Some(c) if prefixes.contains(&c) => {
                rest = &rest[c.len_utf8()..];
                stripped += 1;
            }
            _ => break,
        }
    }
    if stripped == 0 || rest.is_empty() {
        return None;
    }
    match rest.split_once('=') {
        Some((name, value)) => Some((name, Some(value))),
        None => Some((rest, None)),
    }
}

/// Scan argv for the configured language flag names. Last occurrence wins.
fn scan_argv(args: &[String], names: &[String], prefixes: &[char]) -> Option<String> {
    let mut found = None;
    let mut i = 0;
    while i < args.len() {
        if let Some((name, inline)) = flag_name(&args[i], prefixes) {
            if names.iter().any(|n| n == name) {
                match inline {
                    Some(value) => found = Some(value.to_string()),
                    None => {
                        if let Some(next) = args.get(i + 1) {
                            if flag_name(next, prefixes).is_none() {
                                found = Some(next.clone());
                                i += 1;
                            }
                        }
                    }
                }
            }
        }
        i += 1;
    }
    found
}

/// The raw language value present in argv, if any. Callers use this to
/// distinguish an explicit selector from environment-derived defaults.
pub(crate) fn argv_language(args: &[String], names: &[String], prefixes: &[char]) -> Option<String> {
    scan_argv(args, names, prefixes)
}

/// POSIX locale fallback: `LC_ALL`, `LC_MESSAGES`, `LANG`, with the
/// `.encoding` suffix stripped; `C` and `POSIX` are not languages.
fn system_locale() -> Option<LangTag> {
    for var in ["LC_ALL", "LC_MESSAGES", "LANG"] {
        let Ok(value) = std::env::var(var) else {
            continue;
        };
        let value = value.split('.').next().unwrap_or("").trim().to_string();
        if value.is_empty() || value == "C" || value == "POSIX" {
            continue;
        }
        if let Some(tag) = LangTag::parse(&value) {
            return Some(tag);
        }
    }
    None
}

/// Determine the active language for this invocation, or `None` to keep the
/// parser default.
pub(crate) fn detect_language(
    args: &[String],
    names: &[String],
    prefixes: &[char],
    env_var: &str,
    check_system_locale: bool,
) -> Option<LangTag> {
    if let Some(value) = scan_argv(args, names, prefixes) {
        if let Some(tag) = LangTag::parse(&value) {
            return Some(tag);
        }
    }
    if let Ok(value) = std::env::var(env_var) {
        if let Some(tag) = LangTag::parse(&value) {
            return Some(tag);
        }
    }
    if check_system_locale {
        return system_locale();
    }
    None
}

/// Remove language selector flags (and their value tokens) from an argument
/// list, for streams handed to the help sub-parser.
pub(crate) fn filter_language_flags(
    args: &[String],
    names: &[String],
    prefixes: &[char],
) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len());
    let mut i = 0;
    while i < args.len() {
        if let Some((name, inline)) = flag_name(&args[i], prefixes) {
            if names.iter().any(|n| n == name) {
                if inline.is_none() {
                    if let Some(next) = args.get(i + 1) {
                        if flag_name(next, prefixes).is_none() {
                            i += 1;
                        }
                    }
                }
                i += 1;
                continue;
            }
        }
        out.push(args[i].clone());
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn names() -> Vec<String> {
        vec!["language".to_string(), "lang".to_string(), "l".to_string()]
    }

    const PREFIXES: &[char] = &['-'];

    #[test]
    fn test_scan_separate_value() {
        let found = scan_argv(&args(&["--lang", "fr", "serve"]), &names(), PREFIXES);
        assert_eq!(found.as_deref(), Some("fr"));
    }

    #[test]
    fn test_scan_inline_value() {
        let found = scan_argv(&args(&["--lang=de"]), &names(), PREFIXES);
        assert_eq!(found.as_deref(), Some("de"));
    }

    #[test]
    fn test_scan_short_form() {
        let found = scan_argv(&args(&["-l", "ja"]), &names(), PREFIXES);
        assert_eq!(found.as_deref(), Some("ja"));
    }

    #[test]
    fn test_last_occurrence_wins() {
        let found = scan_argv(&args(&["--lang", "fr", "--lang=de"]), &names(), PREFIXES);
        assert_eq!(found.as_deref(), Some("de"));
    }

    #[test]
    fn test_underscore_normalized() {
        let tag = detect_language(
            &args(&["--lang", "pt_BR"]),
            &names(),
            PREFIXES,
            "ARGOT_LANG_TEST_UNSET",
            false,
        )
        .unwrap();
        assert_eq!(tag.to_string(), "pt-BR");
    }

    #[test]
    fn test_invalid_tag_ignored() {
        let tag = detect_language(
            &args(&["--lang", "!!!"]),
            &names(),
            PREFIXES,
            "ARGOT_LANG_TEST_UNSET",
            false,
        );
        assert!(tag.is_none());
    }

    #[test]
    fn test_env_fallback() {
        std::env::set_var("ARGOT_LANG_TEST_ENV", "fr");
        let tag = detect_language(&args(&["serve"]), &names(), PREFIXES, "ARGOT_LANG_TEST_ENV", false);
        std::env::remove_var("ARGOT_LANG_TEST_ENV");
        assert_eq!(tag.unwrap().base(), "fr");
    }

    #[test]
    fn test_filter_removes_selector_and_value() {
        let filtered = filter_language_flags(
            &args(&["--lang", "fr", "serve", "--lang=de", "-v"]),
            &names(),
            PREFIXES,
        );
        assert_eq!(filtered, args(&["serve", "-v"]));
    }

    #[test]
    fn test_filter_keeps_flag_shaped_follower() {
        let filtered = filter_language_flags(&args(&["--lang", "--verbose"]), &names(), PREFIXES);
        assert_eq!(filtered, args(&["--verbose"]));
    }
}
