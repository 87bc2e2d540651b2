//! Layered Message Catalogs
//!
//! Message strings are looked up by dot-separated key in three layers:
//! - user catalog (application strings, highest priority)
//! - system catalog (parser extensions registered at runtime)
//! - default catalog (built-in English)
//!
//! Catalog files are JSON objects mapping keys to template strings. Templates
//! use positional placeholders (`%[1]s`, `%[2]d`) or sequential ones
//! (`%s`, `%d`). `%[n]d` placeholders get locale-aware digit grouping.

use std::collections::HashMap;

use crate::errors::ParseError;
use crate::i18n::LangTag;

/// Built-in English messages. Every key the parser can emit must be here so
/// that rendering never falls through to a bare key in the default language.
const DEFAULT_EN: &str = r#"{
    "argot.msg.unknown_flag": "unknown flag: %[1]s",
    "argot.msg.unknown_flag_with_suggestions": "unknown flag: %[1]s, did you mean %[2]s?",
    "argot.msg.unknown_command": "unknown command: %[1]s",
    "argot.msg.unknown_command_with_suggestions": "unknown command: %[1]s, did you mean %[2]s?",
    "argot.msg.command_expects_subcommand": "command '%[1]s' expects a subcommand",
    "argot.msg.flag_expects_value": "flag '%[1]s' expects a value",
    "argot.msg.invalid_argument": "invalid value '%[2]s' for flag '%[1]s', accepted: %[3]s",
    "argot.msg.processing_flag": "error processing flag '%[1]s': %[2]s",
    "argot.msg.required": "required",
    "argot.msg.required_flag_missing": "required flag missing: %[1]s",
    "argot.msg.required_positional_missing": "missing required positional argument %[2]d ('%[1]s')",
    "argot.msg.required_if": "%[1]s: %[2]s",
    "argot.msg.dependency_not_found": "flag '%[1]s' depends on '%[2]s' which was not provided",
    "argot.msg.dependency_value_not_specified": "flag '%[1]s' depends on '%[2]s' having one of the values: %[3]s",
    "argot.msg.circular_dependency": "circular flag dependency detected: %[1]s",
    "argot.msg.recursion_depth_exceeded": "command nesting of '%[1]s' exceeds the maximum depth of %[2]d",
    "argot.msg.dependency_depth_exceeded": "dependency chain of '%[1]s' exceeds the maximum depth of %[2]d",
    "argot.msg.short_flag_conflict": "short flag '%[1]s' of '%[2]s' conflicts with '%[3]s'",
    "argot.msg.flag_already_exists": "flag already exists: %[1]s",
    "argot.msg.secure_flag_expects_value": "secure flag '%[1]s' expects a value",
    "argot.msg.not_found_path": "path does not exist: %[1]s",
    "argot.msg.not_file_path": "path is not a regular file: %[1]s",
    "argot.msg.file_operation": "file operation on '%[1]s' failed: %[2]s",
    "argot.msg.invalid_list_delimiter": "list delimiter may not match a prefix rune",
    "argot.msg.empty_prefix_list": "argument prefix list cannot be empty",
    "argot.msg.empty_flag_name": "flag name cannot be empty",
    "argot.msg.empty_command_name": "command name cannot be empty",
    "argot.msg.invalid_validator": "invalid validator specification '%[1]s': %[2]s",
    "argot.msg.command_callback_error": "command '%[1]s' failed: %[2]s",
    "argot.msg.index_out_of_bounds": "index %[2]d is out of range for flag '%[1]s' (capacity %[3]d)",
    "argot.msg.conversion_failed": "cannot convert '%[1]s' to %[2]s",
    "argot.msg.validate_regex": "value '%[1]s' does not match %[2]s",
    "argot.msg.validate_one_of": "value '%[1]s' matched none of the accepted forms",
    "argot.msg.validate_not": "value '%[1]s' is not allowed here",
    "argot.msg.validate_range": "value '%[1]s' is not in range %[2]s..%[3]s",
    "argot.msg.validate_min": "value '%[1]s' is below the minimum %[2]s",
    "argot.msg.validate_max": "value '%[1]s' is above the maximum %[2]s",
    "argot.msg.validate_min_length": "value '%[1]s' is shorter than %[2]d characters",
    "argot.msg.validate_max_length": "value '%[1]s' is longer than %[2]d characters",
    "argot.msg.validate_email": "'%[1]s' is not a valid email address",
    "argot.msg.validate_port": "'%[1]s' is not a valid port number",
    "argot.msg.validate_hostname": "'%[1]s' is not a valid hostname",
    "argot.msg.validate_url": "'%[1]s' is not a valid URL",
    "argot.msg.validate_int_in": "value '%[1]s' is not one of: %[2]s",
    "argot.msg.validate_boolean": "'%[1]s' is not a boolean",
    "argot.msg.validate_integer": "'%[1]s' is not an integer",
    "argot.msg.validate_float": "'%[1]s' is not a number",
    "argot.msg.validate_alphanumeric": "'%[1]s' contains non-alphanumeric characters",
    "argot.msg.validate_identifier": "'%[1]s' is not a valid identifier",
    "argot.msg.validate_no_whitespace": "'%[1]s' may not contain whitespace",
    "argot.msg.secure_prompt": "enter value for '%[1]s': ",
    "argot.msg.flag.help": "display help information",
    "argot.msg.flag.version": "display version information",
    "argot.msg.flag.language": "set the display language",
    "argot.msg.help_usage": "Usage",
    "argot.msg.help_commands": "Commands",
    "argot.msg.help_flags": "Flags",
    "argot.msg.help_default": "default",
    "argot.msg.help_positional": "positional"
}"#;

lazy_static::lazy_static! {
    static ref DEFAULT_CATALOG: HashMap<String, String> =
        serde_json::from_str(DEFAULT_EN).expect("built-in catalog is valid JSON");
}

/// Layered lookup of translated message templates.
#[derive(Debug, Default)]
pub struct MessageCatalog {
    /// Parser-specific extensions, keyed by base language.
    system: HashMap<String, HashMap<String, String>>,
    /// Application strings, keyed by base language. Highest priority.
    user: HashMap<String, HashMap<String, String>>,
}

impl MessageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a JSON catalog into the system layer for `lang`.
    pub fn add_system_locale(&mut self, lang: &LangTag, json: &str) -> Result<(), ParseError> {
        let map: HashMap<String, String> = serde_json::from_str(json)
            .map_err(|e| ParseError::FileOperation {
                path: format!("<{} catalog>", lang),
                message: e.to_string(),
            })?;
        self.system
            .entry(lang.base().to_string())
            .or_default()
            .extend(map);
        Ok(())
    }

    /// Merge a JSON catalog into the user layer for `lang`.
    pub fn add_user_locale(&mut self, lang: &LangTag, json: &str) -> Result<(), ParseError> {
        let map: HashMap<String, String> = serde_json::from_str(json)
            .map_err(|e| ParseError::FileOperation {
                path: format!("<{} catalog>", lang),
                message: e.to_string(),
            })?;
        self.user
            .entry(lang.base().to_string())
            .or_default()
            .extend(map);
        Ok(())
    }

    /// Raw template lookup: user, then system, then the built-in English
    /// default. Returns `None` when the key is unknown everywhere.
    pub fn lookup(&self, lang: &LangTag, key: &str) -> Option<&str> {
        let base = lang.base();
        if let Some(s) = self.user.get(base).and_then(|m| m.get(key)) {
            return Some(s);
        }
        if let Some(s) = self.system.get(base).and_then(|m| m.get(key)) {
            return Some(s);
        }
        DEFAULT_CATALOG.get(key).map(|s| s.as_str())
    }

    /// Whether any layer carries `key` translated for `lang` itself, i.e.
    /// without falling back to the default English layer.
    pub fn has_translation(&self, lang: &LangTag, key: &str) -> bool {
        let base = lang.base();
        self.user.get(base).map_or(false, |m| m.contains_key(key))
            || self.system.get(base).map_or(false, |m| m.contains_key(key))
            || (base == "en" && DEFAULT_CATALOG.contains_key(key))
    }

    /// Look up `key` and render it with `args`. Unknown keys render as the
    /// key itself so a missing catalog entry stays diagnosable.
    pub fn message(&self, lang: &LangTag, key: &str, args: &[String]) -> String {
        match self.lookup(lang, key) {
            Some(template) => format_template(template, args, lang),
            None => key.to_string(),
        }
    }

    /// Render against the built-in English layer only. Used by `Display`
    /// impls that have no catalog at hand.
    pub fn default_message(key: &str, args: &[String]) -> String {
        match DEFAULT_CATALOG.get(key) {
            Some(template) => format_template(template, args, &LangTag::english()),
            None => key.to_string(),
        }
    }
}

/// Render a message template. `%[n]s` substitutes argument n verbatim,
/// `%[n]d` parses it as an integer and applies locale digit grouping.
/// Bare `%s` / `%d` consume arguments left to right. `%%` is a literal `%`.
pub fn format_template(template: &str, args: &[String], lang: &LangTag) -> String {
    let mut out = String::with_capacity(template.len() + 16);
    let chars: Vec<char> = template.chars().collect();
    let mut i = 0;
    let mut next_seq = 0usize;

    while i < chars.len() {
        if chars[i] != '%' {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        // Trailing '%'
        if i + 1 >= chars.len() {
            out.push('%');
            break;
        }
        match chars[i + 1] {
            '%' => {
                out.push('%');
                i += 2;
            }
            '[' => {
                // %[n]v
                let mut j = i + 2;
                let mut num = String::new();
                while j < chars.len() && chars[j].is_ascii_digit() {
                    num.push(chars[j]);
                    j += 1;
                }
                if j + 1 < chars.len()
                    && chars[j] == ']'
                    && matches!(chars[j + 1], 's' | 'd' | 'v')
                    && !num.is_empty()
                {
                    let idx: usize = num.parse().unwrap_or(0);
                    let arg = idx
                        .checked_sub(1)
                        .and_then(|k| args.get(k))
                        .map(|s| s.as_str())
                        .unwrap_or("");
                    push_arg(&mut out, arg, chars[j + 1], lang);
                    i = j + 2;
                } else {
                    out.push('%');
                    i += 1;
                }
            }
            verb @ ('s' | 'd' | 'v') => {
                let arg = args.get(next_seq).map(|s| s.as_str()).unwrap_or("");
                next_seq += 1;
                push_arg(&mut out, arg, verb, lang);
                i += 2;
            }
            _ => {
                out.push('%');
                i += 1;
            }
        }
    }
    out
}

fn push_arg(out: &mut String, arg: &str, verb: char, lang: &LangTag) {
    if verb == 'd' {
        if let Ok(n) = arg.trim().parse::<i64>() {
            out.push_str(&format_int(lang, n));
            return;
        }
    }
    out.push_str(arg);
}

/// Locale-aware integer grouping. Covers the grouping conventions of the
/// catalog languages shipped in practice; unknown languages get no grouping.
pub fn format_int(lang: &LangTag, n: i64) -> String {
    let (sep, group) = match lang.base() {
        "en" => (Some(','), 3),
        "de" | "es" | "it" | "pt" | "nl" => (Some('.'), 3),
        "fr" => (Some('\u{202f}'), 3),
        _ => (None, 3),
    };
    let digits = n.unsigned_abs().to_string();
    let Some(sep) = sep else {
        return n.to_string();
    };
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % group == 0 {
            grouped.push(sep);
        }
        grouped.push(c);
    }
    if n < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fr() -> LangTag {
        LangTag::parse("fr").unwrap()
    }

    #[test]
    fn test_default_layer_lookup() {
        let catalog = MessageCatalog::new();
        let msg = catalog.message(
            &LangTag::english(),
            "argot.msg.unknown_flag",
            &["verbose".to_string()],
        );
        assert_eq!(msg, "unknown flag: verbose");
    }

    #[test]
    fn test_system_layer_overrides_default() {
        let mut catalog = MessageCatalog::new();
        catalog
            .add_system_locale(&fr(), r#"{"argot.msg.required": "requis"}"#)
            .unwrap();
        assert_eq!(catalog.message(&fr(), "argot.msg.required", &[]), "requis");
        // English still comes from the default layer.
        assert_eq!(
            catalog.message(&LangTag::english(), "argot.msg.required", &[]),
            "required"
        );
    }

    #[test]
    fn test_user_layer_wins_over_system() {
        let mut catalog = MessageCatalog::new();
        catalog
            .add_system_locale(&fr(), r#"{"app.greeting": "bonjour"}"#)
            .unwrap();
        catalog
            .add_user_locale(&fr(), r#"{"app.greeting": "salut"}"#)
            .unwrap();
        assert_eq!(catalog.message(&fr(), "app.greeting", &[]), "salut");
    }

    #[test]
    fn test_unknown_key_renders_as_key() {
        let catalog = MessageCatalog::new();
        assert_eq!(
            catalog.message(&LangTag::english(), "no.such.key", &[]),
            "no.such.key"
        );
    }

    #[test]
    fn test_fallback_to_english_for_untranslated_key() {
        let mut catalog = MessageCatalog::new();
        catalog
            .add_system_locale(&fr(), r#"{"argot.msg.required": "requis"}"#)
            .unwrap();
        // Key not in the French layer falls through to built-in English.
        assert_eq!(
            catalog.message(&fr(), "argot.msg.unknown_flag", &["x".to_string()]),
            "unknown flag: x"
        );
    }

    #[test]
    fn test_positional_placeholders() {
        let out = format_template(
            "%[2]s before %[1]s",
            &["one".to_string(), "two".to_string()],
            &LangTag::english(),
        );
        assert_eq!(out, "two before one");
    }

    #[test]
    fn test_sequential_placeholders() {
        let out = format_template(
            "%s = %s",
            &["key".to_string(), "value".to_string()],
            &LangTag::english(),
        );
        assert_eq!(out, "key = value");
    }

    #[test]
    fn test_escaped_percent() {
        let out = format_template("100%% of %s", &["it".to_string()], &LangTag::english());
        assert_eq!(out, "100% of it");
    }

    #[test]
    fn test_numeric_grouping_english() {
        let out = format_template("%[1]d items", &["1234567".to_string()], &LangTag::english());
        assert_eq!(out, "1,234,567 items");
    }

    #[test]
    fn test_format_int_locales() {
        assert_eq!(format_int(&LangTag::english(), 1234567), "1,234,567");
        assert_eq!(format_int(&LangTag::parse("de").unwrap(), 1234567), "1.234.567");
        assert_eq!(format_int(&fr(), 1234), "1\u{202f}234");
        assert_eq!(format_int(&LangTag::parse("ja").unwrap(), 1234), "1234");
        assert_eq!(format_int(&LangTag::english(), -1000), "-1,000");
    }

    #[test]
    fn test_missing_argument_renders_empty() {
        let out = format_template("a %[3]s b", &["x".to_string()], &LangTag::english());
        assert_eq!(out, "a  b");
    }
}
