//! Environment-Variable Injection
//!
//! A caller-supplied name converter maps environment variable names to flag
//! canonical names. Matched variables become `--name value` pairs spliced
//! into the token stream: global flags at the stream head (so explicit argv
//! occurrences override them), command-scoped flags when their command
//! context is entered.

use std::collections::HashMap;

use crate::parser::Parser;
use crate::symbols::registry::split_key;

/// Compute the injection pairs for this parse, grouped by command path.
/// The empty-string group is injected at the stream head.
pub(crate) fn collect(parser: &Parser) -> HashMap<String, Vec<String>> {
    let mut groups: HashMap<String, Vec<String>> = HashMap::new();
    let Some(converter) = parser.env_converter.clone() else {
        return groups;
    };
    let long_prefix = parser
        .prefixes
        .first()
        .map(|c| format!("{0}{0}", c))
        .unwrap_or_else(|| "--".to_string());

    for (var, value) in std::env::vars() {
        if value.is_empty() {
            continue;
        }
        let Some(name) = converter(&var) else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        // The same canonical name may live in several scopes; each scope
        // gets its own injection.
        for (key, _) in parser.flags.iter() {
            let (flag_name, path) = split_key(key);
            if flag_name == name {
                groups
                    .entry(path.to_string())
                    .or_default()
                    .extend([format!("{}{}", long_prefix, name), value.clone()]);
            }
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::Flag;

    #[test]
    fn test_no_converter_no_injection() {
        std::env::set_var("ARGOT_INJ_A", "1");
        let mut parser = Parser::new();
        parser.add_flag(Flag::new("a")).unwrap();
        assert!(collect(&parser).is_empty());
        std::env::remove_var("ARGOT_INJ_A");
    }

    #[test]
    fn test_groups_by_scope() {
        std::env::set_var("ARGOT_INJ_GLOBAL_ONE", "g");
        std::env::set_var("ARGOT_INJ_SCOPED_ONE", "s");
        let mut parser = Parser::new();
        parser.add_flag(Flag::new("global-one")).unwrap();
        parser
            .add_flag_to(Flag::new("scoped-one"), &["serve"])
            .unwrap();
        parser.set_env_name_converter(|var| {
            var.strip_prefix("ARGOT_INJ_")
                .map(|rest| rest.to_ascii_lowercase().replace('_', "-"))
        });

        let groups = collect(&parser);
        std::env::remove_var("ARGOT_INJ_GLOBAL_ONE");
        std::env::remove_var("ARGOT_INJ_SCOPED_ONE");

        assert_eq!(groups[""], vec!["--global-one", "g"]);
        assert_eq!(groups["serve"], vec!["--scoped-one", "s"]);
    }

    #[test]
    fn test_unknown_names_ignored() {
        std::env::set_var("ARGOT_INJ_NOBODY", "x");
        let parser = {
            let mut p = Parser::new();
            p.set_env_name_converter(|var| {
                var.strip_prefix("ARGOT_INJ_")
                    .map(|rest| rest.to_ascii_lowercase())
            });
            p
        };
        assert!(collect(&parser).is_empty());
        std::env::remove_var("ARGOT_INJ_NOBODY");
    }
}
