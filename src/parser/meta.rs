//! Meta-Flag Registrar
//!
//! Installs `--help`, `--version` and `--language` before parsing, but only
//! when the configured names are still free: a user-defined flag of the same
//! name always wins. Installed names are recorded so the help pre-scan and
//! the `was_help_shown` predicate only react to flags the parser itself
//! owns. Invoked at the start of every parse; idempotent.

use crate::errors::ParseError;
use crate::parser::Parser;
use crate::symbols::Flag;

enum MetaKind {
    Help,
    Version,
    Language,
}

/// Conditionally install the enabled meta-flags.
pub(crate) fn register_meta_flags(parser: &mut Parser) {
    if parser.auto_help {
        let names = parser.help_names.clone();
        install(parser, &names, MetaKind::Help);
    }
    if parser.auto_version {
        let names = parser.version_names.clone();
        install(parser, &names, MetaKind::Version);
    }
    if parser.auto_language {
        let names = parser.language_names.clone();
        install(parser, &names, MetaKind::Language);
    }
}

fn install(parser: &mut Parser, names: &[String], kind: MetaKind) {
    let Some(long) = names.first().cloned() else {
        return;
    };
    // Already installed by a previous parse on this instance.
    if parser.auto_registered.contains(&long) && parser.flags.contains(&long) {
        return;
    }
    // The long name resolves to a user flag: stay out of the way.
    if parser.resolve_flag(&long, "").is_some() {
        return;
    }
    let short = names
        .iter()
        .skip(1)
        .find(|candidate| parser.resolve_flag(candidate, "").is_none())
        .cloned();

    let mut flag = match kind {
        MetaKind::Help => Flag::new(&long)
            .standalone()
            .with_default("false")
            .with_description_key("argot.msg.flag.help"),
        MetaKind::Version => Flag::new(&long)
            .standalone()
            .with_default("false")
            .with_description_key("argot.msg.flag.version"),
        MetaKind::Language => Flag::new(&long)
            .with_default(parser.language.to_string())
            .with_description_key("argot.msg.flag.language"),
    };
    if let Some(short) = &short {
        flag = flag.with_short(short.clone());
    }

    match parser.flags.add(flag, "") {
        Ok(_) => {
            parser.auto_registered.insert(long);
            if let Some(short) = short {
                parser.auto_registered.insert(short);
            }
        }
        Err(ParseError::ShortFlagConflict { .. }) => {
            // The letter is taken somewhere; install the long form alone.
            let retry = match kind {
                MetaKind::Help => Flag::new(&long)
                    .standalone()
                    .with_default("false")
                    .with_description_key("argot.msg.flag.help"),
                MetaKind::Version => Flag::new(&long)
                    .standalone()
                    .with_default("false")
                    .with_description_key("argot.msg.flag.version"),
                MetaKind::Language => Flag::new(&long)
                    .with_default(parser.language.to_string())
                    .with_description_key("argot.msg.flag.language"),
            };
            if parser.flags.add(retry, "").is_ok() {
                parser.auto_registered.insert(long);
            }
        }
        Err(_) => {}
    }
}
