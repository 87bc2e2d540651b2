//! Parsing Engine
//!
//! Single pass over the token stream with structured state:
//! - a command-context stack (most specific on top) that flags resolve
//!   against, falling back to the global scope
//! - a subcommand-expectation queue fed by non-terminal commands
//! - the positional binder for tokens that are neither flags nor commands
//!
//! The prelude installs meta-flags, probes the language, short-circuits on
//! auto-help and injects environment-derived flags. The postlude finalizes
//! positionals, runs validation, optionally drains the callback queue,
//! prompts for secure values and prints the version.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Write;
use std::sync::Arc;

use regex_lite::Regex;

use crate::errors::ParseError;
use crate::i18n::language;
use crate::parser::{envinject, meta, positional, posix, validation, Parser};
use crate::pipeline;
use crate::stream::ArgStream;
use crate::suggestions::{self, Candidate};
use crate::symbols::flag::FlagType;
use crate::symbols::registry::split_key;

lazy_static::lazy_static! {
    /// Indexed slice paths: `name.0` or `name.0.field`.
    static ref SLICE_PATH_RE: Regex = Regex::new(r"^(.+?)\.([0-9]+)(?:\.(.+))?$").unwrap();
}

/// Mutable engine state for one parse invocation.
pub(crate) struct EngineState {
    /// Open command paths, most recent (most specific) last.
    pub context_stack: Vec<String>,
    /// Subcommand name sets awaiting a match, oldest first.
    pub expectations: VecDeque<Vec<String>>,
    /// Flag keys whose positional slot has been filled.
    pub filled_slots: HashSet<String>,
    /// Command whose `exec_on_parse` callback is waiting for its flags.
    pub pending_exec: Option<String>,
    /// Environment injections not yet spliced in, grouped by command path.
    pub env_groups: HashMap<String, Vec<String>>,
}

impl EngineState {
    fn new(env_groups: HashMap<String, Vec<String>>) -> Self {
        Self {
            context_stack: Vec::new(),
            expectations: VecDeque::new(),
            filled_slots: HashSet::new(),
            pending_exec: None,
            env_groups,
        }
    }
}

/// Split `name.0.field` into the base flag name and the index part.
pub(crate) fn split_slice_path(name: &str) -> (String, Option<(usize, Option<String>)>) {
    if let Some(caps) = SLICE_PATH_RE.captures(name) {
        let base = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
        let index = caps.get(2).and_then(|m| m.as_str().parse::<usize>().ok());
        let sub = caps.get(3).map(|m| m.as_str().to_string());
        if let Some(index) = index {
            return (base, Some((index, sub)));
        }
    }
    (name.to_string(), None)
}

/// Insert the slice index into a registry key: `tag@serve` + 0 → `tag.0@serve`.
fn indexed_key(key: &str, index: usize, sub: Option<&str>) -> String {
    let (name, path) = split_key(key);
    let mut out = format!("{}.{}", name, index);
    if let Some(sub) = sub {
        out.push('.');
        out.push_str(sub);
    }
    if !path.is_empty() {
        out.push('@');
        out.push_str(path);
    }
    out
}

fn parses_as_bool(token: &str) -> bool {
    matches!(
        token.trim(),
        "1" | "t" | "T" | "true" | "TRUE" | "True" | "0" | "f" | "F" | "false" | "FALSE" | "False"
    )
}

impl Parser {
    /// Parse the process arguments (`std::env::args`).
    pub fn parse(&mut self) -> bool {
        let args: Vec<String> = std::env::args().collect();
        self.parse_args(args)
    }

    /// Parse an explicit argument vector. Returns overall success; errors
    /// are collected and retrieved via [`Parser::errors`].
    pub fn parse_args<I, S>(&mut self, args: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args: Vec<String> = args.into_iter().map(Into::into).collect();
        self.reset_parse_state();

        // Strip a leading argv[0]-equivalent.
        if let (Some(first), Some(argv0)) = (args.first(), std::env::args().next()) {
            if *first == argv0 {
                args.remove(0);
            }
        }

        meta::register_meta_flags(self);

        if self.auto_language {
            if let Some(tag) = language::detect_language(
                &args,
                &self.language_names,
                &self.prefixes,
                &self.lang_env_var,
                self.check_system_locale,
            ) {
                self.language = tag;
            }
            // When the language flag is ours (auto-installed), the selector
            // has done its job; scrub it so the main loop and the help
            // sub-parser never see it. A user-owned language flag keeps its
            // tokens.
            let auto_owned = self
                .language_names
                .first()
                .map(|n| self.auto_registered.contains(n))
                .unwrap_or(false);
            if auto_owned
                && language::argv_language(&args, &self.language_names, &self.prefixes).is_some()
            {
                args = language::filter_language_flags(&args, &self.language_names, &self.prefixes);
                if let Some(name) = self.language_names.first().cloned() {
                    let tag = self.language.to_string();
                    self.options.insert(name, tag);
                }
            }
        }

        if self.auto_help && self.auto_help_requested(&args) {
            self.help_shown = true;
            self.render_help(false);
            (self.end_hook)(0);
            return true;
        }

        let mut state = EngineState::new(envinject::collect(self));
        let mut stream = ArgStream::new(args);
        if let Some(globals) = state.env_groups.remove("") {
            stream.insert_args_at(0, globals);
        }

        while stream.advance() {
            let token = stream.current().unwrap_or("").to_string();
            self.process_token(&mut stream, &mut state, &token);
        }

        if let Some(path) = state.pending_exec.take() {
            self.execute_single(&path);
        }
        positional::finalize(self, &mut state);
        self.report_missing_subcommands();
        validation::run(self);

        if self.errors.is_empty() && self.execute_commands_on_parse {
            self.execute_commands();
        }
        self.process_secure_requests();
        self.maybe_print_version();

        if let Some(hook) = self.validation_hook.clone() {
            if let Err(e) = hook(self) {
                self.errors.push(e);
            }
        }
        self.errors.is_empty()
    }

    /// The argument stream the external help sub-parser should consume:
    /// language selector flags are scrubbed so they never read as help
    /// topics.
    pub fn help_stream(&self, args: &[String]) -> Vec<String> {
        language::filter_language_flags(args, &self.language_names, &self.prefixes)
    }

    fn reset_parse_state(&mut self) {
        self.options.clear();
        self.raw_args.clear();
        self.repeated.clear();
        self.positionals.clear();
        self.errors.clear();
        self.warnings.clear();
        self.observed_commands.clear();
        self.callback_queue.clear();
        self.subcommand_errors.clear();
        self.secure_queue.clear();
        self.help_shown = false;
        self.version_shown = false;
    }

    fn auto_help_requested(&self, args: &[String]) -> bool {
        args.iter().any(|token| {
            if !self.is_flag_token(token) {
                return false;
            }
            let (name, _) = self.split_flag_name(token);
            self.help_names.iter().any(|h| h == &name) && self.auto_registered.contains(&name)
        })
    }

    fn process_token(&mut self, stream: &mut ArgStream, state: &mut EngineState, token: &str) {
        if self.is_flag_token(token) {
            if self.posix && posix::try_rewrite(self, stream, state, token) {
                return;
            }
            self.handle_flag_token(stream, state, token);
        } else if let Some(path) = self.match_command(state, token) {
            self.enter_command(stream, state, path);
        } else {
            let argv_index = stream.pos().saturating_sub(1);
            positional::bind_token(self, state, token, argv_index);
        }
    }

    /// Flag discrimination: a leading prefix rune makes a flag, except for
    /// parseable negative numbers and bare prefix runs.
    pub(crate) fn is_flag_token(&self, token: &str) -> bool {
        let mut rest = token;
        let mut stripped = 0;
        while stripped < 2 {
            match rest.chars().next() {
                Some(c) if self.prefixes.contains(&c) => {
                    rest = &rest[c.len_utf8()..];
                    stripped += 1;
                }
                _ => break,
            }
        }
        if stripped == 0 || rest.is_empty() {
            return false;
        }
        // `-1`, `-3.14` are values, not flags.
        token.parse::<f64>().is_err()
    }

    /// Strip prefix runes and split an inline `=value`.
    pub(crate) fn split_flag_name(&self, token: &str) -> (String, Option<String>) {
        let mut rest = token;
        let mut stripped = 0;
        while stripped < 2 {
            match rest.chars().next() {
                Some(c) if self.prefixes.contains(&c) => {
                    rest = &rest[c.len_utf8()..];
                    stripped += 1;
                }
                _ => break,
            }
        }
        match rest.split_once('=') {
            Some((name, value)) => (name.to_string(), Some(value.to_string())),
            None => (rest.to_string(), None),
        }
    }

    fn handle_flag_token(&mut self, stream: &mut ArgStream, state: &mut EngineState, token: &str) {
        let (raw_name, inline) = self.split_flag_name(token);
        let (base_name, slice_index) = split_slice_path(&raw_name);

        // Narrowest context first; every open context that defines the name
        // records the value, only the first consumes tokens.
        let mut matched: Vec<String> = Vec::new();
        for ctx in state.context_stack.iter().rev() {
            if let Some(key) = self.resolve_flag(&base_name, ctx) {
                if !matched.contains(&key) {
                    matched.push(key);
                }
            }
        }
        if matched.is_empty() {
            if let Some(key) = self.resolve_flag(&base_name, "") {
                matched.push(key);
            }
        }
        if matched.is_empty() {
            let suggestions = self.flag_suggestions(&base_name);
            self.errors.push(ParseError::UnknownFlag {
                name: base_name,
                suggestions,
            });
            return;
        }

        let value = match self.capture_value(stream, state, &matched[0], inline) {
            Ok(v) => v,
            Err(e) => {
                self.errors.push(e);
                return;
            }
        };
        for key in matched {
            self.apply_flag_value(&key, &value, slice_index.clone());
        }
    }

    /// Resolve a flag name in one context: long form, short form, then the
    /// translation registry (re-trying both forms with the canonical name).
    pub(crate) fn resolve_flag(&self, name: &str, context: &str) -> Option<String> {
        if let Some(key) = self.flags.lookup_long(name, context) {
            return Some(key);
        }
        if let Some(key) = self.flags.lookup_short(name, context) {
            return Some(key);
        }
        if let Some(canonical) = self
            .translations
            .flag_canonical(&self.catalog, &self.language, name)
        {
            if let Some(key) = self.flags.lookup_long(&canonical, context) {
                return Some(key);
            }
            if let Some(key) = self.flags.lookup_short(&canonical, context) {
                return Some(key);
            }
        }
        None
    }

    /// Resolve the value token for a flag according to its type.
    fn capture_value(
        &mut self,
        stream: &mut ArgStream,
        state: &EngineState,
        key: &str,
        inline: Option<String>,
    ) -> Result<String, ParseError> {
        let flag_rc = self.flag_by_key(key).expect("resolved flag key");
        let (flag_type, default_value, name, is_secure) = {
            let f = flag_rc.borrow();
            (
                f.flag_type,
                f.default_value.clone(),
                f.name.clone(),
                f.secure.is_some(),
            )
        };

        if flag_type == FlagType::Standalone {
            if let Some(v) = inline {
                return Ok(v);
            }
            // A following parseable-boolean token belongs to the flag.
            if let Some(next) = stream.peek() {
                if parses_as_bool(next) {
                    let v = next.to_string();
                    stream.skip();
                    return Ok(v);
                }
            }
            return Ok("true".to_string());
        }

        let raw = if let Some(v) = inline {
            Some(v)
        } else {
            match stream.peek() {
                Some(next) if !self.is_flag_token(next) => {
                    let v = next.to_string();
                    stream.skip();
                    Some(v)
                }
                Some(next) => {
                    if default_value.is_some() {
                        // Default used, flag-shaped token left for later.
                        None
                    } else if !self.flag_token_known(next, state) {
                        let v = next.to_string();
                        stream.skip();
                        Some(v)
                    } else {
                        return Err(ParseError::FlagExpectsValue { name });
                    }
                }
                None => None,
            }
        };

        let value = match raw {
            Some(v) => v,
            None => default_value.ok_or(ParseError::FlagExpectsValue { name: name.clone() })?,
        };
        if is_secure && value.is_empty() {
            return Err(ParseError::SecureFlagExpectsValue { name });
        }
        if flag_type == FlagType::File {
            return self.read_file_flag(&value);
        }
        Ok(value)
    }

    /// Whether a flag-shaped token resolves to a registered flag in the
    /// current context stack or globally.
    fn flag_token_known(&self, token: &str, state: &EngineState) -> bool {
        let (name, _) = self.split_flag_name(token);
        if name.is_empty() {
            return false;
        }
        let (base, _) = split_slice_path(&name);
        state
            .context_stack
            .iter()
            .rev()
            .any(|ctx| self.resolve_flag(&base, ctx).is_some())
            || self.resolve_flag(&base, "").is_some()
    }

    /// File flags: the value is a path; `${EXEC_DIR}` expands to the
    /// executable's directory; the canonicalized target must be an existing
    /// regular file, whose contents become the flag's value.
    fn read_file_flag(&self, raw: &str) -> Result<String, ParseError> {
        let expanded = if raw.contains("${EXEC_DIR}") {
            let exec_dir = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.to_path_buf()))
                .unwrap_or_default();
            raw.replace("${EXEC_DIR}", &exec_dir.to_string_lossy())
        } else {
            raw.to_string()
        };
        let path = std::path::Path::new(&expanded)
            .canonicalize()
            .map_err(|_| ParseError::NotFoundPath {
                path: expanded.clone(),
            })?;
        if path.is_dir() {
            return Err(ParseError::NotFilePath {
                path: path.display().to_string(),
            });
        }
        std::fs::read_to_string(&path)
            .map(|s| s.trim_end_matches(['\n', '\r']).to_string())
            .map_err(|e| ParseError::FileOperation {
                path: path.display().to_string(),
                message: e.to_string(),
            })
    }

    /// Store a processed value and write through the binding, if any.
    pub(crate) fn apply_flag_value(
        &mut self,
        key: &str,
        raw: &str,
        index: Option<(usize, Option<String>)>,
    ) {
        let Some(flag_rc) = self.flag_by_key(key) else {
            return;
        };
        let (flag_type, capacity, name) = {
            let f = flag_rc.borrow();
            (f.flag_type, f.capacity, f.name.clone())
        };

        let store_key = match &index {
            Some((i, sub)) => indexed_key(key, *i, sub.as_deref()),
            None => key.to_string(),
        };
        if let Some((i, _)) = &index {
            if let Some(cap) = capacity {
                if *i >= cap {
                    self.errors.push(ParseError::IndexOutOfBounds {
                        key: key.to_string(),
                        index: *i,
                        capacity: cap,
                    });
                    return;
                }
            }
        }

        self.raw_args
            .entry(store_key.clone())
            .or_default()
            .push(raw.to_string());

        let delimiter = Arc::clone(&self.list_delimiter);
        let processed = {
            let f = flag_rc.borrow();
            pipeline::process_value(&f, raw, delimiter.as_ref())
        };
        let processed = match processed {
            Ok(v) => v,
            Err(e) => {
                self.errors.push(e);
                return;
            }
        };

        let stored = match self.options.get(&store_key) {
            Some(existing) => {
                self.repeated.insert(store_key.clone());
                if flag_type == FlagType::Chained {
                    format!("{}|{}", existing, processed)
                } else {
                    processed
                }
            }
            None => processed,
        };
        self.options.insert(store_key.clone(), stored.clone());

        let assign_result = match &index {
            Some((i, None)) => self.bindings.get(key).map(|b| b.assign_index(*i, &stored)),
            // Nested sub-paths live in the options map only.
            Some((_, Some(_))) => None,
            None => self.bindings.get(key).map(|b| b.assign(&stored)),
        };
        if let Some(Err(cause)) = assign_result {
            self.errors.push(ParseError::ProcessingFlag {
                name,
                cause: Box::new(cause),
            });
        }
    }

    /// Whether `token` names a command valid in the current position: a
    /// subcommand of the pending expectation, or a fresh root command.
    fn match_command(&self, state: &EngineState, token: &str) -> Option<String> {
        if let Some(expected) = state.expectations.front() {
            let parent = state.context_stack.last()?;
            let name = self.resolve_command_name(token, Some(expected))?;
            Some(format!("{} {}", parent, name))
        } else {
            let name = self.resolve_command_name(token, None)?;
            self.commands.get(&name).map(|e| e.path.clone())
        }
    }

    fn resolve_command_name(&self, token: &str, allowed: Option<&Vec<String>>) -> Option<String> {
        if self.command_name_valid(token, allowed) {
            return Some(token.to_string());
        }
        self.translations
            .command_canonical(&self.catalog, &self.language, token)
            .filter(|canonical| self.command_name_valid(canonical, allowed))
    }

    fn command_name_valid(&self, name: &str, allowed: Option<&Vec<String>>) -> bool {
        match allowed {
            Some(list) => list.iter().any(|n| n == name),
            None => self
                .commands
                .get(name)
                .map_or(false, |e| !e.path.contains(' ')),
        }
    }

    fn enter_command(&mut self, stream: &mut ArgStream, state: &mut EngineState, path: String) {
        let Some(entry) = self.commands.get(&path).cloned() else {
            return;
        };

        state.expectations.pop_front();
        if entry.is_terminal() {
            state.expectations.clear();
        } else {
            state.expectations.push_back(entry.children.clone());
        }
        state.context_stack.push(path.clone());
        self.observed_commands.insert(path.clone());

        // Environment variables scoped to this command join the stream now.
        if let Some(pairs) = state.env_groups.remove(&path) {
            stream.insert_args_at(stream.pos(), pairs);
        }

        // An earlier exec-on-parse command has seen all its tokens by now.
        if let Some(prev) = state.pending_exec.take() {
            self.execute_single(&prev);
        }
        if entry.callback.is_some() {
            if entry.exec_on_parse || self.callbacks_on_parse {
                state.pending_exec = Some(path);
            } else {
                self.callback_queue.push_back(path);
            }
        }
    }

    fn report_missing_subcommands(&mut self) {
        let observed: Vec<String> = self.observed_commands.iter().cloned().collect();
        let mut missing = Vec::new();
        for path in &observed {
            let Some(entry) = self.commands.get(path) else {
                continue;
            };
            if entry.is_terminal() {
                continue;
            }
            let has_child = observed.iter().any(|q| {
                q.len() > path.len()
                    && q.starts_with(path.as_str())
                    && q.as_bytes()[path.len()] == b' '
            });
            if !has_child {
                missing.push(path.clone());
            }
        }
        for path in missing {
            if self.subcommand_errors.insert(path.clone()) {
                self.errors.push(ParseError::CommandExpectsSubcommand { path });
            }
        }
    }

    pub(crate) fn flag_suggestions(&self, input: &str) -> Option<String> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for (_, flag) in self.flags.iter() {
            let name = flag.borrow().name.clone();
            if seen.insert(name.clone()) {
                let translated =
                    self.translations
                        .flag_translated(&self.catalog, &self.language, &name);
                candidates.push(match translated {
                    Some(t) => Candidate::translated(name, t),
                    None => Candidate::plain(name),
                });
            }
        }
        let list = suggestions::suggest(input, &candidates, self.suggestion.flag_threshold);
        if list.is_empty() {
            None
        } else {
            Some(self.format_suggestions(&list))
        }
    }

    pub(crate) fn command_suggestions(&self, input: &str) -> Option<String> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for (_, entry) in self.commands.iter() {
            if seen.insert(entry.name.clone()) {
                let translated = self.translations.command_translated(
                    &self.catalog,
                    &self.language,
                    &entry.name,
                );
                candidates.push(match translated {
                    Some(t) => Candidate::translated(entry.name.clone(), t),
                    None => Candidate::plain(entry.name.clone()),
                });
            }
        }
        let list = suggestions::suggest(input, &candidates, self.suggestion.command_threshold);
        if list.is_empty() {
            None
        } else {
            Some(self.format_suggestions(&list))
        }
    }

    fn format_suggestions(&self, list: &[String]) -> String {
        match &self.suggestion_formatter {
            Some(f) => f(list),
            None => suggestions::default_format(list),
        }
    }

    fn maybe_print_version(&mut self) {
        if !self.auto_version {
            return;
        }
        let Some(name) = self.version_names.first().cloned() else {
            return;
        };
        if !self.auto_registered.contains(&name) {
            return;
        }
        if self.options.get(&name).map(|v| v == "true").unwrap_or(false) {
            let version = self.version.clone().unwrap_or_else(|| "unknown".to_string());
            let _ = writeln!(self.stdout, "{}", version);
            let _ = self.stdout.flush();
            self.version_shown = true;
        }
    }

    fn process_secure_requests(&mut self) {
        if self.secure_queue.is_empty() {
            return;
        }
        let requests = std::mem::take(&mut self.secure_queue);
        for request in requests {
            let prompt = if request.prompt.is_empty() {
                let (name, _) = split_key(&request.flag_key);
                self.catalog.message(
                    &self.language,
                    "argot.msg.secure_prompt",
                    &[name.to_string()],
                )
            } else {
                request.prompt.clone()
            };
            match self.secure_reader.read_secret(&prompt) {
                Ok(value) if !value.is_empty() => {
                    self.apply_flag_value(&request.flag_key, &value, None)
                }
                _ => {
                    let (name, _) = split_key(&request.flag_key);
                    self.errors.push(ParseError::SecureFlagExpectsValue {
                        name: name.to_string(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::LangTag;
    use crate::pipeline::convert::Binding;
    use crate::secure::QueuedReader;
    use crate::symbols::{Command, Flag};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn quiet_parser() -> Parser {
        let mut parser = Parser::new();
        parser.set_end_hook(|_| {});
        parser.set_stdout(Box::new(std::io::sink()));
        parser.set_stderr(Box::new(std::io::sink()));
        parser
    }

    /// Shared byte buffer standing in for stdout/stderr in tests.
    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.borrow()).into_owned()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_global_flag_and_command_scoped_flag() {
        // Scenario: greet --name Alice with a global standalone -v.
        let mut parser = quiet_parser();
        parser
            .add_flag(Flag::new("verbose").with_short("v").standalone())
            .unwrap();
        parser
            .add_flag_to(Flag::new("name").with_default("World"), &["greet"])
            .unwrap();
        parser.add_command(Command::new("greet")).unwrap();

        assert!(parser.parse_args(["greet", "--name", "Alice", "-v"]));
        assert_eq!(parser.get("verbose"), Some("true"));
        assert_eq!(parser.get_in("name", &["greet"]), Some("Alice"));
        assert!(parser.was_command_seen("greet"));
        assert_eq!(
            parser.observed_commands().collect::<Vec<_>>(),
            vec!["greet"]
        );
    }

    #[test]
    fn test_inline_value_form() {
        let mut parser = quiet_parser();
        parser.add_flag(Flag::new("output").with_short("o")).unwrap();
        assert!(parser.parse_args(["--output=result.txt"]));
        assert_eq!(parser.get("output"), Some("result.txt"));

        assert!(parser.parse_args(["-o", "other.txt"]));
        assert_eq!(parser.get("output"), Some("other.txt"));
    }

    #[test]
    fn test_negative_number_is_a_value() {
        let mut parser = quiet_parser();
        parser.add_flag(Flag::new("offset")).unwrap();
        assert!(parser.parse_args(["--offset", "-3.14"]));
        assert_eq!(parser.get("offset"), Some("-3.14"));
    }

    #[test]
    fn test_standalone_consumes_boolean_token() {
        let mut parser = quiet_parser();
        parser.add_flag(Flag::new("force").standalone()).unwrap();
        assert!(parser.parse_args(["--force", "false"]));
        assert_eq!(parser.get("force"), Some("false"));
        // Free-standing positionals are untouched by standalone flags.
        assert!(parser.positional_args().is_empty());
    }

    #[test]
    fn test_unknown_flag_gets_suggestions() {
        let mut parser = quiet_parser();
        parser.add_flag(Flag::new("verbose")).unwrap();
        assert!(!parser.parse_args(["--verbos"]));
        match &parser.errors()[0] {
            ParseError::UnknownFlag { name, suggestions } => {
                assert_eq!(name, "verbos");
                assert_eq!(suggestions.as_deref(), Some("[verbose]"));
            }
            other => panic!("expected UnknownFlag, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_command_distance_one_suppresses_two() {
        // Scenario: serve/server/service registered, "serv" typed.
        let mut parser = quiet_parser();
        parser.add_command(Command::new("serve")).unwrap();
        parser.add_command(Command::new("server")).unwrap();
        parser.add_command(Command::new("service")).unwrap();

        assert!(!parser.parse_args(["serv"]));
        let unknowns: Vec<_> = parser
            .errors()
            .iter()
            .filter(|e| matches!(e, ParseError::UnknownCommand { suggestions: None, .. }))
            .collect();
        assert_eq!(unknowns.len(), 1);
        let with_suggestions = parser
            .errors()
            .iter()
            .find_map(|e| match e {
                ParseError::UnknownCommand {
                    suggestions: Some(s),
                    ..
                } => Some(s.clone()),
                _ => None,
            })
            .expect("suggestion error present");
        assert!(with_suggestions.contains("serve"));
        assert!(!with_suggestions.contains("server"));
        assert!(!with_suggestions.contains("service"));
    }

    #[test]
    fn test_repeated_chained_flag_accumulates() {
        let mut parser = quiet_parser();
        let tags: Binding<Vec<String>> = Binding::default();
        parser
            .bind_flag(&tags, Flag::new("tag").chained())
            .unwrap();

        assert!(parser.parse_args(["--tag", "x", "--tag", "y", "--tag", "z"]));
        assert_eq!(parser.get("tag"), Some("x|y|z"));
        assert_eq!(tags.get(), vec!["x", "y", "z"]);
        assert!(parser.was_repeated("tag"));

        // Same bound slice as one delimited value.
        let single: Binding<Vec<String>> = Binding::default();
        let mut parser2 = quiet_parser();
        parser2
            .bind_flag(&single, Flag::new("tag").chained())
            .unwrap();
        assert!(parser2.parse_args(["--tag", "x|y|z"]));
        assert_eq!(single.get(), tags.get());
    }

    #[test]
    fn test_repeated_single_flag_last_wins() {
        let mut parser = quiet_parser();
        parser.add_flag(Flag::new("mode")).unwrap();
        assert!(parser.parse_args(["--mode", "a", "--mode", "b"]));
        assert_eq!(parser.get("mode"), Some("b"));
        assert!(parser.was_repeated("mode"));
        assert_eq!(parser.raw_values("mode").unwrap(), ["a", "b"]);
    }

    #[test]
    fn test_short_flags_isolated_by_context() {
        // Same letter in disjoint command contexts never shadows.
        let mut parser = quiet_parser();
        parser.add_command(Command::new("alpha")).unwrap();
        parser.add_command(Command::new("beta")).unwrap();
        parser
            .add_flag_to(Flag::new("across").with_short("x").standalone(), &["alpha"])
            .unwrap();
        parser
            .add_flag_to(Flag::new("buckle").with_short("x").standalone(), &["beta"])
            .unwrap();

        assert!(parser.parse_args(["alpha", "-x"]));
        assert_eq!(parser.get_in("across", &["alpha"]), Some("true"));
        assert_eq!(parser.get_in("buckle", &["beta"]), None);

        assert!(parser.parse_args(["beta", "-x"]));
        assert_eq!(parser.get_in("buckle", &["beta"]), Some("true"));
        assert_eq!(parser.get_in("across", &["alpha"]), None);
    }

    #[test]
    fn test_shared_flag_name_across_contexts_takes_one_value() {
        // A name defined at two open nesting levels: one value satisfies
        // both, only the narrowest consumes the token.
        let mut parser = quiet_parser();
        parser
            .add_command(Command::new("serve").with_subcommand(Command::new("users")))
            .unwrap();
        parser
            .add_flag_to(Flag::new("limit"), &["serve"])
            .unwrap();
        parser
            .add_flag_to(Flag::new("limit"), &["serve", "users"])
            .unwrap();

        assert!(parser.parse_args(["serve", "users", "--limit", "10"]));
        assert_eq!(parser.get_in("limit", &["serve", "users"]), Some("10"));
        assert_eq!(parser.get_in("limit", &["serve"]), Some("10"));
    }

    #[test]
    fn test_flag_value_from_deeper_context_falls_back_to_ancestor() {
        let mut parser = quiet_parser();
        parser
            .add_command(Command::new("serve").with_subcommand(Command::new("users")))
            .unwrap();
        parser.add_flag_to(Flag::new("port"), &["serve"]).unwrap();

        assert!(parser.parse_args(["serve", "users", "--port", "9000"]));
        assert_eq!(parser.get_in("port", &["serve"]), Some("9000"));
    }

    #[test]
    fn test_posix_cluster_equivalence() {
        // -abc 42 == -a -b -c 42 with a,b standalone and c single.
        let mut parser = quiet_parser();
        parser.set_posix_mode(true);
        parser.add_flag(Flag::new("all").with_short("a").standalone()).unwrap();
        parser.add_flag(Flag::new("brief").with_short("b").standalone()).unwrap();
        parser.add_flag(Flag::new("count").with_short("c")).unwrap();

        assert!(parser.parse_args(["-abc", "42"]));
        assert_eq!(parser.get("all"), Some("true"));
        assert_eq!(parser.get("brief"), Some("true"));
        assert_eq!(parser.get("count"), Some("42"));

        let mut spelled = quiet_parser();
        spelled.set_posix_mode(true);
        spelled.add_flag(Flag::new("all").with_short("a").standalone()).unwrap();
        spelled.add_flag(Flag::new("brief").with_short("b").standalone()).unwrap();
        spelled.add_flag(Flag::new("count").with_short("c")).unwrap();
        assert!(spelled.parse_args(["-a", "-b", "-c", "42"]));
        assert_eq!(spelled.get("all"), parser.get("all"));
        assert_eq!(spelled.get("brief"), parser.get("brief"));
        assert_eq!(spelled.get("count"), parser.get("count"));
    }

    #[test]
    fn test_posix_short_with_attached_value() {
        let mut parser = quiet_parser();
        parser.set_posix_mode(true);
        parser.add_flag(Flag::new("output").with_short("o")).unwrap();
        assert!(parser.parse_args(["-ofoo"]));
        assert_eq!(parser.get("output"), Some("foo"));
    }

    #[test]
    fn test_flag_expects_value() {
        let mut parser = quiet_parser();
        parser.add_flag(Flag::new("output")).unwrap();
        parser.add_flag(Flag::new("verbose").standalone()).unwrap();
        assert!(!parser.parse_args(["--output", "--verbose"]));
        assert!(matches!(
            parser.errors()[0],
            ParseError::FlagExpectsValue { .. }
        ));
    }

    #[test]
    fn test_default_used_when_next_token_is_flag() {
        let mut parser = quiet_parser();
        parser
            .add_flag(Flag::new("level").with_default("info"))
            .unwrap();
        parser.add_flag(Flag::new("verbose").standalone()).unwrap();
        assert!(parser.parse_args(["--level", "--verbose"]));
        assert_eq!(parser.get("level"), Some("info"));
        assert_eq!(parser.get("verbose"), Some("true"));
    }

    #[test]
    fn test_translated_flag_and_command_names() {
        let fr = LangTag::parse("fr").unwrap();
        let mut parser = quiet_parser();
        parser
            .add_user_locale(
                &fr,
                r#"{"app.cmd.serve": "servir", "app.flag.output": "sortie"}"#,
            )
            .unwrap();
        parser
            .add_command(Command::new("serve").with_name_key("app.cmd.serve"))
            .unwrap();
        parser
            .add_flag_to(
                Flag::new("output").with_name_key("app.flag.output"),
                &["serve"],
            )
            .unwrap();

        assert!(parser.parse_args(["--lang", "fr", "servir", "--sortie", "x.txt"]));
        assert!(parser.was_command_seen("serve"));
        assert_eq!(parser.get_in("output", &["serve"]), Some("x.txt"));
        assert_eq!(parser.language().base(), "fr");
    }

    #[test]
    fn test_error_rendered_after_language_switch() {
        // The diagnostic is created during parse but rendered afterwards in
        // the language selected on the same command line.
        let fr = LangTag::parse("fr").unwrap();
        let mut parser = quiet_parser();
        parser
            .add_locale(
                &fr,
                r#"{"argot.msg.required_flag_missing": "indicateur requis : %[1]s"}"#,
            )
            .unwrap();
        parser.add_flag(Flag::new("db").required()).unwrap();

        assert!(!parser.parse_args(["--lang", "fr"]));
        let rendered = parser.render_errors();
        assert_eq!(rendered, vec!["indicateur requis : db"]);
    }

    #[test]
    fn test_env_injection_global() {
        std::env::set_var("ARGOT_TEST_RETRIES", "5");
        let mut parser = quiet_parser();
        parser.add_flag(Flag::new("retries")).unwrap();
        parser.set_env_name_converter(|var| {
            var.strip_prefix("ARGOT_TEST_")
                .map(|rest| rest.to_ascii_lowercase())
        });
        assert!(parser.parse_args(Vec::<String>::new()));
        std::env::remove_var("ARGOT_TEST_RETRIES");
        assert_eq!(parser.get("retries"), Some("5"));
    }

    #[test]
    fn test_env_injection_explicit_argv_wins() {
        std::env::set_var("ARGOT_TEST_WORKERS", "2");
        let mut parser = quiet_parser();
        parser.add_flag(Flag::new("workers")).unwrap();
        parser.set_env_name_converter(|var| {
            var.strip_prefix("ARGOT_TEST_")
                .map(|rest| rest.to_ascii_lowercase())
        });
        assert!(parser.parse_args(["--workers", "8"]));
        std::env::remove_var("ARGOT_TEST_WORKERS");
        // Injected at stream head; explicit occurrence parsed later wins.
        assert_eq!(parser.get("workers"), Some("8"));
    }

    #[test]
    fn test_env_injection_command_scoped() {
        std::env::set_var("ARGOT_TEST_PORT", "7070");
        let mut parser = quiet_parser();
        parser.add_command(Command::new("serve")).unwrap();
        parser.add_flag_to(Flag::new("port"), &["serve"]).unwrap();
        parser.set_env_name_converter(|var| {
            var.strip_prefix("ARGOT_TEST_")
                .map(|rest| rest.to_ascii_lowercase())
        });

        // Without the command, nothing is injected.
        assert!(parser.parse_args(Vec::<String>::new()));
        assert_eq!(parser.get_in("port", &["serve"]), None);

        assert!(parser.parse_args(["serve"]));
        std::env::remove_var("ARGOT_TEST_PORT");
        assert_eq!(parser.get_in("port", &["serve"]), Some("7070"));
    }

    #[test]
    fn test_callback_queue_and_execution() {
        let trace = Rc::new(RefCell::new(Vec::new()));
        let mut parser = quiet_parser();
        let seen = Rc::clone(&trace);
        parser
            .add_command(Command::new("deploy").with_callback(move |p, cmd| {
                seen.borrow_mut().push(format!(
                    "{}:{}",
                    cmd.path,
                    p.get_in("env", &["deploy"]).unwrap_or("?")
                ));
                Ok(())
            }))
            .unwrap();
        parser.add_flag_to(Flag::new("env"), &["deploy"]).unwrap();

        assert!(parser.parse_args(["deploy", "--env", "staging"]));
        assert!(trace.borrow().is_empty());
        assert_eq!(parser.execute_commands(), 0);
        assert_eq!(*trace.borrow(), vec!["deploy:staging"]);
    }

    #[test]
    fn test_exec_on_parse_sees_flags_of_its_command() {
        let captured = Rc::new(RefCell::new(String::new()));
        let mut parser = quiet_parser();
        let slot = Rc::clone(&captured);
        parser
            .add_command(
                Command::new("migrate")
                    .exec_on_parse()
                    .with_callback(move |p, _| {
                        *slot.borrow_mut() =
                            p.get_in("target", &["migrate"]).unwrap_or("").to_string();
                        Ok(())
                    }),
            )
            .unwrap();
        parser.add_flag_to(Flag::new("target"), &["migrate"]).unwrap();

        assert!(parser.parse_args(["migrate", "--target", "v42"]));
        // Executed during parse, after its flags were consumed.
        assert_eq!(*captured.borrow(), "v42");
        assert_eq!(parser.execute_commands(), 0);
    }

    #[test]
    fn test_callback_error_collected() {
        let mut parser = quiet_parser();
        parser
            .add_command(Command::new("fail").with_callback(|_, _| Err("nope".into())))
            .unwrap();
        assert!(parser.parse_args(["fail"]));
        assert_eq!(parser.execute_commands(), 1);
        assert!(matches!(
            parser.errors()[0],
            ParseError::CommandCallback { .. }
        ));
    }

    #[test]
    fn test_non_terminal_command_without_subcommand() {
        let mut parser = quiet_parser();
        parser
            .add_command(Command::new("serve").with_subcommand(Command::new("users")))
            .unwrap();
        assert!(!parser.parse_args(["serve"]));
        let count = parser
            .errors()
            .iter()
            .filter(|e| matches!(e, ParseError::CommandExpectsSubcommand { .. }))
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_nested_subcommand_chain() {
        let mut parser = quiet_parser();
        parser
            .add_command(Command::new("serve").with_subcommand(
                Command::new("users").with_subcommand(Command::new("create")),
            ))
            .unwrap();
        parser
            .add_flag_to(Flag::new("admin").standalone(), &["serve", "users", "create"])
            .unwrap();

        assert!(parser.parse_args(["serve", "users", "create", "--admin"]));
        assert!(parser.was_command_seen("serve"));
        assert!(parser.was_command_seen("serve users"));
        assert!(parser.was_command_seen("serve users create"));
        assert_eq!(
            parser.get_in("admin", &["serve", "users", "create"]),
            Some("true")
        );
    }

    #[test]
    fn test_file_flag_reads_contents() {
        use std::io::Write as _;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "s3cr3t").unwrap();

        let mut parser = quiet_parser();
        parser.add_flag(Flag::new("token-file").file()).unwrap();
        assert!(parser.parse_args(["--token-file", path.to_str().unwrap()]));
        assert_eq!(parser.get("token-file"), Some("s3cr3t"));
    }

    #[test]
    fn test_file_flag_path_errors() {
        let dir = tempfile::tempdir().unwrap();

        let mut parser = quiet_parser();
        parser.add_flag(Flag::new("config").file()).unwrap();
        assert!(!parser.parse_args(["--config", "/definitely/not/here.txt"]));
        assert!(matches!(parser.errors()[0], ParseError::NotFoundPath { .. }));

        assert!(!parser.parse_args(["--config", dir.path().to_str().unwrap()]));
        assert!(matches!(parser.errors()[0], ParseError::NotFilePath { .. }));
    }

    #[test]
    fn test_indexed_slice_assignment() {
        let mut parser = quiet_parser();
        let hosts: Binding<Vec<String>> = Binding::default();
        parser
            .bind_flag(&hosts, Flag::new("host").chained().with_capacity(3))
            .unwrap();

        assert!(parser.parse_args(["--host.0", "a", "--host.2", "c"]));
        assert_eq!(parser.get("host.0"), Some("a"));
        assert_eq!(parser.get("host.2"), Some("c"));
        assert_eq!(hosts.get(), vec!["a", "", "c"]);

        assert!(!parser.parse_args(["--host.7", "x"]));
        assert!(matches!(
            parser.errors()[0],
            ParseError::IndexOutOfBounds { .. }
        ));
    }

    #[test]
    fn test_secure_flag_prompts_after_parse() {
        let mut parser = quiet_parser();
        parser
            .add_flag(Flag::new("password").required().secure("password: "))
            .unwrap();
        parser.set_secure_reader(Box::new(QueuedReader::new(["hunter2"])));

        assert!(parser.parse_args(Vec::<String>::new()));
        assert_eq!(parser.get("password"), Some("hunter2"));
    }

    #[test]
    fn test_version_flag_output() {
        let buf = SharedBuf::default();
        let mut parser = quiet_parser();
        parser.set_stdout(Box::new(buf.clone()));
        parser.set_version("1.4.2");

        assert!(parser.parse_args(["--version"]));
        assert!(parser.was_version_shown());
        assert_eq!(buf.contents(), "1.4.2\n");
    }

    #[test]
    fn test_auto_help_short_circuits() {
        let buf = SharedBuf::default();
        let ended = Rc::new(RefCell::new(None));
        let mut parser = quiet_parser();
        parser.set_stdout(Box::new(buf.clone()));
        let slot = Rc::clone(&ended);
        parser.set_end_hook(move |code| *slot.borrow_mut() = Some(code));
        parser
            .add_flag(Flag::new("verbose").standalone().with_description("noisy"))
            .unwrap();
        parser.add_flag(Flag::new("required-one").required()).unwrap();

        // Returns true even though the required flag is missing.
        assert!(parser.parse_args(["--help"]));
        assert!(parser.was_help_shown());
        assert_eq!(*ended.borrow(), Some(0));
        assert!(buf.contents().contains("--verbose"));
        assert!(parser.errors().is_empty());
    }

    #[test]
    fn test_user_defined_help_flag_wins() {
        // Auto-help must not intrude on a user flag of the same name.
        let mut parser = quiet_parser();
        parser.add_flag(Flag::new("help")).unwrap();
        assert!(parser.parse_args(["--help", "topics"]));
        assert!(!parser.was_help_shown());
        assert_eq!(parser.get("help"), Some("topics"));
    }

    #[test]
    fn test_determinism_same_input_same_products() {
        let run = || {
            let mut parser = quiet_parser();
            parser.add_flag(Flag::new("verbose").standalone()).unwrap();
            parser.add_flag(Flag::new("mode").required()).unwrap();
            parser.add_command(Command::new("serve")).unwrap();
            parser.parse_args(["serve", "--verbose", "--bogus"]);
            (
                parser
                    .options
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<Vec<_>>(),
                parser.errors().iter().map(|e| e.to_string()).collect::<Vec<_>>(),
            )
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_help_stream_filters_language_selectors() {
        let parser = quiet_parser();
        let filtered = parser.help_stream(&[
            "--lang".to_string(),
            "fr".to_string(),
            "serve".to_string(),
        ]);
        assert_eq!(filtered, vec!["serve"]);
    }

    #[test]
    fn test_slice_path_parsing() {
        assert_eq!(split_slice_path("tag"), ("tag".to_string(), None));
        assert_eq!(
            split_slice_path("tag.0"),
            ("tag".to_string(), Some((0, None)))
        );
        assert_eq!(
            split_slice_path("tag.3.name"),
            ("tag".to_string(), Some((3, Some("name".to_string()))))
        );
    }
}
