//! Parser State and Public API
//!
//! The [`Parser`] owns the registries, the options map, the error list and
//! every knob the engine consults. It is constructed once, configured and
//! populated through the registration API, then driven by
//! [`Parser::parse_args`] (in `engine.rs`). Concurrent parses on one
//! instance are not supported; hook mutation is mutex-guarded so setters may
//! be called from other threads between parses.

pub mod engine;
pub mod envinject;
pub mod meta;
pub mod positional;
pub mod posix;
pub mod validation;

use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Write;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use indexmap::{IndexMap, IndexSet};

use crate::callbacks::{CommandHook, HookOrder, HookSet};
use crate::completion::{CompletionCommand, CompletionData, CompletionFlag};
use crate::errors::ParseError;
use crate::i18n::translations::SymbolKind;
use crate::i18n::{LangTag, MessageCatalog, TranslationRegistry};
use crate::pipeline::convert::{AnyBinding, Binding, FromArgValue};
use crate::pipeline::validators;
use crate::pipeline::{default_list_delimiter, ListDelimiterFn};
use crate::secure::{SecureReader, SecureRequest, TerminalReader};
use crate::suggestions::{SuggestionConfig, SuggestionFormatter};
use crate::symbols::registry::flag_key;
use crate::symbols::{Command, CommandRegistry, Flag, FlagRegistry};

pub use positional::PositionalArg;

/// Routing for rendered help text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HelpBehavior {
    /// Always stdout.
    #[default]
    Stdout,
    /// Always stderr.
    Stderr,
    /// Stderr when help is produced in an error context, stdout otherwise.
    Smart,
}

/// Maps an environment variable name to a flag's canonical name.
pub type EnvNameConverter = Arc<dyn Fn(&str) -> Option<String>>;

/// Caller-supplied hook run at the end of validation.
pub type ValidationHook = Arc<dyn Fn(&Parser) -> Result<(), ParseError>>;

/// Hook invoked after auto-help rendered; the default terminates the
/// process. Tests and embedded uses substitute a no-op.
pub type EndHook = Box<dyn FnMut(i32)>;

const DEFAULT_LANG_ENV_VAR: &str = "ARGOT_LANG";
const DEFAULT_MAX_DEPENDENCY_DEPTH: usize = 10;
const DEFAULT_MAX_COMMAND_DEPTH: usize = 100;

pub struct Parser {
    // Symbol state
    pub(crate) flags: FlagRegistry,
    pub(crate) commands: CommandRegistry,
    pub(crate) translations: TranslationRegistry,
    pub(crate) catalog: MessageCatalog,
    pub(crate) bindings: HashMap<String, Box<dyn AnyBinding>>,

    // Parse products
    pub(crate) options: IndexMap<String, String>,
    pub(crate) raw_args: HashMap<String, Vec<String>>,
    pub(crate) repeated: HashSet<String>,
    pub(crate) positionals: Vec<PositionalArg>,
    pub(crate) errors: Vec<ParseError>,
    pub(crate) warnings: Vec<ParseError>,
    pub(crate) observed_commands: IndexSet<String>,
    pub(crate) callback_queue: VecDeque<String>,
    pub(crate) subcommand_errors: HashSet<String>,
    pub(crate) secure_queue: Vec<SecureRequest>,
    pub(crate) help_shown: bool,
    pub(crate) version_shown: bool,

    // Hooks (mutex-guarded; see module docs)
    pub(crate) hooks: Mutex<HookSet>,
    pub(crate) validation_hook: Option<ValidationHook>,

    // Settings
    pub(crate) prefixes: Vec<char>,
    pub(crate) list_delimiter: ListDelimiterFn,
    pub(crate) posix: bool,
    pub(crate) auto_help: bool,
    pub(crate) auto_version: bool,
    pub(crate) auto_language: bool,
    pub(crate) check_system_locale: bool,
    pub(crate) help_names: Vec<String>,
    pub(crate) version_names: Vec<String>,
    pub(crate) language_names: Vec<String>,
    pub(crate) auto_registered: HashSet<String>,
    pub(crate) version: Option<String>,
    pub(crate) app_name: Option<String>,
    pub(crate) language: LangTag,
    pub(crate) lang_env_var: String,
    pub(crate) env_converter: Option<EnvNameConverter>,
    pub(crate) suggestion: SuggestionConfig,
    pub(crate) suggestion_formatter: Option<SuggestionFormatter>,
    pub(crate) max_dependency_depth: usize,
    pub(crate) max_command_depth: usize,
    pub(crate) help_behavior: HelpBehavior,
    pub(crate) callbacks_on_parse: bool,
    pub(crate) execute_commands_on_parse: bool,

    // Collaborators
    pub(crate) stdout: Box<dyn Write>,
    pub(crate) stderr: Box<dyn Write>,
    pub(crate) end_hook: EndHook,
    pub(crate) secure_reader: Box<dyn SecureReader>,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Parser {
            flags: FlagRegistry::new(),
            commands: CommandRegistry::new(),
            translations: TranslationRegistry::new(),
            catalog: MessageCatalog::new(),
            bindings: HashMap::new(),
            options: IndexMap::new(),
            raw_args: HashMap::new(),
            repeated: HashSet::new(),
            positionals: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            observed_commands: IndexSet::new(),
            callback_queue: VecDeque::new(),
            subcommand_errors: HashSet::new(),
            secure_queue: Vec::new(),
            help_shown: false,
            version_shown: false,
            hooks: Mutex::new(HookSet::default()),
            validation_hook: None,
            prefixes: vec!['-'],
            list_delimiter: Arc::new(default_list_delimiter),
            posix: false,
            auto_help: true,
            auto_version: true,
            auto_language: true,
            check_system_locale: false,
            help_names: vec!["help".to_string(), "h".to_string()],
            version_names: vec!["version".to_string(), "v".to_string()],
            language_names: vec![
                "language".to_string(),
                "lang".to_string(),
                "l".to_string(),
            ],
            auto_registered: HashSet::new(),
            version: None,
            app_name: None,
            language: LangTag::english(),
            lang_env_var: DEFAULT_LANG_ENV_VAR.to_string(),
            env_converter: None,
            suggestion: SuggestionConfig::default(),
            suggestion_formatter: None,
            max_dependency_depth: DEFAULT_MAX_DEPENDENCY_DEPTH,
            max_command_depth: DEFAULT_MAX_COMMAND_DEPTH,
            help_behavior: HelpBehavior::default(),
            callbacks_on_parse: false,
            execute_commands_on_parse: false,
            stdout: Box::new(std::io::stdout()),
            stderr: Box::new(std::io::stderr()),
            end_hook: Box::new(|code| std::process::exit(code)),
            secure_reader: Box::new(TerminalReader),
        }
    }

    // ---- registration ------------------------------------------------------

    /// Register a global flag.
    pub fn add_flag(&mut self, flag: Flag) -> Result<(), ParseError> {
        self.add_flag_to(flag, &[])
    }

    /// Register a flag scoped to a command path (`&["serve", "users"]`).
    pub fn add_flag_to(&mut self, mut flag: Flag, path: &[&str]) -> Result<(), ParseError> {
        let path = path.join(" ");

        // Accepted-value patterns become a one-of validator so the validator
        // list is the single source of truth at parse time.
        if !flag.accepted_values.is_empty() {
            let mut accepted = Vec::with_capacity(flag.accepted_values.len());
            for av in &flag.accepted_values {
                accepted.push(validators::regex(&av.pattern, &av.description)?);
            }
            let combined = validators::one_of(accepted);
            let flag_name = flag.name.clone();
            let shown = flag
                .accepted_values
                .iter()
                .map(|av| {
                    if av.description.is_empty() {
                        av.pattern.clone()
                    } else {
                        av.description.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            flag.validators.push(Arc::new(move |value: &str| {
                combined(value).map_err(|_| ParseError::InvalidArgument {
                    name: flag_name.clone(),
                    value: value.to_string(),
                    accepted: shown.clone(),
                })
            }));
        }

        let name = flag.name.clone();
        let name_key = flag.name_key.clone();
        self.flags.add(flag, &path)?;
        if let Some(key) = name_key {
            self.translations.register(SymbolKind::Flag, name, path, key);
        }
        Ok(())
    }

    /// Register a global flag and bind its converted value to `binding`.
    pub fn bind_flag<T>(&mut self, binding: &Binding<T>, flag: Flag) -> Result<(), ParseError>
    where
        T: FromArgValue + 'static,
    {
        self.bind_flag_to(binding, flag, &[])
    }

    /// Register a command-scoped flag and bind its converted value.
    pub fn bind_flag_to<T>(
        &mut self,
        binding: &Binding<T>,
        flag: Flag,
        path: &[&str],
    ) -> Result<(), ParseError>
    where
        T: FromArgValue + 'static,
    {
        let key = flag_key(&flag.name, &path.join(" "));
        self.add_flag_to(flag, path)?;
        self.bindings.insert(key, Box::new(binding.clone()));
        Ok(())
    }

    /// Register a command tree. Re-registering a path merges properties,
    /// preferring the existing non-empty ones.
    pub fn add_command(&mut self, command: Command) -> Result<(), ParseError> {
        self.commands.add(&command, self.max_command_depth)?;
        self.register_command_translations(&command, "");
        Ok(())
    }

    fn register_command_translations(&mut self, command: &Command, parent_path: &str) {
        let path = if parent_path.is_empty() {
            command.name.clone()
        } else {
            format!("{} {}", parent_path, command.name)
        };
        if let Some(key) = &command.name_key {
            self.translations.register(
                SymbolKind::Command,
                command.name.clone(),
                path.clone(),
                key.clone(),
            );
        }
        for sub in &command.subcommands {
            self.register_command_translations(sub, &path);
        }
    }

    // ---- settings ----------------------------------------------------------

    pub fn set_posix_mode(&mut self, enabled: bool) {
        self.posix = enabled;
    }

    /// Replace the flag prefix rune set. An empty list is a configuration
    /// error.
    pub fn set_prefixes(&mut self, prefixes: Vec<char>) -> Result<(), ParseError> {
        if prefixes.is_empty() {
            return Err(ParseError::EmptyArgumentPrefixList);
        }
        self.prefixes = prefixes;
        Ok(())
    }

    /// Replace the chained-value delimiter predicate. A predicate matching a
    /// prefix rune would make flags unparseable and is rejected.
    pub fn set_list_delimiter<F>(&mut self, delimiter: F) -> Result<(), ParseError>
    where
        F: Fn(char) -> bool + 'static,
    {
        if self.prefixes.iter().any(|&c| delimiter(c)) {
            return Err(ParseError::InvalidListDelimiter);
        }
        self.list_delimiter = Arc::new(delimiter);
        Ok(())
    }

    pub fn set_auto_help(&mut self, enabled: bool) {
        self.auto_help = enabled;
    }

    pub fn set_auto_version(&mut self, enabled: bool) {
        self.auto_version = enabled;
    }

    pub fn set_auto_language(&mut self, enabled: bool) {
        self.auto_language = enabled;
    }

    pub fn set_check_system_locale(&mut self, enabled: bool) {
        self.check_system_locale = enabled;
    }

    pub fn set_help_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.help_names = names.into_iter().map(Into::into).collect();
    }

    pub fn set_version_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.version_names = names.into_iter().map(Into::into).collect();
    }

    pub fn set_language_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.language_names = names.into_iter().map(Into::into).collect();
    }

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = Some(version.into());
    }

    pub fn set_app_name(&mut self, name: impl Into<String>) {
        self.app_name = Some(name.into());
    }

    pub fn set_language_env_var(&mut self, var: impl Into<String>) {
        self.lang_env_var = var.into();
    }

    pub fn set_env_name_converter<F>(&mut self, converter: F)
    where
        F: Fn(&str) -> Option<String> + 'static,
    {
        self.env_converter = Some(Arc::new(converter));
    }

    pub fn set_suggestion_thresholds(&mut self, flags: usize, commands: usize) {
        self.suggestion = SuggestionConfig {
            flag_threshold: flags,
            command_threshold: commands,
        };
    }

    pub fn set_suggestion_formatter<F>(&mut self, formatter: F)
    where
        F: Fn(&[String]) -> String + 'static,
    {
        self.suggestion_formatter = Some(Arc::new(formatter));
    }

    pub fn set_max_dependency_depth(&mut self, depth: usize) {
        self.max_dependency_depth = depth;
    }

    pub fn set_max_command_depth(&mut self, depth: usize) {
        self.max_command_depth = depth;
    }

    pub fn set_help_behavior(&mut self, behavior: HelpBehavior) {
        self.help_behavior = behavior;
    }

    /// Run every queued command callback during parsing instead of waiting
    /// for [`Parser::execute_commands`].
    pub fn set_callbacks_on_parse(&mut self, enabled: bool) {
        self.callbacks_on_parse = enabled;
    }

    /// Drain the callback queue automatically after a successful parse.
    pub fn set_execute_commands_on_parse(&mut self, enabled: bool) {
        self.execute_commands_on_parse = enabled;
    }

    pub fn set_stdout(&mut self, writer: Box<dyn Write>) {
        self.stdout = writer;
    }

    pub fn set_stderr(&mut self, writer: Box<dyn Write>) {
        self.stderr = writer;
    }

    pub fn set_end_hook<F>(&mut self, hook: F)
    where
        F: FnMut(i32) + 'static,
    {
        self.end_hook = Box::new(hook);
    }

    pub fn set_secure_reader(&mut self, reader: Box<dyn SecureReader>) {
        self.secure_reader = reader;
    }

    pub fn set_validation_hook<F>(&mut self, hook: F)
    where
        F: Fn(&Parser) -> Result<(), ParseError> + 'static,
    {
        self.validation_hook = Some(Arc::new(hook));
    }

    // ---- hooks -------------------------------------------------------------

    pub fn set_hook_order(&mut self, order: HookOrder) {
        self.hooks.lock().expect("hook registry poisoned").order = order;
    }

    pub fn add_global_pre_hook(&mut self, hook: CommandHook) {
        self.hooks
            .lock()
            .expect("hook registry poisoned")
            .global_pre
            .push(hook);
    }

    pub fn add_global_post_hook(&mut self, hook: CommandHook) {
        self.hooks
            .lock()
            .expect("hook registry poisoned")
            .global_post
            .push(hook);
    }

    pub fn add_command_pre_hook(&mut self, path: &str, hook: CommandHook) {
        self.hooks
            .lock()
            .expect("hook registry poisoned")
            .command_pre
            .entry(path.to_string())
            .or_default()
            .push(hook);
    }

    pub fn add_command_post_hook(&mut self, path: &str, hook: CommandHook) {
        self.hooks
            .lock()
            .expect("hook registry poisoned")
            .command_post
            .entry(path.to_string())
            .or_default()
            .push(hook);
    }

    // ---- locale ------------------------------------------------------------

    /// Add a system-layer locale catalog (parser extension strings).
    pub fn add_locale(&mut self, lang: &LangTag, json: &str) -> Result<(), ParseError> {
        self.catalog.add_system_locale(lang, json)
    }

    /// Add a user-layer locale catalog (application strings).
    pub fn add_user_locale(&mut self, lang: &LangTag, json: &str) -> Result<(), ParseError> {
        self.catalog.add_user_locale(lang, json)
    }

    pub fn set_language(&mut self, lang: LangTag) {
        self.language = lang;
    }

    pub fn language(&self) -> &LangTag {
        &self.language
    }

    /// Canonical flag name for a translated input in `lang`.
    pub fn canonical_flag_name(&self, translated: &str, lang: &LangTag) -> Option<String> {
        self.translations
            .flag_canonical(&self.catalog, lang, translated)
    }

    /// Translated flag name for a canonical input in `lang`.
    pub fn translated_flag_name(&self, canonical: &str, lang: &LangTag) -> Option<String> {
        self.translations
            .flag_translated(&self.catalog, lang, canonical)
    }

    // ---- queries -----------------------------------------------------------

    /// Final value of a flag by registry key (`name` or `name@path`).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(|s| s.as_str())
    }

    /// Final value of a command-scoped flag.
    pub fn get_in(&self, name: &str, path: &[&str]) -> Option<&str> {
        self.options
            .get(&flag_key(name, &path.join(" ")))
            .map(|s| s.as_str())
    }

    /// Final value, falling back to the registered default.
    pub fn get_or_default(&self, key: &str) -> Option<String> {
        if let Some(v) = self.options.get(key) {
            return Some(v.clone());
        }
        self.flags
            .get(key)
            .and_then(|f| f.borrow().default_value.clone())
    }

    /// Whether a flag was set during the parse. Accepts a canonical name, a
    /// registry key, or a translated name in the active language.
    pub fn has_flag(&self, name: &str) -> bool {
        if self.options.contains_key(name) {
            return true;
        }
        if let Some(key) = self.flags.lookup_long(name, "") {
            if self.options.contains_key(&key) {
                return true;
            }
        }
        if let Some(canonical) = self
            .translations
            .flag_canonical(&self.catalog, &self.language, name)
        {
            if let Some(key) = self.flags.lookup_long(&canonical, "") {
                return self.options.contains_key(&key);
            }
        }
        false
    }

    /// Whether a command-scoped flag was set, walking up ancestor contexts.
    /// The most specific registration wins, including for translated names.
    pub fn has_flag_in(&self, name: &str, path: &[&str]) -> bool {
        let context = path.join(" ");
        let resolved = self.flags.lookup_long(name, &context).or_else(|| {
            self.translations
                .flag_canonical(&self.catalog, &self.language, name)
                .and_then(|canonical| self.flags.lookup_long(&canonical, &context))
        });
        resolved.map_or(false, |key| self.options.contains_key(&key))
    }

    /// Whether the command path was seen during the parse.
    pub fn was_command_seen(&self, path: &str) -> bool {
        self.observed_commands.contains(path)
    }

    /// Command paths observed, in order of appearance.
    pub fn observed_commands(&self) -> impl Iterator<Item = &str> {
        self.observed_commands.iter().map(|s| s.as_str())
    }

    /// All positional arguments (bound and free) in argv order.
    pub fn positional_args(&self) -> &[PositionalArg] {
        &self.positionals
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// Soft diagnostics (e.g. an absent optional dependency).
    pub fn warnings(&self) -> &[ParseError] {
        &self.warnings
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
        self.warnings.clear();
    }

    /// Errors rendered in the active language, in collection order.
    pub fn render_errors(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| e.render(&self.catalog, &self.language))
            .collect()
    }

    /// Whether auto-help fired during the last parse. A user-defined help
    /// flag never sets this.
    pub fn was_help_shown(&self) -> bool {
        self.help_shown
    }

    pub fn was_version_shown(&self) -> bool {
        self.version_shown
    }

    /// Whether a flag occurred more than once.
    pub fn was_repeated(&self, key: &str) -> bool {
        self.repeated.contains(key)
    }

    /// Values exactly as entered on the command line, per flag key.
    pub fn raw_values(&self, key: &str) -> Option<&[String]> {
        self.raw_args.get(key).map(|v| v.as_slice())
    }

    // ---- completion --------------------------------------------------------

    /// Snapshot of the registries for external completion-script generators.
    pub fn completion_data(&self) -> CompletionData {
        let commands = self
            .commands
            .iter()
            .map(|(path, entry)| CompletionCommand {
                name: entry.name.clone(),
                path: path.clone(),
                description: self.describe(&entry.description, entry.description_key.as_deref()),
                translated: self.translations.command_translated(
                    &self.catalog,
                    &self.language,
                    &entry.name,
                ),
                subcommands: entry.children.clone(),
            })
            .collect();

        let flags = self
            .flags
            .iter()
            .map(|(key, flag)| {
                let flag = flag.borrow();
                let (_, path) = crate::symbols::registry::split_key(key);
                CompletionFlag {
                    long: flag.name.clone(),
                    short: flag.short.clone(),
                    description: self.describe(&flag.description, flag.description_key.as_deref()),
                    command_path: if path.is_empty() {
                        None
                    } else {
                        Some(path.to_string())
                    },
                    takes_value: flag.flag_type.takes_value(),
                    accepted_values: flag
                        .accepted_values
                        .iter()
                        .map(|av| av.pattern.clone())
                        .collect(),
                    default_value: flag.default_value.clone(),
                }
            })
            .collect();

        CompletionData { commands, flags }
    }

    /// Resolve a description: translation key first, literal fallback.
    pub(crate) fn describe(&self, literal: &str, key: Option<&str>) -> String {
        if let Some(key) = key {
            if let Some(translated) = self.catalog.lookup(&self.language, key) {
                return translated.to_string();
            }
        }
        literal.to_string()
    }

    // ---- command execution -------------------------------------------------

    /// Drain the callback queue, running each command through its hook
    /// chain. Returns the number of commands that failed.
    pub fn execute_commands(&mut self) -> usize {
        let mut failures = 0;
        while let Some(path) = self.callback_queue.pop_front() {
            let before = self.errors.len();
            self.execute_single(&path);
            if self.errors.len() > before {
                failures += 1;
            }
        }
        failures
    }

    pub(crate) fn execute_single(&mut self, path: &str) {
        let Some(entry) = self.commands.get(path).cloned() else {
            return;
        };
        if !entry.is_terminal() {
            // Callback on a non-terminal command; reported once per path.
            if self.subcommand_errors.insert(path.to_string()) {
                self.errors.push(ParseError::CommandExpectsSubcommand {
                    path: path.to_string(),
                });
            }
            return;
        }
        let chain = self
            .hooks
            .lock()
            .expect("hook registry poisoned")
            .snapshot(path);
        if let Err(e) = crate::callbacks::run_command(self, &entry, &chain) {
            self.errors.push(ParseError::CommandCallback {
                path: path.to_string(),
                message: e.to_string(),
            });
        }
    }

    // ---- help --------------------------------------------------------------

    pub(crate) fn render_help(&mut self, error_context: bool) {
        let lang = self.language.clone();
        let usage_label = self.catalog.message(&lang, "argot.msg.help_usage", &[]);
        let commands_label = self.catalog.message(&lang, "argot.msg.help_commands", &[]);
        let flags_label = self.catalog.message(&lang, "argot.msg.help_flags", &[]);
        let default_label = self.catalog.message(&lang, "argot.msg.help_default", &[]);
        let required_label = self.catalog.message(&lang, "argot.msg.required", &[]);

        let app = self
            .app_name
            .clone()
            .or_else(|| {
                std::env::args().next().map(|p| {
                    std::path::Path::new(&p)
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or(p)
                })
            })
            .unwrap_or_else(|| "app".to_string());

        let mut text = String::new();
        text.push_str(&format!("{}: {} [{}]", usage_label, app, flags_label));
        if !self.commands.is_empty() {
            text.push_str(&format!(" [{}]", commands_label));
        }
        text.push('\n');

        if !self.commands.is_empty() {
            text.push_str(&format!("\n{}:\n", commands_label));
            let roots: Vec<_> = self.commands.roots().cloned().collect();
            for entry in roots {
                let shown = self
                    .translations
                    .command_translated(&self.catalog, &lang, &entry.name)
                    .unwrap_or_else(|| entry.name.clone());
                let description =
                    self.describe(&entry.description, entry.description_key.as_deref());
                text.push_str(&format!("  {:<18} {}\n", shown, description));
            }
        }

        text.push_str(&format!("\n{}:\n", flags_label));
        let mut flag_lines = Vec::new();
        for (key, flag) in self.flags.iter() {
            let flag = flag.borrow();
            if flag.position.is_some() {
                continue;
            }
            let (_, path) = crate::symbols::registry::split_key(key);
            if !path.is_empty() {
                continue;
            }
            let shown = self
                .translations
                .flag_translated(&self.catalog, &lang, &flag.name)
                .unwrap_or_else(|| flag.name.clone());
            let mut line = format!("  --{}", shown);
            if let Some(short) = &flag.short {
                line.push_str(&format!(", -{}", short));
            }
            let description = self.describe(&flag.description, flag.description_key.as_deref());
            let mut notes = Vec::new();
            if !description.is_empty() {
                notes.push(description);
            }
            if flag.required {
                notes.push(required_label.clone());
            }
            if let Some(default) = &flag.default_value {
                notes.push(format!("{}: {}", default_label, default));
            }
            if !notes.is_empty() {
                line = format!("{:<24} {}", line, notes.join(", "));
            }
            flag_lines.push(line);
        }
        text.push_str(&flag_lines.join("\n"));
        text.push('\n');

        let to_stderr = match self.help_behavior {
            HelpBehavior::Stdout => false,
            HelpBehavior::Stderr => true,
            HelpBehavior::Smart => error_context,
        };
        let writer = if to_stderr {
            &mut self.stderr
        } else {
            &mut self.stdout
        };
        let _ = writer.write_all(text.as_bytes());
        let _ = writer.flush();
    }

    // ---- internal helpers shared by the engine -----------------------------

    pub(crate) fn flag_by_key(&self, key: &str) -> Option<Rc<std::cell::RefCell<Flag>>> {
        self.flags.get(key).map(Rc::clone)
    }

    pub(crate) fn push_error(&mut self, error: ParseError) {
        self.errors.push(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::{AcceptedValue, FlagType};

    #[test]
    fn test_empty_prefix_list_rejected() {
        let mut parser = Parser::new();
        assert!(matches!(
            parser.set_prefixes(vec![]),
            Err(ParseError::EmptyArgumentPrefixList)
        ));
        parser.set_prefixes(vec!['-', '/']).unwrap();
    }

    #[test]
    fn test_list_delimiter_may_not_match_prefix() {
        let mut parser = Parser::new();
        assert!(matches!(
            parser.set_list_delimiter(|c| c == '-'),
            Err(ParseError::InvalidListDelimiter)
        ));
        parser.set_list_delimiter(|c| c == ':').unwrap();
    }

    #[test]
    fn test_accepted_values_become_validators() {
        let mut parser = Parser::new();
        parser
            .add_flag(Flag::new("mode").with_accepted_values(vec![
                AcceptedValue::new("^dev$", "development"),
                AcceptedValue::new("^prod$", "production"),
            ]))
            .unwrap();
        let flag = parser.flag_by_key("mode").unwrap();
        assert_eq!(flag.borrow().validators.len(), 1);
    }

    #[test]
    fn test_accepted_value_mismatch_reports_invalid_argument() {
        let mut parser = Parser::new();
        parser.set_end_hook(|_| {});
        parser
            .add_flag(Flag::new("mode").with_accepted_values(vec![
                AcceptedValue::new("^dev$", "development"),
                AcceptedValue::new("^prod$", "production"),
            ]))
            .unwrap();

        assert!(!parser.parse_args(["--mode", "staging"]));
        match &parser.errors()[0] {
            ParseError::InvalidArgument { name, value, accepted } => {
                assert_eq!(name, "mode");
                assert_eq!(value, "staging");
                assert_eq!(accepted, "development, production");
            }
            other => panic!("expected InvalidArgument, got {:?}", other),
        }

        assert!(parser.parse_args(["--mode", "prod"]));
        assert_eq!(parser.get("mode"), Some("prod"));
    }

    #[test]
    fn test_bad_accepted_pattern_is_construction_error() {
        let mut parser = Parser::new();
        let err = parser
            .add_flag(
                Flag::new("mode").with_accepted_values(vec![AcceptedValue::new("([", "broken")]),
            )
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidValidator { .. }));
    }

    #[test]
    fn test_get_or_default() {
        let mut parser = Parser::new();
        parser
            .add_flag(Flag::new("port").with_default("8080"))
            .unwrap();
        assert_eq!(parser.get("port"), None);
        assert_eq!(parser.get_or_default("port").as_deref(), Some("8080"));
    }

    #[test]
    fn test_empty_flag_type_normalized() {
        let mut parser = Parser::new();
        parser.add_flag(Flag::new("out")).unwrap();
        assert_eq!(
            parser.flag_by_key("out").unwrap().borrow().flag_type,
            FlagType::Single
        );
    }

    #[test]
    fn test_completion_data_snapshot() {
        let mut parser = Parser::new();
        parser
            .add_flag(Flag::new("verbose").with_short("v").standalone())
            .unwrap();
        parser
            .add_flag_to(Flag::new("port").with_default("8080"), &["serve"])
            .unwrap();
        parser
            .add_command(Command::new("serve").with_subcommand(Command::new("users")))
            .unwrap();

        let data = parser.completion_data();
        assert_eq!(data.commands.len(), 2);
        assert_eq!(data.flags.len(), 2);
        let port = data.flags.iter().find(|f| f.long == "port").unwrap();
        assert_eq!(port.command_path.as_deref(), Some("serve"));
        assert_eq!(port.default_value.as_deref(), Some("8080"));
        let verbose = data.flags.iter().find(|f| f.long == "verbose").unwrap();
        assert!(!verbose.takes_value);
    }
}
