//! Symbol Registries
//!
//! Flags and commands live in insertion-ordered maps so help output and
//! error ordering stay deterministic. Flag keys are `name` for global flags
//! and `name@command path` for command-scoped ones; short flags get their own
//! lookup table with the same qualification scheme.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::errors::ParseError;
use crate::symbols::command::{Command, CommandEntry};
use crate::symbols::flag::{Flag, FlagType};

/// Build the registry key for a flag name in a command context.
pub fn flag_key(name: &str, path: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}@{}", name, path)
    }
}

/// Split a registry key back into `(name, path)`.
pub fn split_key(key: &str) -> (&str, &str) {
    match key.split_once('@') {
        Some((name, path)) => (name, path),
        None => (key, ""),
    }
}

/// Whether two command paths overlap: equal, or one is an ancestor of the
/// other (path segments are space-separated).
fn paths_overlap(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    a.starts_with(b) && a.as_bytes().get(b.len()) == Some(&b' ')
        || b.starts_with(a) && b.as_bytes().get(a.len()) == Some(&b' ')
}

/// Insertion-ordered flag storage with context-scoped short-name lookup.
#[derive(Debug, Default)]
pub struct FlagRegistry {
    flags: IndexMap<String, Rc<RefCell<Flag>>>,
    /// `short` or `short@path` → flag registry key.
    shorts: HashMap<String, String>,
    next_id: u64,
}

impl FlagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a flag under `path` (empty string for global scope).
    ///
    /// Rejects empty names, exact duplicates of `name@path`, and short-flag
    /// conflicts: a global short conflicts with any short of the same letter,
    /// and two command-scoped shorts of the same letter conflict unless
    /// their command paths are disjoint.
    pub fn add(&mut self, mut flag: Flag, path: &str) -> Result<String, ParseError> {
        if flag.name.is_empty() {
            return Err(ParseError::EmptyFlagName);
        }
        let key = flag_key(&flag.name, path);
        if self.flags.contains_key(&key) {
            return Err(ParseError::FlagAlreadyExists { key });
        }

        if let Some(short) = flag.short.clone() {
            self.check_short_conflict(&short, &key, path)?;
        }

        if flag.flag_type == FlagType::Empty {
            flag.flag_type = FlagType::Single;
        }
        self.next_id += 1;
        flag.id = self.next_id;

        if let Some(short) = flag.short.clone() {
            self.shorts.insert(flag_key(&short, path), key.clone());
        }
        self.flags.insert(key.clone(), Rc::new(RefCell::new(flag)));
        Ok(key)
    }

    fn check_short_conflict(
        &self,
        short: &str,
        new_key: &str,
        path: &str,
    ) -> Result<(), ParseError> {
        for (short_key, existing_key) in &self.shorts {
            let (existing_short, existing_path) = split_key(short_key);
            if existing_short != short {
                continue;
            }
            let disjoint =
                !path.is_empty() && !existing_path.is_empty() && !paths_overlap(path, existing_path);
            if !disjoint {
                return Err(ParseError::ShortFlagConflict {
                    short: short.to_string(),
                    new_flag: new_key.to_string(),
                    existing_flag: existing_key.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Rc<RefCell<Flag>>> {
        self.flags.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.flags.contains_key(key)
    }

    /// Resolve a long name in `context`, walking from the exact context up
    /// through ancestor paths and finally the global scope. Returns the
    /// registry key of the first match.
    pub fn lookup_long(&self, name: &str, context: &str) -> Option<String> {
        for scope in ancestor_scopes(context) {
            let key = flag_key(name, scope);
            if self.flags.contains_key(&key) {
                return Some(key);
            }
        }
        None
    }

    /// Resolve a short name the same way: exact context, ancestors, global.
    /// The most specific match wins, so a short defined on the current
    /// command shadows an identical letter on an ancestor or global flag.
    pub fn lookup_short(&self, short: &str, context: &str) -> Option<String> {
        for scope in ancestor_scopes(context) {
            if let Some(key) = self.shorts.get(&flag_key(short, scope)) {
                return Some(key.clone());
            }
        }
        None
    }

    /// Whether `short` resolves to anything in `context` (POSIX clustering).
    pub fn short_exists(&self, short: &str, context: &str) -> bool {
        self.lookup_short(short, context).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Rc<RefCell<Flag>>)> {
        self.flags.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.flags.keys()
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

/// Yield `context`, each ancestor path, then the global scope `""`.
fn ancestor_scopes(context: &str) -> impl Iterator<Item = &str> {
    let mut scopes = Vec::new();
    if !context.is_empty() {
        let mut rest = context;
        loop {
            scopes.push(rest);
            match rest.rsplit_once(' ') {
                Some((parent, _)) => rest = parent,
                None => break,
            }
        }
    }
    scopes.push("");
    scopes.into_iter()
}

/// Insertion-ordered command storage keyed by full path.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: IndexMap<String, CommandEntry>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command tree. Validates depth and names, assembles paths,
    /// and merges with already-registered entries: an existing non-empty
    /// description, translation key or callback is preferred over the
    /// incoming one.
    pub fn add(&mut self, command: &Command, max_depth: usize) -> Result<(), ParseError> {
        self.add_subtree(command, "", 1, max_depth)
    }

    fn add_subtree(
        &mut self,
        command: &Command,
        parent_path: &str,
        depth: usize,
        max_depth: usize,
    ) -> Result<(), ParseError> {
        if command.name.is_empty() {
            return Err(ParseError::EmptyCommandName);
        }
        let path = if parent_path.is_empty() {
            command.name.clone()
        } else {
            format!("{} {}", parent_path, command.name)
        };
        if depth > max_depth {
            return Err(ParseError::RecursionDepthExceeded {
                path,
                max_depth,
            });
        }

        let children: Vec<String> = command.subcommands.iter().map(|c| c.name.clone()).collect();
        match self.commands.get_mut(&path) {
            Some(existing) => {
                if existing.description.is_empty() {
                    existing.description = command.description.clone();
                }
                if existing.description_key.is_none() {
                    existing.description_key = command.description_key.clone();
                }
                if existing.name_key.is_none() {
                    existing.name_key = command.name_key.clone();
                }
                if existing.callback.is_none() {
                    existing.callback = command.callback.clone();
                }
                existing.exec_on_parse |= command.exec_on_parse;
                for child in &children {
                    if !existing.children.contains(child) {
                        existing.children.push(child.clone());
                    }
                }
            }
            None => {
                self.commands.insert(
                    path.clone(),
                    CommandEntry {
                        name: command.name.clone(),
                        path: path.clone(),
                        description: command.description.clone(),
                        description_key: command.description_key.clone(),
                        name_key: command.name_key.clone(),
                        children,
                        callback: command.callback.clone(),
                        exec_on_parse: command.exec_on_parse,
                    },
                );
            }
        }

        for sub in &command.subcommands {
            self.add_subtree(sub, &path, depth + 1, max_depth)?;
        }
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&CommandEntry> {
        self.commands.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.commands.contains_key(path)
    }

    /// Root commands in registration order.
    pub fn roots(&self) -> impl Iterator<Item = &CommandEntry> {
        self.commands.values().filter(|c| !c.path.contains(' '))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CommandEntry)> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_key_forms() {
        assert_eq!(flag_key("verbose", ""), "verbose");
        assert_eq!(flag_key("name", "serve users"), "name@serve users");
        assert_eq!(split_key("name@serve users"), ("name", "serve users"));
        assert_eq!(split_key("verbose"), ("verbose", ""));
    }

    #[test]
    fn test_duplicate_flag_rejected() {
        let mut reg = FlagRegistry::new();
        reg.add(Flag::new("verbose"), "").unwrap();
        let err = reg.add(Flag::new("verbose"), "").unwrap_err();
        assert!(matches!(err, ParseError::FlagAlreadyExists { .. }));
        // Same name in a command scope is a different key.
        reg.add(Flag::new("verbose"), "serve").unwrap();
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut reg = FlagRegistry::new();
        assert!(matches!(
            reg.add(Flag::new(""), ""),
            Err(ParseError::EmptyFlagName)
        ));
    }

    #[test]
    fn test_empty_type_normalized_to_single() {
        let mut reg = FlagRegistry::new();
        let key = reg.add(Flag::new("out"), "").unwrap();
        assert_eq!(reg.get(&key).unwrap().borrow().flag_type, FlagType::Single);
    }

    #[test]
    fn test_global_short_conflicts_with_scoped() {
        let mut reg = FlagRegistry::new();
        reg.add(Flag::new("scoped").with_short("x"), "cmd").unwrap();
        let err = reg.add(Flag::new("global").with_short("x"), "").unwrap_err();
        assert!(matches!(err, ParseError::ShortFlagConflict { .. }));
    }

    #[test]
    fn test_disjoint_scoped_shorts_coexist() {
        let mut reg = FlagRegistry::new();
        reg.add(Flag::new("alpha").with_short("x"), "cmd-a").unwrap();
        reg.add(Flag::new("beta").with_short("x"), "cmd-b").unwrap();
        assert_eq!(
            reg.lookup_short("x", "cmd-a").as_deref(),
            Some("alpha@cmd-a")
        );
        assert_eq!(reg.lookup_short("x", "cmd-b").as_deref(), Some("beta@cmd-b"));
    }

    #[test]
    fn test_overlapping_scoped_shorts_conflict() {
        let mut reg = FlagRegistry::new();
        reg.add(Flag::new("alpha").with_short("x"), "serve").unwrap();
        let err = reg
            .add(Flag::new("beta").with_short("x"), "serve users")
            .unwrap_err();
        assert!(matches!(err, ParseError::ShortFlagConflict { .. }));
    }

    #[test]
    fn test_lookup_walks_ancestors() {
        let mut reg = FlagRegistry::new();
        reg.add(Flag::new("config"), "").unwrap();
        reg.add(Flag::new("port"), "serve").unwrap();
        assert_eq!(
            reg.lookup_long("port", "serve users").as_deref(),
            Some("port@serve")
        );
        assert_eq!(
            reg.lookup_long("config", "serve users").as_deref(),
            Some("config")
        );
        assert!(reg.lookup_long("missing", "serve").is_none());
    }

    #[test]
    fn test_most_specific_short_wins() {
        let mut reg = FlagRegistry::new();
        reg.add(Flag::new("global-n").with_short("n"), "").unwrap();
        // A scoped short of the same letter is a conflict; use a different
        // letter and check the walk order instead.
        reg.add(Flag::new("scoped-m").with_short("m"), "serve").unwrap();
        assert_eq!(
            reg.lookup_short("m", "serve users").as_deref(),
            Some("scoped-m@serve")
        );
        assert_eq!(reg.lookup_short("n", "serve").as_deref(), Some("global-n"));
    }

    #[test]
    fn test_command_paths_assembled() {
        let mut reg = CommandRegistry::new();
        let tree = Command::new("serve").with_subcommand(
            Command::new("users").with_subcommand(Command::new("create")),
        );
        reg.add(&tree, 100).unwrap();
        assert!(reg.contains("serve"));
        assert!(reg.contains("serve users"));
        assert!(reg.contains("serve users create"));
        assert_eq!(reg.get("serve users").unwrap().children, vec!["create"]);
        assert!(reg.get("serve users create").unwrap().is_terminal());
    }

    #[test]
    fn test_command_merge_prefers_existing() {
        let mut reg = CommandRegistry::new();
        reg.add(&Command::new("serve").with_description("original"), 100)
            .unwrap();
        reg.add(
            &Command::new("serve")
                .with_description("replacement")
                .with_subcommand(Command::new("users")),
            100,
        )
        .unwrap();
        let entry = reg.get("serve").unwrap();
        assert_eq!(entry.description, "original");
        assert_eq!(entry.children, vec!["users"]);
    }

    #[test]
    fn test_depth_limit() {
        let mut reg = CommandRegistry::new();
        let tree = Command::new("a")
            .with_subcommand(Command::new("b").with_subcommand(Command::new("c")));
        let err = reg.add(&tree, 2).unwrap_err();
        assert!(matches!(err, ParseError::RecursionDepthExceeded { .. }));
    }

    #[test]
    fn test_roots_iteration_order() {
        let mut reg = CommandRegistry::new();
        reg.add(&Command::new("beta"), 100).unwrap();
        reg.add(&Command::new("alpha").with_subcommand(Command::new("x")), 100)
            .unwrap();
        let roots: Vec<&str> = reg.roots().map(|c| c.name.as_str()).collect();
        assert_eq!(roots, vec!["beta", "alpha"]);
    }
}
