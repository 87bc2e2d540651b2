//! Command Callback Pipeline
//!
//! Parsed commands are queued FIFO and each executed command is funneled
//! through pre-hooks → callback → post-hooks. Pre-hooks are the global and
//! per-command lists concatenated in a configurable order; post-hooks run in
//! the reverse of that composition. A pre-hook error skips the callback but
//! post-hooks still run; a post-hook error overrides success, never an
//! earlier error.

use std::collections::HashMap;
use std::sync::Arc;

use crate::parser::Parser;
use crate::symbols::command::CommandEntry;

/// Hook invoked around a command callback.
pub type CommandHook =
    Arc<dyn Fn(&Parser, &CommandEntry) -> Result<(), Box<dyn std::error::Error>>>;

/// Relative order of global and per-command hook lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HookOrder {
    #[default]
    GlobalFirst,
    CommandFirst,
}

/// Mutable hook storage. Lives behind a mutex on the parser so the setters
/// are safe to call from other threads between parses.
#[derive(Default)]
pub(crate) struct HookSet {
    pub global_pre: Vec<CommandHook>,
    pub global_post: Vec<CommandHook>,
    pub command_pre: HashMap<String, Vec<CommandHook>>,
    pub command_post: HashMap<String, Vec<CommandHook>>,
    pub order: HookOrder,
}

impl HookSet {
    /// Snapshot the hook chains for one command path. Cheap: hooks are
    /// reference-counted.
    pub fn snapshot(&self, path: &str) -> HookChain {
        let command_pre = self.command_pre.get(path).cloned().unwrap_or_default();
        let command_post = self.command_post.get(path).cloned().unwrap_or_default();

        let pre: Vec<CommandHook> = match self.order {
            HookOrder::GlobalFirst => self
                .global_pre
                .iter()
                .chain(command_pre.iter())
                .cloned()
                .collect(),
            HookOrder::CommandFirst => command_pre
                .iter()
                .chain(self.global_pre.iter())
                .cloned()
                .collect(),
        };
        let mut post: Vec<CommandHook> = match self.order {
            HookOrder::GlobalFirst => self
                .global_post
                .iter()
                .chain(command_post.iter())
                .cloned()
                .collect(),
            HookOrder::CommandFirst => command_post
                .iter()
                .chain(self.global_post.iter())
                .cloned()
                .collect(),
        };
        post.reverse();
        HookChain { pre, post }
    }
}

/// Immutable hook chains for a single execution.
pub(crate) struct HookChain {
    pre: Vec<CommandHook>,
    post: Vec<CommandHook>,
}

/// Run one command through its hook chain and callback.
pub(crate) fn run_command(
    parser: &Parser,
    entry: &CommandEntry,
    chain: &HookChain,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut result: Result<(), Box<dyn std::error::Error>> = Ok(());

    for hook in &chain.pre {
        if let Err(e) = hook(parser, entry) {
            result = Err(e);
            break;
        }
    }

    if result.is_ok() {
        if let Some(callback) = &entry.callback {
            result = callback(parser, entry);
        }
    }

    for hook in &chain.post {
        if let Err(e) = hook(parser, entry) {
            if result.is_ok() {
                result = Err(e);
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn entry_with_callback(trace: Rc<RefCell<Vec<String>>>) -> CommandEntry {
        CommandEntry {
            name: "run".to_string(),
            path: "run".to_string(),
            description: String::new(),
            description_key: None,
            name_key: None,
            children: vec![],
            callback: Some(Arc::new(move |_, _| {
                trace.borrow_mut().push("callback".to_string());
                Ok(())
            })),
            exec_on_parse: false,
        }
    }

    fn tracer(trace: &Rc<RefCell<Vec<String>>>, label: &str) -> CommandHook {
        let trace = Rc::clone(trace);
        let label = label.to_string();
        Arc::new(move |_, _| {
            trace.borrow_mut().push(label.clone());
            Ok(())
        })
    }

    fn failing(trace: &Rc<RefCell<Vec<String>>>, label: &str) -> CommandHook {
        let trace = Rc::clone(trace);
        let label = label.to_string();
        Arc::new(move |_, _| {
            trace.borrow_mut().push(label.clone());
            Err(label.clone().into())
        })
    }

    #[test]
    fn test_global_first_order_and_reverse_post() {
        let trace = Rc::new(RefCell::new(Vec::new()));
        let parser = Parser::new();
        let entry = entry_with_callback(Rc::clone(&trace));

        let mut hooks = HookSet::default();
        hooks.global_pre.push(tracer(&trace, "g-pre"));
        hooks
            .command_pre
            .entry("run".to_string())
            .or_default()
            .push(tracer(&trace, "c-pre"));
        hooks.global_post.push(tracer(&trace, "g-post"));
        hooks
            .command_post
            .entry("run".to_string())
            .or_default()
            .push(tracer(&trace, "c-post"));

        run_command(&parser, &entry, &hooks.snapshot("run")).unwrap();
        assert_eq!(
            *trace.borrow(),
            vec!["g-pre", "c-pre", "callback", "c-post", "g-post"]
        );
    }

    #[test]
    fn test_command_first_order() {
        let trace = Rc::new(RefCell::new(Vec::new()));
        let parser = Parser::new();
        let entry = entry_with_callback(Rc::clone(&trace));

        let mut hooks = HookSet::default();
        hooks.order = HookOrder::CommandFirst;
        hooks.global_pre.push(tracer(&trace, "g-pre"));
        hooks
            .command_pre
            .entry("run".to_string())
            .or_default()
            .push(tracer(&trace, "c-pre"));
        hooks.global_post.push(tracer(&trace, "g-post"));
        hooks
            .command_post
            .entry("run".to_string())
            .or_default()
            .push(tracer(&trace, "c-post"));

        run_command(&parser, &entry, &hooks.snapshot("run")).unwrap();
        assert_eq!(
            *trace.borrow(),
            vec!["c-pre", "g-pre", "callback", "g-post", "c-post"]
        );
    }

    #[test]
    fn test_pre_hook_error_skips_callback_but_runs_post() {
        let trace = Rc::new(RefCell::new(Vec::new()));
        let parser = Parser::new();
        let entry = entry_with_callback(Rc::clone(&trace));

        let mut hooks = HookSet::default();
        hooks.global_pre.push(failing(&trace, "g-pre"));
        hooks.global_post.push(tracer(&trace, "g-post"));

        let err = run_command(&parser, &entry, &hooks.snapshot("run")).unwrap_err();
        assert_eq!(err.to_string(), "g-pre");
        assert_eq!(*trace.borrow(), vec!["g-pre", "g-post"]);
    }

    #[test]
    fn test_post_hook_error_overrides_success_only() {
        let trace = Rc::new(RefCell::new(Vec::new()));
        let parser = Parser::new();

        // Success case: post error surfaces.
        let entry = entry_with_callback(Rc::clone(&trace));
        let mut hooks = HookSet::default();
        hooks.global_post.push(failing(&trace, "g-post"));
        let err = run_command(&parser, &entry, &hooks.snapshot("run")).unwrap_err();
        assert_eq!(err.to_string(), "g-post");

        // Callback error case: callback error is preserved.
        let failing_entry = CommandEntry {
            callback: Some(Arc::new(|_, _| Err("boom".into()))),
            ..entry_with_callback(Rc::clone(&trace))
        };
        let err = run_command(&parser, &failing_entry, &hooks.snapshot("run")).unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
