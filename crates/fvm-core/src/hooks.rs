//! Pre/post step hooks.
//!
//! Hooks are registered per `(design, step)`, where design may be `"*"`.
//! Lookup is two-level: a design-specific entry shadows the wildcard entry,
//! so at most one pre-hook and one post-hook fire per step.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Context handed to in-process hook callbacks.
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    /// Top-level design name.
    pub design: &'a str,
    /// Design key as rendered on disk (`design` or `design.config`).
    pub design_key: &'a str,
    /// Step name, `parent.post` for post-steps.
    pub step: &'a str,
    /// Directory exclusively owned by the step.
    pub step_dir: &'a Path,
}

pub type HookFn = Arc<dyn Fn(&HookContext<'_>) -> anyhow::Result<()> + Send + Sync>;

/// A hook is either a callback or an external command run in the step directory.
#[derive(Clone)]
pub enum Hook {
    Callback(HookFn),
    Command(Vec<String>),
}

impl Hook {
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&HookContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Hook::Callback(Arc::new(f))
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::Callback(_) => f.write_str("Hook::Callback(..)"),
            Hook::Command(argv) => f.debug_tuple("Hook::Command").field(argv).finish(),
        }
    }
}

/// When a hook fires relative to its step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HookPhase {
    Pre,
    Post,
}

impl HookPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            HookPhase::Pre => "pre",
            HookPhase::Post => "post",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HookTable {
    entries: BTreeMap<(HookPhase, String, String), Hook>,
}

impl HookTable {
    /// Register a hook, replacing any previous one for the same key.
    pub fn insert(&mut self, phase: HookPhase, design: &str, step: &str, hook: Hook) {
        self.entries
            .insert((phase, design.to_string(), step.to_string()), hook);
    }

    /// The single hook that fires for `design`/`step`, if any.
    pub fn lookup(&self, phase: HookPhase, design: &str, step: &str) -> Option<&Hook> {
        self.entries
            .get(&(phase, design.to_string(), step.to_string()))
            .or_else(|| self.entries.get(&(phase, "*".to_string(), step.to_string())))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(word: &str) -> Hook {
        Hook::Command(vec!["echo".to_string(), word.to_string()])
    }

    fn words(hook: Option<&Hook>) -> Option<String> {
        match hook {
            Some(Hook::Command(argv)) => Some(argv[1].clone()),
            _ => None,
        }
    }

    #[test]
    fn test_design_hook_shadows_wildcard() {
        let mut table = HookTable::default();
        table.insert(HookPhase::Pre, "*", "prove", argv("wild"));
        table.insert(HookPhase::Pre, "counter", "prove", argv("specific"));

        assert_eq!(
            words(table.lookup(HookPhase::Pre, "counter", "prove")),
            Some("specific".to_string())
        );
        assert_eq!(
            words(table.lookup(HookPhase::Pre, "dualcounter", "prove")),
            Some("wild".to_string())
        );
    }

    #[test]
    fn test_phases_are_independent() {
        let mut table = HookTable::default();
        table.insert(HookPhase::Post, "*", "lint", argv("after"));
        assert!(table.lookup(HookPhase::Pre, "counter", "lint").is_none());
        assert!(table.lookup(HookPhase::Post, "counter", "lint").is_some());
    }

    #[test]
    fn test_callback_hook_runs() {
        let hook = Hook::callback(|ctx| {
            anyhow::ensure!(ctx.step == "lint", "unexpected step");
            Ok(())
        });
        let ctx = HookContext {
            design: "counter",
            design_key: "counter",
            step: "lint",
            step_dir: Path::new("."),
        };
        match hook {
            Hook::Callback(f) => assert!(f(&ctx).is_ok()),
            Hook::Command(_) => unreachable!(),
        }
    }
}
