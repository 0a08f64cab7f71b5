//! Names of the steps a toolchain supports.
//!
//! The config model validates step references (coverage goals, timeouts,
//! flag overrides) against this catalog without knowing anything else
//! about the toolchain.

use serde::{Deserialize, Serialize};

/// A top-level step and the post-steps that run under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepNames {
    pub name: String,
    pub post_steps: Vec<String>,
}

/// Ordered step names, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCatalog {
    steps: Vec<StepNames>,
}

impl StepCatalog {
    pub fn new(steps: Vec<StepNames>) -> Self {
        Self { steps }
    }

    /// Whether `name` is a step (`"prove"`) or a post-step (`"prove.formalcover"`).
    pub fn contains(&self, name: &str) -> bool {
        match name.split_once('.') {
            Some((parent, post)) => self
                .steps
                .iter()
                .any(|s| s.name == parent && s.post_steps.iter().any(|p| p == post)),
            None => self.steps.iter().any(|s| s.name == name),
        }
    }

    /// Top-level step names in execution order.
    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.name.as_str())
    }

    /// Every canonical key, post-steps right after their parent.
    pub fn qualified_names(&self) -> Vec<String> {
        let mut out = Vec::new();
        for step in &self.steps {
            out.push(step.name.clone());
            for post in &step.post_steps {
                out.push(format!("{}.{}", step.name, post));
            }
        }
        out
    }

    pub fn steps(&self) -> &[StepNames] {
        &self.steps
    }
}
