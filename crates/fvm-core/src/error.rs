//! Error taxonomy for the FVM driver.
//!
//! Every failure maps to a [`FailureClass`], and every class has a stable
//! process exit code.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Failure classes with stable process exit codes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Configuration rejected before any tool ran.
    BadValue,

    /// A step's tool reported failure and failure was not allowed.
    ToolError,

    /// A coverage step returned a percentage below its goal.
    GoalNotMet,

    /// Post-run aggregation observed at least one error-level message.
    CheckFailed,

    /// The user interrupted the run.
    Interrupted,
}

impl FailureClass {
    /// Process exit code for this class.
    pub fn exit_code(self) -> i32 {
        match self {
            FailureClass::BadValue => 3,
            FailureClass::ToolError => 4,
            FailureClass::GoalNotMet => 5,
            FailureClass::CheckFailed => 6,
            FailureClass::Interrupted => 7,
        }
    }

    /// Short name, as printed in summaries and logs.
    pub fn name(self) -> &'static str {
        match self {
            FailureClass::BadValue => "bad-value",
            FailureClass::ToolError => "tool-error",
            FailureClass::GoalNotMet => "goal-not-met",
            FailureClass::CheckFailed => "check-failed",
            FailureClass::Interrupted => "keyboard-interrupt",
        }
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors raised while building or validating the config model.
#[derive(Debug, thiserror::Error)]
pub enum FvmError {
    #[error("bad value: {0}")]
    BadValue(String),

    #[error("no files found for pattern {pattern}")]
    NoFilesFound { pattern: String },

    #[error("invalid glob pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("duplicate top-level: {0}")]
    DuplicateToplevel(String),

    #[error("top-level name {0} collides with a reserved output directory")]
    ReservedName(String),

    #[error("design {0} is not a registered top-level")]
    UnknownDesign(String),

    #[error("duplicate config {config} for design {design}")]
    DuplicateConfig { design: String, config: String },

    #[error("step {0} is not registered by the active toolchain")]
    UnknownStep(String),

    #[error("invalid coverage goal {value} for {step}: must be within [0, 100]")]
    InvalidGoal { step: String, value: f64 },

    #[error("invalid timeout {0:?}: expected <n><s|m|h|d>")]
    InvalidTimeout(String),
}

impl FvmError {
    /// Failure class of this error. Config errors are all bad values.
    pub fn class(&self) -> FailureClass {
        FailureClass::BadValue
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        self.class().exit_code()
    }
}

/// Result type for config model operations.
pub type Result<T> = std::result::Result<T, FvmError>;
