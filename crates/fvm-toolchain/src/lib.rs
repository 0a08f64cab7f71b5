//! FVM Toolchain
//!
//! The plugin side of the driver. A [`Toolchain`] supplies an ordered
//! [`StepRegistry`]; each [`Step`] writes a deterministic script
//! (setup) and runs the tool over it (run) through a [`ToolExecutor`].
//!
//! Output handling is shared: [`ClassificationTable`] sorts lines into
//! error/warning/success, [`SummaryParser`] scrapes the closing summary.

pub mod drom;
pub mod error;
pub mod exec;
pub mod patterns;
pub mod questa;
pub mod script;
pub mod step;
pub mod summary;
pub mod toolchain;

pub use drom::{Drom2Psl, DEFAULT_DROM2PSL, DROM2PSL_ENV};
pub use error::{Result, ToolchainError};
pub use exec::{ExitKind, LineCallback, StreamKind, ToolExecutor, ToolInvocation, ToolOutput};
pub use patterns::{ClassificationTable, ClassifiedLine, Severity};
pub use questa::QuestaToolchain;
pub use script::{ScriptArtifact, ScriptWriter};
pub use step::{
    evaluate, run_tool, Evaluation, FailureReason, Step, StepContext, StepEntry, StepOutcome,
    StepRegistry, Verdict,
};
pub use summary::{KeywordSummaryParser, MetricStyle, SummaryParser, ToolSummary};
pub use toolchain::{
    available_toolchains, register_toolchain, toolchain_by_name, toolchain_from_env, Toolchain,
    ToolchainFactory, DEFAULT_TOOLCHAIN, TOOLCHAIN_ENV,
};
