//! FVM Core
//!
//! The config model of a formal verification run and the pieces every
//! other crate shares:
//! - `Config`: sources, designs, constraints, per-step settings
//! - `Policy`: skip / allow-failure / disabled-coverage wildcard rules
//! - `HookTable`: pre/post step hooks with design-over-wildcard lookup
//! - `FvmError` / `FailureClass`: error taxonomy and exit codes
//! - `RunLog`, `telemetry`, `obs`: logging

pub mod catalog;
pub mod config;
pub mod error;
pub mod hooks;
pub mod obs;
pub mod policy;
pub mod run_log;
pub mod telemetry;
pub mod timeout;

pub use catalog::{StepCatalog, StepNames};
pub use config::{
    resolve_glob, Blackbox, BlackboxTarget, Clock, ClockDomain, Config, Cutpoint, DesignConfig,
    DesignKey, DesignScoped, GenericValue, Generics, PslFlavor, Reset, ResetDomain, SourceFile,
    SourceKind, DEFAULT_CONFIG, DEFAULT_LIBRARY, DEFAULT_PREFIX, RESERVED_NAMES,
};
pub use error::{FailureClass, FvmError, Result};
pub use hooks::{Hook, HookContext, HookFn, HookPhase, HookTable};
pub use obs::{design_span, DesignSpan};
pub use policy::{policy_key, selector_applies, Policy, WildcardPattern};
pub use run_log::RunLog;
pub use telemetry::init_tracing;
pub use timeout::{format_timeout, parse_timeout};

/// FVM version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
