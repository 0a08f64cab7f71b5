//! FVM Runner
//!
//! Executes a verification program against a toolchain:
//! - `Driver`: per design key, archive, setup, run steps, aggregate
//! - `Supervisor`: process-group child supervision with timeouts and Ctrl-C
//! - `RunResults` / `RunGate`: the result store and the exit-code decision
//! - `Reporter`: console table, JUnit XML, JSON, HTML and the dashboard

pub mod archive;
pub mod cancel;
pub mod driver;
pub mod error;
pub mod gate;
pub mod options;
pub mod report;
pub mod result;
pub mod supervisor;

pub use archive::{archive_design_dir, archive_timestamp, rotate_results};
pub use cancel::CancelToken;
pub use driver::{render_plan, Driver, PlanAction, PlannedDesign, PlannedStep, FLEXLM_ENV};
pub use error::{Result, RunnerError};
pub use gate::{GateVerdict, RunGate};
pub use options::{RunOptions, DEFAULT_OUTDIR};
pub use report::{Dashboard, ReportSet, Reporter};
pub use result::{DesignResults, RunResults, StepResult, StepStatus};
pub use supervisor::{spawn_detached, Supervisor};
