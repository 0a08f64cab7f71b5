//! Run options.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_OUTDIR: &str = "fvm_out";

/// Knobs that shape one invocation of the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    pub outdir: PathBuf,
    /// Only run this top-level.
    pub design: Option<String>,
    /// Only run this step (and its post-steps).
    pub step: Option<String>,
    /// Keep going after a non-allowed failure.
    pub continue_on_error: bool,
    /// Open the tool GUI on each executed step after the run.
    pub gui: bool,
    /// Name of the verification program, used for report naming.
    pub script_name: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            outdir: PathBuf::from(DEFAULT_OUTDIR),
            design: None,
            step: None,
            continue_on_error: false,
            gui: false,
            script_name: "fvm".to_string(),
        }
    }
}

impl RunOptions {
    pub fn with_outdir(mut self, outdir: impl Into<PathBuf>) -> Self {
        self.outdir = outdir.into();
        self
    }

    pub fn with_script_name(mut self, name: &str) -> Self {
        self.script_name = name.to_string();
        self
    }
}
