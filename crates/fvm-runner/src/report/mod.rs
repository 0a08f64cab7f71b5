//! Reports produced after the last step is sealed.
//!
//! Order matters for history continuity: previous results are rotated
//! into `fvm_history/` before the new XML is written, and the dashboard
//! runs last so it sees the carried-over `history/`.

pub mod console;
pub mod dashboard;
pub mod html;
pub mod junit;

pub use console::{format_elapsed, render_summary};
pub use dashboard::{Dashboard, DASHBOARD_ENV, DEFAULT_DASHBOARD};
pub use html::{render_html, SUMMARY_HTML};
pub use junit::{escape_xml, render_junit, sanitized_script_name};

use crate::archive::{archive_timestamp, rotate_results};
use crate::error::{Result, RunnerError};
use crate::result::RunResults;
use chrono::Utc;
use fvm_core::obs::emit_report_written;
use fvm_toolchain::ToolExecutor;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Paths of everything a [`Reporter`] wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSet {
    pub junit: PathBuf,
    pub json: PathBuf,
    pub html: PathBuf,
    pub dashboard: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct Reporter {
    dashboard: Dashboard,
    quiet: bool,
}

impl Reporter {
    pub fn new(dashboard: Dashboard) -> Self {
        Self {
            dashboard,
            quiet: false,
        }
    }

    /// Skip printing the console table.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub async fn finalize(
        &self,
        run: &RunResults,
        exec: &dyn ToolExecutor,
        env: &BTreeMap<String, String>,
    ) -> Result<ReportSet> {
        let outdir = &run.outdir;
        std::fs::create_dir_all(outdir).map_err(|e| RunnerError::io(outdir, e))?;

        let results_dir = rotate_results(outdir, &archive_timestamp(Utc::now()))?;

        let junit = results_dir.join(format!("{}.xml", sanitized_script_name(&run.script_name)));
        std::fs::write(&junit, render_junit(run)).map_err(|e| RunnerError::io(&junit, e))?;
        emit_report_written("junit", &junit.display().to_string());

        let json = run.write_summary_json()?;
        emit_report_written("json", &json.display().to_string());

        let html = outdir.join(SUMMARY_HTML);
        std::fs::write(&html, render_html(run)).map_err(|e| RunnerError::io(&html, e))?;
        emit_report_written("html", &html.display().to_string());

        if !self.quiet {
            println!("{}", render_summary(run));
        }

        let dashboard = self.dashboard.render(exec, outdir, &results_dir, env).await;
        if let Some(path) = &dashboard {
            emit_report_written("dashboard", &path.display().to_string());
        }

        Ok(ReportSet {
            junit,
            json,
            html,
            dashboard,
        })
    }
}
