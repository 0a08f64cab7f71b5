//! Dashboard renderer, an external binary found on PATH.

use crate::archive::REPORT_DIR;
use fvm_toolchain::{StreamKind, ToolExecutor, ToolInvocation, ToolchainError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable naming the renderer binary.
pub const DASHBOARD_ENV: &str = "FVM_DASHBOARD";

pub const DEFAULT_DASHBOARD: &str = "allure";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    program: String,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new(DEFAULT_DASHBOARD)
    }
}

impl Dashboard {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }

    pub fn from_env() -> Self {
        match std::env::var(DASHBOARD_ENV) {
            Ok(program) if !program.trim().is_empty() => Self::new(program.trim()),
            _ => Self::default(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn invocation(&self, outdir: &Path, results: &Path) -> ToolInvocation {
        ToolInvocation::new(&self.program, outdir)
            .arg("generate")
            .arg(results.to_string_lossy())
            .arg("-o")
            .arg(outdir.join(REPORT_DIR).to_string_lossy())
            .arg("--clean")
    }

    /// Rebuild the dashboard. A missing or failing renderer is a warning,
    /// never a run failure.
    pub async fn render(
        &self,
        exec: &dyn ToolExecutor,
        outdir: &Path,
        results: &Path,
        env: &BTreeMap<String, String>,
    ) -> Option<PathBuf> {
        let invocation = self.invocation(outdir, results).envs(env);
        let echo = |_stream: StreamKind, line: &str| tracing::debug!(tool = "dashboard", "{line}");

        match exec.execute(&invocation, &echo).await {
            Ok(output) if output.exit.success() => Some(outdir.join(REPORT_DIR)),
            Ok(output) => {
                tracing::warn!(program = %self.program, exit = ?output.exit, "dashboard renderer failed");
                None
            }
            Err(ToolchainError::Spawn { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                tracing::warn!(program = %self.program, "dashboard renderer not found on PATH, skipping");
                None
            }
            Err(e) => {
                tracing::warn!(program = %self.program, error = %e, "dashboard renderer failed to start");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_chains_results_into_report() {
        let inv = Dashboard::default().invocation(Path::new("/out"), Path::new("/out/fvm_results"));
        assert_eq!(inv.program, "allure");
        assert_eq!(
            inv.args,
            vec!["generate", "/out/fvm_results", "-o", "/out/fvm_report", "--clean"]
        );
        assert_eq!(inv.cwd, PathBuf::from("/out"));
    }
}
