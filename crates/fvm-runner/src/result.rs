//! Result store: per (design, step) outcomes of one run.

use crate::error::{Result, RunnerError};
use chrono::{DateTime, Utc};
use fvm_core::{DesignKey, FailureClass};
use fvm_toolchain::{ClassifiedLine, ScriptArtifact, StepOutcome, ToolSummary};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SUMMARY_JSON: &str = "fvm_summary.json";

/// Lifecycle of one step: `pending -> running -> sealed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Pass,
    Fail,
    Skip,
    /// Never reached: the run aborted, was cancelled, or the step was
    /// filtered out.
    Omit,
    /// Killed in flight, or the framework itself malfunctioned.
    Broken,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Pass => "pass",
            StepStatus::Fail => "fail",
            StepStatus::Skip => "skip",
            StepStatus::Omit => "omit",
            StepStatus::Broken => "broken",
        }
    }

    /// Console marker.
    pub fn symbol(self) -> &'static str {
        match self {
            StepStatus::Pass => "✓",
            StepStatus::Fail => "✗",
            StepStatus::Broken => "!",
            StepStatus::Skip | StepStatus::Omit => "-",
            StepStatus::Pending | StepStatus::Running => "…",
        }
    }

    pub fn is_sealed(self) -> bool {
        !matches!(self, StepStatus::Pending | StepStatus::Running)
    }

    /// Whether the tool actually ran.
    pub fn was_executed(self) -> bool {
        matches!(self, StepStatus::Pass | StepStatus::Fail | StepStatus::Broken)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step: String,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub elapsed: Duration,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub messages: Vec<ClassifiedLine>,
    pub summary: Option<ToolSummary>,
    pub metric: String,
    /// Failure body, or the reason a step was skipped or omitted.
    pub message: Option<String>,
    pub failure_class: Option<FailureClass>,
    /// Failure was downgraded by an allow-failure rule.
    pub allowed: bool,
    pub log_path: Option<PathBuf>,
    pub script: Option<ScriptArtifact>,
    pub command: Option<String>,
}

impl StepResult {
    pub fn pending(step: &str) -> Self {
        Self {
            step: step.to_string(),
            status: StepStatus::Pending,
            started_at: None,
            elapsed: Duration::ZERO,
            stdout: Vec::new(),
            stderr: Vec::new(),
            messages: Vec::new(),
            summary: None,
            metric: String::new(),
            message: None,
            failure_class: None,
            allowed: false,
            log_path: None,
            script: None,
            command: None,
        }
    }

    pub fn skipped(step: &str, reason: &str) -> Self {
        let mut result = Self::pending(step);
        result.status = StepStatus::Skip;
        result.message = Some(reason.to_string());
        result
    }

    pub fn omitted(step: &str, reason: &str) -> Self {
        let mut result = Self::pending(step);
        result.status = StepStatus::Omit;
        result.message = Some(reason.to_string());
        result
    }

    pub fn start(&mut self) {
        self.status = StepStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Seal from a finished tool run.
    pub fn seal_outcome(&mut self, outcome: StepOutcome, allowed: bool) {
        use fvm_toolchain::Verdict;

        self.message = outcome.failure_message();
        match &outcome.verdict {
            Verdict::Passed => self.status = StepStatus::Pass,
            Verdict::Failed(reason) => {
                self.status = StepStatus::Fail;
                self.failure_class = Some(reason.class());
                self.allowed = allowed;
            }
            Verdict::Cancelled => {
                self.status = StepStatus::Broken;
                self.failure_class = Some(FailureClass::Interrupted);
                self.message = Some("interrupted".to_string());
            }
        }
        self.started_at = Some(outcome.output.started_at);
        self.elapsed = outcome.output.elapsed;
        self.command = Some(outcome.command);
        self.metric = outcome.metric;
        self.summary = Some(outcome.summary);
        self.messages = outcome.messages;
        self.stdout = outcome.output.stdout;
        self.stderr = outcome.output.stderr;
    }

    /// Seal as broken without a tool outcome.
    pub fn seal_broken(&mut self, message: impl Into<String>, class: FailureClass, allowed: bool) {
        self.status = StepStatus::Broken;
        self.message = Some(message.into());
        self.failure_class = Some(class);
        self.allowed = allowed;
        if let Some(at) = self.started_at {
            self.elapsed = (Utc::now() - at).to_std().unwrap_or_default();
        }
    }

    /// A failure that should stop the run.
    pub fn is_blocking(&self) -> bool {
        matches!(self.status, StepStatus::Fail | StepStatus::Broken) && !self.allowed
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        let elapsed = chrono::Duration::from_std(self.elapsed).ok()?;
        self.started_at.map(|at| at + elapsed)
    }

    /// Archive the captured streams, stdout then stderr.
    pub fn write_log(&mut self, step_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(step_dir).map_err(|e| RunnerError::io(step_dir, e))?;
        let path = step_dir.join(format!("{}.log", self.step));
        let mut contents = String::new();
        for line in self.stdout.iter().chain(self.stderr.iter()) {
            contents.push_str(line);
            contents.push('\n');
        }
        std::fs::write(&path, contents).map_err(|e| RunnerError::io(&path, e))?;
        self.log_path = Some(path.clone());
        Ok(path)
    }
}

/// All step results of one design key, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignResults {
    pub key: DesignKey,
    pub steps: Vec<StepResult>,
}

impl DesignResults {
    pub fn new(key: DesignKey) -> Self {
        Self {
            key,
            steps: Vec::new(),
        }
    }

    pub fn get(&self, step: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.step == step)
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }

    pub fn elapsed(&self) -> Duration {
        self.steps.iter().map(|s| s.elapsed).sum()
    }
}

/// Everything one invocation of the driver produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResults {
    pub script_name: String,
    pub prefix: String,
    pub toolchain: String,
    pub outdir: PathBuf,
    pub designs: Vec<DesignResults>,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub cancelled: bool,
    pub exit_code: i32,
    pub violations: Vec<String>,
}

impl RunResults {
    pub fn count(&self, status: StepStatus) -> usize {
        self.designs.iter().map(|d| d.count(status)).sum()
    }

    pub fn passed_count(&self) -> usize {
        self.count(StepStatus::Pass)
    }

    /// Failed and broken steps.
    pub fn failed_count(&self) -> usize {
        self.count(StepStatus::Fail) + self.count(StepStatus::Broken)
    }

    pub fn total_steps(&self) -> usize {
        self.designs.iter().map(|d| d.steps.len()).sum()
    }

    /// Sum of step times, which excludes setup and reporting.
    pub fn step_time(&self) -> Duration {
        self.designs.iter().map(DesignResults::elapsed).sum()
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn write_summary_json(&self) -> Result<PathBuf> {
        let path = self.outdir.join(SUMMARY_JSON);
        let json = serde_json::to_string_pretty(self).map_err(|source| {
            RunnerError::Serialization {
                what: "run summary",
                source,
            }
        })?;
        std::fs::write(&path, json).map_err(|e| RunnerError::io(&path, e))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fvm_toolchain::{ExitKind, FailureReason, ToolOutput, Verdict};

    fn outcome(verdict: Verdict) -> StepOutcome {
        StepOutcome {
            verdict,
            command: "qverify -c -od . -do lint.do".to_string(),
            output: ToolOutput {
                stdout: vec!["line one".to_string()],
                stderr: vec!["line two".to_string()],
                exit: ExitKind::Code(0),
                started_at: Utc::now(),
                elapsed: Duration::from_millis(1500),
            },
            messages: Vec::new(),
            summary: ToolSummary::default(),
            metric: "0E 0W".to_string(),
        }
    }

    #[test]
    fn test_lifecycle_to_pass() {
        let mut result = StepResult::pending("lint");
        assert!(!result.status.is_sealed());
        result.start();
        assert_eq!(result.status, StepStatus::Running);
        result.seal_outcome(outcome(Verdict::Passed), false);
        assert_eq!(result.status, StepStatus::Pass);
        assert!(result.status.is_sealed());
        assert_eq!(result.elapsed, Duration::from_millis(1500));
        assert!(!result.is_blocking());
    }

    #[test]
    fn test_allowed_failure_does_not_block() {
        let mut result = StepResult::pending("prove.formalcover");
        result.seal_outcome(
            outcome(Verdict::Failed(FailureReason::ExitStatus { code: 2 })),
            true,
        );
        assert_eq!(result.status, StepStatus::Fail);
        assert_eq!(result.failure_class, Some(FailureClass::ToolError));
        assert!(!result.is_blocking());
    }

    #[test]
    fn test_cancelled_is_broken() {
        let mut result = StepResult::pending("prove");
        result.seal_outcome(outcome(Verdict::Cancelled), false);
        assert_eq!(result.status, StepStatus::Broken);
        assert_eq!(result.failure_class, Some(FailureClass::Interrupted));
    }

    #[test]
    fn test_log_is_stdout_then_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let mut result = StepResult::pending("lint");
        result.seal_outcome(outcome(Verdict::Passed), false);
        let path = result.write_log(&dir.path().join("lint")).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "line one\nline two\n");
        assert_eq!(result.log_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_counts() {
        let mut design = DesignResults::new(DesignKey::new("counter", None));
        design.steps.push(StepResult::skipped("lint", "skip"));
        design.steps.push(StepResult::omitted("prove", "omit"));
        assert_eq!(design.count(StepStatus::Skip), 1);
        assert_eq!(design.count(StepStatus::Omit), 1);
        assert!(design.get("prove").is_some());
    }
}
