//! Steps and the step registry.
//!
//! A step pairs a setup function (write the script into the step
//! directory) with a run function (execute the tool through a
//! [`ToolExecutor`], classify its output, decide pass or fail). The
//! registry keeps steps in execution order with their post-steps.

use crate::error::Result;
use crate::exec::{ExitKind, StreamKind, ToolExecutor, ToolInvocation, ToolOutput};
use crate::patterns::{count_of, ClassificationTable, ClassifiedLine, Severity};
use crate::script::ScriptArtifact;
use crate::summary::{MetricStyle, SummaryParser, ToolSummary};
use crate::toolchain::Toolchain;
use async_trait::async_trait;
use fvm_core::{format_timeout, Config, DesignKey, FailureClass, SourceFile, StepCatalog, StepNames};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Everything a setup or run function may look at.
///
/// The config is shared immutably; steps hold no reference back to the
/// driver.
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    pub config: &'a Config,
    /// Renders generics and timeouts in the tool's own syntax.
    pub toolchain: &'a dyn Toolchain,
    pub key: &'a DesignKey,
    /// Canonical step name, `parent.post` for post-steps.
    pub step: &'a str,
    /// `<outdir>/<design key>/<step>/`, owned by this step alone.
    pub step_dir: &'a Path,
    /// Property files produced by drom2psl for this design.
    pub generated_psl: &'a [SourceFile],
    /// Environment injected into every child.
    pub env: &'a BTreeMap<String, String>,
    /// Error lines are reported at warning level when set.
    pub failure_allowed: bool,
}

impl fmt::Debug for StepContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepContext")
            .field("toolchain", &self.toolchain.name())
            .field("key", &self.key)
            .field("step", &self.step)
            .field("step_dir", &self.step_dir)
            .field("failure_allowed", &self.failure_allowed)
            .finish_non_exhaustive()
    }
}

impl StepContext<'_> {
    pub fn design(&self) -> &str {
        &self.key.design
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.config.timeout(self.step)
    }

    pub fn coverage_goal(&self) -> Option<f64> {
        self.config.coverage_goal(self.step)
    }
}

/// Why a step failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum FailureReason {
    ExitStatus { code: i32 },
    Signaled,
    ErrorLines { count: usize },
    GoalNotMet { goal: f64, actual: Option<f64> },
    TimedOut { after: Duration },
}

impl FailureReason {
    pub fn class(&self) -> FailureClass {
        match self {
            FailureReason::GoalNotMet { .. } => FailureClass::GoalNotMet,
            _ => FailureClass::ToolError,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::ExitStatus { code } => write!(f, "tool exited with status {code}"),
            FailureReason::Signaled => f.write_str("tool was killed by a signal"),
            FailureReason::ErrorLines { count } => write!(f, "{count} error line(s) in tool output"),
            FailureReason::GoalNotMet {
                goal,
                actual: Some(actual),
            } => write!(f, "coverage {actual:.1}% below goal {goal:.1}%"),
            FailureReason::GoalNotMet { goal, actual: None } => {
                write!(f, "no coverage reported, goal {goal:.1}%")
            }
            FailureReason::TimedOut { after } => {
                write!(f, "timed out after {}", format_timeout(*after))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "verdict")]
pub enum Verdict {
    Passed,
    Failed(FailureReason),
    /// The run was interrupted while this step was in flight.
    Cancelled,
}

/// What a run function hands back to the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub verdict: Verdict,
    pub command: String,
    pub output: ToolOutput,
    pub messages: Vec<ClassifiedLine>,
    pub summary: ToolSummary,
    /// Console figure, rendered in the step's metric style.
    pub metric: String,
}

impl StepOutcome {
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Passed
    }

    /// Failure body for reports: the reason, then every error line.
    pub fn failure_message(&self) -> Option<String> {
        let Verdict::Failed(reason) = &self.verdict else {
            return None;
        };
        let mut message = reason.to_string();
        for line in self.messages.iter().filter(|m| m.severity == Severity::Error) {
            message.push('\n');
            message.push_str(&line.line);
        }
        Some(message)
    }
}

/// Rules a run function applies to a finished tool.
pub struct Evaluation<'a> {
    pub table: &'a ClassificationTable,
    pub parser: &'a dyn SummaryParser,
    pub style: MetricStyle,
    pub goal: Option<f64>,
    pub timeout: Option<Duration>,
}

/// Classify, scrape and judge a finished tool.
///
/// Cancellation wins over everything, then the exit status, then error
/// lines, then the coverage goal.
pub fn evaluate(command: String, output: ToolOutput, rules: &Evaluation<'_>) -> StepOutcome {
    let messages = rules.table.classify_lines(output.all_lines());
    let lines: Vec<&str> = output.all_lines().collect();
    let summary = rules.parser.parse(&lines);

    let verdict = match output.exit {
        ExitKind::Cancelled => Verdict::Cancelled,
        ExitKind::TimedOut => Verdict::Failed(FailureReason::TimedOut {
            after: rules.timeout.unwrap_or_default(),
        }),
        ExitKind::Signaled => Verdict::Failed(FailureReason::Signaled),
        ExitKind::Code(code) if code != 0 => Verdict::Failed(FailureReason::ExitStatus { code }),
        ExitKind::Code(_) => {
            let errors = count_of(&messages, Severity::Error);
            if errors > 0 {
                Verdict::Failed(FailureReason::ErrorLines { count: errors })
            } else {
                match rules.goal {
                    Some(goal) if summary.coverage.map_or(true, |pct| pct < goal) => {
                        Verdict::Failed(FailureReason::GoalNotMet {
                            goal,
                            actual: summary.coverage,
                        })
                    }
                    _ => Verdict::Passed,
                }
            }
        }
    };

    StepOutcome {
        verdict,
        command,
        metric: summary.metric(rules.style),
        output,
        messages,
        summary,
    }
}

/// Execute `invocation`, echoing classified lines as they arrive, then
/// evaluate the result.
pub async fn run_tool(
    ctx: &StepContext<'_>,
    exec: &dyn ToolExecutor,
    invocation: ToolInvocation,
    rules: &Evaluation<'_>,
) -> Result<StepOutcome> {
    let step = ctx.step;
    let allowed = ctx.failure_allowed;
    let table = rules.table;
    let echo = move |_stream: StreamKind, line: &str| match table.classify(line) {
        Some(Severity::Error) if allowed => tracing::warn!(step = %step, "{line}"),
        Some(Severity::Error) => tracing::error!(step = %step, "{line}"),
        Some(Severity::Warning) => tracing::warn!(step = %step, "{line}"),
        Some(Severity::Success) => tracing::info!(step = %step, "{line}"),
        None => tracing::debug!(step = %step, "{line}"),
    };

    tracing::info!(step = %step, command = %invocation.command_line(), "launching tool");
    let output = exec.execute(&invocation, &echo).await?;
    Ok(evaluate(invocation.command_line(), output, rules))
}

#[async_trait]
pub trait Step: Send + Sync {
    /// Canonical name, `parent.post` for post-steps.
    fn name(&self) -> &str;

    /// Write the step script into `ctx.step_dir`.
    fn setup(&self, ctx: &StepContext<'_>) -> Result<ScriptArtifact>;

    /// Run the tool over the script written by `setup`.
    async fn run(&self, ctx: &StepContext<'_>, exec: &dyn ToolExecutor) -> Result<StepOutcome>;

    /// Classification table for live and archived output.
    fn classification(&self) -> &ClassificationTable;

    /// Command that opens the step's results in the tool GUI.
    fn gui_invocation(&self, _ctx: &StepContext<'_>) -> Option<ToolInvocation> {
        None
    }
}

/// A step and its post-steps.
#[derive(Clone)]
pub struct StepEntry {
    pub step: Arc<dyn Step>,
    pub post_steps: Vec<Arc<dyn Step>>,
}

impl fmt::Debug for StepEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepEntry")
            .field("step", &self.step.name())
            .field(
                "post_steps",
                &self.post_steps.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Ordered steps of one toolchain.
#[derive(Debug, Clone, Default)]
pub struct StepRegistry {
    entries: Vec<StepEntry>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: Arc<dyn Step>) -> &mut Self {
        self.entries.push(StepEntry {
            step,
            post_steps: Vec::new(),
        });
        self
    }

    pub fn push_with_post_steps(
        &mut self,
        step: Arc<dyn Step>,
        post_steps: Vec<Arc<dyn Step>>,
    ) -> &mut Self {
        self.entries.push(StepEntry { step, post_steps });
        self
    }

    pub fn entries(&self) -> &[StepEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a step or post-step by canonical name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Step>> {
        self.entries.iter().find_map(|e| {
            if e.step.name() == name {
                Some(&e.step)
            } else {
                e.post_steps.iter().find(|p| p.name() == name)
            }
        })
    }

    /// Names only, for validating config references.
    pub fn catalog(&self) -> StepCatalog {
        StepCatalog::new(
            self.entries
                .iter()
                .map(|e| StepNames {
                    name: e.step.name().to_string(),
                    post_steps: e
                        .post_steps
                        .iter()
                        .map(|p| short_post_name(e.step.name(), p.name()))
                        .collect(),
                })
                .collect(),
        )
    }
}

fn short_post_name(parent: &str, qualified: &str) -> String {
    qualified
        .strip_prefix(parent)
        .and_then(|rest| rest.strip_prefix('.'))
        .unwrap_or(qualified)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::KeywordSummaryParser;
    use chrono::Utc;

    fn output(exit: ExitKind, stdout: &[&str]) -> ToolOutput {
        ToolOutput {
            stdout: stdout.iter().map(|s| s.to_string()).collect(),
            stderr: Vec::new(),
            exit,
            started_at: Utc::now(),
            elapsed: Duration::from_millis(5),
        }
    }

    fn rules<'a>(table: &'a ClassificationTable, goal: Option<f64>) -> Evaluation<'a> {
        Evaluation {
            table,
            parser: &KeywordSummaryParser,
            style: MetricStyle::Coverage,
            goal,
            timeout: Some(Duration::from_secs(600)),
        }
    }

    fn table() -> ClassificationTable {
        ClassificationTable::new()
            .ignore(&["errors: 0"])
            .error(&["error"])
    }

    #[test]
    fn test_clean_exit_passes() {
        let t = table();
        let out = evaluate("t".into(), output(ExitKind::Code(0), &["Errors: 0"]), &rules(&t, None));
        assert!(out.passed());
        assert!(out.failure_message().is_none());
    }

    #[test]
    fn test_error_line_fails_clean_exit() {
        let t = table();
        let out = evaluate(
            "t".into(),
            output(ExitKind::Code(0), &["** Error: bad port"]),
            &rules(&t, None),
        );
        assert_eq!(
            out.verdict,
            Verdict::Failed(FailureReason::ErrorLines { count: 1 })
        );
        let msg = out.failure_message().unwrap();
        assert!(msg.contains("** Error: bad port"));
    }

    #[test]
    fn test_goal_enforcement() {
        let t = table();
        let below = evaluate(
            "t".into(),
            output(ExitKind::Code(0), &["Coverage: 60.0%"]),
            &rules(&t, Some(75.0)),
        );
        let Verdict::Failed(reason) = &below.verdict else {
            panic!("expected failure");
        };
        assert_eq!(reason.class(), FailureClass::GoalNotMet);
        assert_eq!(reason.to_string(), "coverage 60.0% below goal 75.0%");

        let met = evaluate(
            "t".into(),
            output(ExitKind::Code(0), &["Coverage: 75.0%"]),
            &rules(&t, Some(75.0)),
        );
        assert!(met.passed());
    }

    #[test]
    fn test_timeout_message() {
        let t = table();
        let out = evaluate("t".into(), output(ExitKind::TimedOut, &[]), &rules(&t, None));
        let Verdict::Failed(reason) = out.verdict else {
            panic!("expected failure");
        };
        assert_eq!(reason.to_string(), "timed out after 10m");
        assert_eq!(reason.class(), FailureClass::ToolError);
    }

    #[test]
    fn test_cancelled_beats_error_lines() {
        let t = table();
        let out = evaluate("t".into(), output(ExitKind::Cancelled, &["error"]), &rules(&t, None));
        assert_eq!(out.verdict, Verdict::Cancelled);
    }

    #[test]
    fn test_short_post_name() {
        assert_eq!(short_post_name("prove", "prove.formalcover"), "formalcover");
        assert_eq!(short_post_name("prove", "simcover"), "simcover");
    }
}
