//! The boundary between step run functions and the subprocess supervisor.
//!
//! Steps describe what to run as a [`ToolInvocation`]; a [`ToolExecutor`]
//! runs it, streams every line to a callback, and hands back the captured
//! streams once the process is gone.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// One external program invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Extra environment on top of the inherited one.
    pub env: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
}

impl ToolInvocation {
    pub fn new(program: &str, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: BTreeMap::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Shell-like rendering for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Which stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// How the child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum ExitKind {
    /// Normal exit with a status code.
    Code(i32),
    /// Killed by a signal nobody in the driver sent.
    Signaled,
    /// The supervisor enforced the step deadline.
    TimedOut,
    /// The user interrupted the run.
    Cancelled,
}

impl ExitKind {
    pub fn success(self) -> bool {
        self == ExitKind::Code(0)
    }
}

/// Everything captured from a finished process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub exit: ExitKind,
    pub started_at: DateTime<Utc>,
    /// Measured with a monotonic clock.
    pub elapsed: Duration,
}

impl ToolOutput {
    /// Both streams, stdout first, as archived in `<step>.log`.
    pub fn all_lines(&self) -> impl Iterator<Item = &str> {
        self.stdout
            .iter()
            .chain(self.stderr.iter())
            .map(String::as_str)
    }
}

/// Line callback; invoked synchronously for each line as it arrives.
pub type LineCallback<'a> = &'a (dyn Fn(StreamKind, &str) + Send + Sync);

/// Runs external processes on behalf of steps.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(
        &self,
        invocation: &ToolInvocation,
        on_line: LineCallback<'_>,
    ) -> Result<ToolOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_rendering() {
        let inv = ToolInvocation::new("qverify", "/tmp")
            .args(["-c", "-do"])
            .arg("lint.do");
        assert_eq!(inv.command_line(), "qverify -c -do lint.do");
    }

    #[test]
    fn test_exit_kind_success() {
        assert!(ExitKind::Code(0).success());
        assert!(!ExitKind::Code(2).success());
        assert!(!ExitKind::TimedOut.success());
    }
}
