//! Subprocess supervisor.
//!
//! Each child runs in its own process group. Two reader tasks drain stdout
//! and stderr into one channel; the supervising task hands every line to
//! the caller's callback and races child exit against the step deadline
//! and the run's cancel token. Termination signals go to the whole group.

use crate::cancel::CancelToken;
use async_trait::async_trait;
use chrono::Utc;
use fvm_toolchain::{
    ExitKind, LineCallback, StreamKind, ToolExecutor, ToolInvocation, ToolOutput, ToolchainError,
};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};

/// How long a group gets between the polite signal and SIGKILL.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// Stand-in deadline for timers that are not armed.
const NEVER: Duration = Duration::from_secs(60 * 60 * 24 * 365);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupSignal {
    Interrupt,
    Terminate,
    Kill,
}

#[cfg(unix)]
fn signal_group(pgid: Option<u32>, signal: GroupSignal) {
    let Some(pgid) = pgid else {
        return;
    };
    let signo = match signal {
        GroupSignal::Interrupt => libc::SIGINT,
        GroupSignal::Terminate => libc::SIGTERM,
        GroupSignal::Kill => libc::SIGKILL,
    };
    // SAFETY: killpg has no memory-safety preconditions; a stale pgid only
    // yields ESRCH.
    let rc = unsafe { libc::killpg(pgid as libc::pid_t, signo) };
    if rc != 0 {
        tracing::debug!(pgid, ?signal, error = %std::io::Error::last_os_error(), "killpg failed");
    }
}

#[cfg(not(unix))]
fn signal_group(_pgid: Option<u32>, signal: GroupSignal) {
    tracing::warn!(?signal, "process-group signals are not supported on this platform");
}

fn spawn_reader<R>(reader: R, stream: StreamKind, tx: mpsc::UnboundedSender<(StreamKind, String)>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send((stream, line)).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(?stream, error = %e, "stream read failed");
                    break;
                }
            }
        }
    });
}

/// The production [`ToolExecutor`].
#[derive(Debug, Clone)]
pub struct Supervisor {
    cancel: CancelToken,
    kill_grace: Duration,
}

impl Supervisor {
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            cancel,
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }

    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    fn command(invocation: &ToolInvocation) -> Command {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .current_dir(&invocation.cwd)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

#[async_trait]
impl ToolExecutor for Supervisor {
    async fn execute(
        &self,
        invocation: &ToolInvocation,
        on_line: LineCallback<'_>,
    ) -> fvm_toolchain::Result<ToolOutput> {
        let started_at = Utc::now();
        let start = Instant::now();

        if self.cancel.is_cancelled() {
            return Ok(ToolOutput {
                stdout: Vec::new(),
                stderr: Vec::new(),
                exit: ExitKind::Cancelled,
                started_at,
                elapsed: Duration::ZERO,
            });
        }

        let mut child = Self::command(invocation)
            .spawn()
            .map_err(|source| ToolchainError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;
        let pgid = child.id();
        tracing::debug!(program = %invocation.program, pid = ?pgid, "child spawned");

        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Some(out) = child.stdout.take() {
            spawn_reader(out, StreamKind::Stdout, tx.clone());
        }
        if let Some(err) = child.stderr.take() {
            spawn_reader(err, StreamKind::Stderr, tx.clone());
        }
        drop(tx);

        let deadline = sleep(invocation.timeout.unwrap_or(NEVER));
        tokio::pin!(deadline);
        let escalation = sleep(NEVER);
        tokio::pin!(escalation);

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut status = None;
        let mut forced: Option<ExitKind> = None;
        let mut escalating = false;
        let mut streams_open = true;

        while status.is_none() || streams_open {
            tokio::select! {
                msg = rx.recv(), if streams_open => match msg {
                    Some((stream, line)) => {
                        on_line(stream, &line);
                        match stream {
                            StreamKind::Stdout => stdout.push(line),
                            StreamKind::Stderr => stderr.push(line),
                        }
                    }
                    None => streams_open = false,
                },
                waited = child.wait(), if status.is_none() => {
                    let exit_status = waited.map_err(|source| ToolchainError::Spawn {
                        program: invocation.program.clone(),
                        source,
                    })?;
                    status = Some(exit_status);
                    if forced.is_some() {
                        // Leftover descendants would hold the pipes open.
                        signal_group(pgid, GroupSignal::Kill);
                    }
                },
                // Descendants may hold the pipes open after the child
                // itself exits, so the deadline keeps running until both
                // streams are drained.
                _ = &mut deadline, if forced.is_none() && invocation.timeout.is_some() => {
                    tracing::warn!(program = %invocation.program, "step deadline reached, terminating");
                    forced = Some(ExitKind::TimedOut);
                    signal_group(pgid, GroupSignal::Terminate);
                    escalation.as_mut().reset(Instant::now() + self.kill_grace);
                    escalating = true;
                },
                _ = self.cancel.cancelled(), if forced.is_none() => {
                    forced = Some(ExitKind::Cancelled);
                    signal_group(pgid, GroupSignal::Interrupt);
                    escalation.as_mut().reset(Instant::now() + self.kill_grace);
                    escalating = true;
                },
                _ = &mut escalation, if escalating => {
                    tracing::warn!(program = %invocation.program, "child ignored termination, killing");
                    signal_group(pgid, GroupSignal::Kill);
                    escalating = false;
                },
            }
        }

        let exit = match (forced, status) {
            (Some(kind), _) => kind,
            (None, Some(st)) => st.code().map_or(ExitKind::Signaled, ExitKind::Code),
            (None, None) => ExitKind::Signaled,
        };

        Ok(ToolOutput {
            stdout,
            stderr,
            exit,
            started_at,
            elapsed: start.elapsed(),
        })
    }
}

/// Start a GUI or viewer without waiting for it.
pub fn spawn_detached(invocation: &ToolInvocation) -> fvm_toolchain::Result<()> {
    let mut cmd = std::process::Command::new(&invocation.program);
    cmd.args(&invocation.args)
        .current_dir(&invocation.cwd)
        .envs(&invocation.env)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    let child = cmd.spawn().map_err(|source| ToolchainError::Spawn {
        program: invocation.program.clone(),
        source,
    })?;
    tracing::info!(command = %invocation.command_line(), pid = child.id(), "gui launched");
    Ok(())
}
