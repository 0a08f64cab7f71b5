//! Structured lifecycle events for FVM runs.
//!
//! Every event carries an `event` field so log pipelines can filter on it
//! (`event=step.finished design=counter step=prove status=pass`).

use tracing::{info, warn};

/// RAII guard that scopes every log line to one design key.
pub struct DesignSpan {
    _span: tracing::span::EnteredSpan,
}

impl DesignSpan {
    pub fn enter(design_key: &str) -> Self {
        Self {
            _span: design_span(design_key).entered(),
        }
    }
}

/// The span behind [`DesignSpan`], for instrumenting async work.
pub fn design_span(design_key: &str) -> tracing::Span {
    tracing::info_span!("fvm.design", design = %design_key)
}

pub fn emit_run_started(script: &str, designs: usize, toolchain: &str) {
    info!(event = "run.started", script = %script, designs = designs, toolchain = %toolchain);
}

pub fn emit_design_started(design_key: &str, steps: usize) {
    info!(event = "design.started", design = %design_key, steps = steps);
}

pub fn emit_step_started(design_key: &str, step: &str) {
    info!(event = "step.started", design = %design_key, step = %step);
}

pub fn emit_step_finished(design_key: &str, step: &str, status: &str, elapsed_ms: u64) {
    info!(
        event = "step.finished",
        design = %design_key,
        step = %step,
        status = %status,
        elapsed_ms = elapsed_ms,
    );
}

pub fn emit_step_skipped(design_key: &str, step: &str, reason: &str) {
    info!(event = "step.skipped", design = %design_key, step = %step, reason = %reason);
}

pub fn emit_script_written(design_key: &str, step: &str, path: &str, digest: &str) {
    tracing::debug!(
        event = "script.written",
        design = %design_key,
        step = %step,
        path = %path,
        digest = %digest,
    );
}

pub fn emit_report_written(kind: &str, path: &str) {
    info!(event = "report.written", kind = %kind, path = %path);
}

/// Abort decisions are worth a warning even when the run continues.
pub fn emit_run_aborting(design_key: &str, step: &str, reason: &str) {
    warn!(event = "run.aborting", design = %design_key, step = %step, reason = %reason);
}

pub fn emit_run_finished(exit_code: i32, passed: usize, failed: usize, elapsed_ms: u64) {
    info!(
        event = "run.finished",
        exit_code = exit_code,
        passed = passed,
        failed = failed,
        elapsed_ms = elapsed_ms,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_design_span_enters() {
        let _span = DesignSpan::enter("counter.max_128");
        emit_step_started("counter.max_128", "lint");
    }
}
