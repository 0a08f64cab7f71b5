//! The driver: a sequential state machine over design keys and steps.
//!
//! For every selected design key, in registration order:
//! 1. archive the previous artifacts into `previous_executions/`
//! 2. translate wavedrom sources with drom2psl, if there are any
//! 3. run the setup function of every step that is going to run
//! 4. execute the steps in registry order, post-steps right after their
//!    parent, applying skip and allow-failure policies
//!
//! Reports are written once every step of every design is sealed, and
//! always, including after an abort or an interrupt.

use crate::archive::{archive_design_dir, archive_timestamp};
use crate::cancel::CancelToken;
use crate::error::{Result, RunnerError};
use crate::gate::RunGate;
use crate::options::RunOptions;
use crate::report::{Dashboard, Reporter};
use crate::result::{DesignResults, RunResults, StepResult, StepStatus};
use crate::supervisor::{spawn_detached, Supervisor};
use chrono::Utc;
use fvm_core::obs::{
    design_span, emit_design_started, emit_run_aborting, emit_run_finished, emit_run_started,
    emit_script_written, emit_step_finished, emit_step_skipped, emit_step_started,
};
use fvm_core::{
    Config, DesignKey, DesignSpan, FailureClass, FvmError, Hook, HookContext, HookPhase, RunLog,
    SourceFile, SourceKind,
};
use fvm_toolchain::{
    Drom2Psl, ScriptArtifact, Step, StepContext, StreamKind, ToolExecutor, ToolInvocation,
    Toolchain,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// License-manager diagnostics variable injected into every child.
pub const FLEXLM_ENV: &str = "FLEXLM_DIAGNOSTICS_PATH";
pub const FLEXLM_LOG: &str = ".flexlm.log";

/// What the driver intends to do with one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    Run,
    Skip,
    Omit,
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlanAction::Run => "run",
            PlanAction::Skip => "skip",
            PlanAction::Omit => "omit",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedStep {
    pub step: String,
    pub action: PlanAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedDesign {
    pub key: DesignKey,
    /// Steps and post-steps in execution order.
    pub steps: Vec<PlannedStep>,
}

/// Human-readable plan, as printed by `--list`.
pub fn render_plan(plan: &[PlannedDesign]) -> String {
    let mut out = String::new();
    for design in plan {
        out.push_str(&design.key.to_string());
        out.push('\n');
        for step in &design.steps {
            match step.action {
                PlanAction::Run => out.push_str(&format!("  {}\n", step.step)),
                action => out.push_str(&format!("  {} [{}]\n", step.step, action)),
            }
        }
    }
    out
}

#[derive(Debug, Default)]
struct RunState {
    aborting: bool,
    cancelled: bool,
}

impl RunState {
    fn halted(&self) -> bool {
        self.aborting || self.cancelled
    }

    fn reason(&self) -> &'static str {
        if self.cancelled {
            "run interrupted"
        } else {
            "run aborted"
        }
    }
}

/// Something went wrong before the first step of a design could run.
struct PreludeFailure {
    /// Step whose setup failed, if the failure is tied to one.
    step: Option<String>,
    error: RunnerError,
}

impl PreludeFailure {
    fn design(error: impl Into<RunnerError>) -> Self {
        Self {
            step: None,
            error: error.into(),
        }
    }
}

pub struct Driver {
    config: Config,
    toolchain: Arc<dyn Toolchain>,
    executor: Arc<dyn ToolExecutor>,
    cancel: CancelToken,
    options: RunOptions,
    run_log: RunLog,
    drom: Drom2Psl,
    reporter: Reporter,
}

impl Driver {
    /// A driver backed by the real subprocess supervisor.
    pub fn new(config: Config, toolchain: Arc<dyn Toolchain>, options: RunOptions) -> Self {
        let cancel = CancelToken::new();
        let executor = Arc::new(Supervisor::new(cancel.clone()));
        Self {
            config,
            toolchain,
            executor,
            cancel,
            options,
            run_log: RunLog::new(),
            drom: Drom2Psl::from_env(),
            reporter: Reporter::new(Dashboard::from_env()),
        }
    }

    /// Swap the executor, e.g. for a fake in tests. The executor should
    /// watch [`Driver::cancel_token`] if it supports interruption.
    pub fn with_executor(mut self, executor: Arc<dyn ToolExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_drom2psl(mut self, drom: Drom2Psl) -> Self {
        self.drom = drom;
        self
    }

    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn run_log(&self) -> &RunLog {
        &self.run_log
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn validate_filters(&self) -> Result<()> {
        if let Some(design) = &self.options.design {
            if !self.config.toplevels().iter().any(|t| t == design) {
                return Err(FvmError::UnknownDesign(design.clone()).into());
            }
        }
        if let Some(step) = &self.options.step {
            let known = self
                .toolchain
                .steps()
                .entries()
                .iter()
                .any(|e| e.step.name() == step);
            if !known {
                return Err(FvmError::UnknownStep(step.clone()).into());
            }
        }
        Ok(())
    }

    fn selected_keys(&self) -> Vec<DesignKey> {
        self.config
            .design_keys()
            .into_iter()
            .filter(|key| {
                self.options
                    .design
                    .as_deref()
                    .map_or(true, |d| d == key.design)
            })
            .collect()
    }

    fn step_selected(&self, step: &str) -> bool {
        self.options.step.as_deref().map_or(true, |s| s == step)
    }

    fn plan_design(&self, key: &DesignKey) -> PlannedDesign {
        let policy = self.config.policy();
        let mut steps = Vec::new();
        for entry in self.toolchain.steps().entries() {
            let parent = entry.step.name();
            let parent_action = if !self.step_selected(parent) {
                PlanAction::Omit
            } else if policy.is_skipped(&key.design, parent) {
                PlanAction::Skip
            } else {
                PlanAction::Run
            };
            steps.push(PlannedStep {
                step: parent.to_string(),
                action: parent_action,
            });
            for post in &entry.post_steps {
                // A post-step never inherits its parent's skip.
                let action = match parent_action {
                    PlanAction::Omit => PlanAction::Omit,
                    _ if policy.is_skipped(&key.design, post.name()) => PlanAction::Skip,
                    PlanAction::Skip => PlanAction::Omit,
                    PlanAction::Run => PlanAction::Run,
                };
                steps.push(PlannedStep {
                    step: post.name().to_string(),
                    action,
                });
            }
        }
        PlannedDesign {
            key: key.clone(),
            steps,
        }
    }

    /// What a run would do, without touching the filesystem.
    pub fn plan(&self) -> Result<Vec<PlannedDesign>> {
        self.config.validate()?;
        self.validate_filters()?;
        Ok(self
            .selected_keys()
            .iter()
            .map(|key| self.plan_design(key))
            .collect())
    }

    fn child_env(&self, create: bool) -> Result<BTreeMap<String, String>> {
        let outdir = &self.options.outdir;
        if create {
            std::fs::create_dir_all(outdir).map_err(|e| RunnerError::io(outdir, e))?;
        }
        let abs = std::path::absolute(outdir).map_err(|e| RunnerError::io(outdir, e))?;
        let flexlm = abs.join(FLEXLM_LOG);
        if create {
            std::fs::create_dir_all(&flexlm).map_err(|e| RunnerError::io(&flexlm, e))?;
        }
        let mut env = BTreeMap::new();
        env.insert(FLEXLM_ENV.to_string(), flexlm.display().to_string());
        Ok(env)
    }

    /// Execute every selected design key and write the reports.
    ///
    /// Returns `Err` only for configuration problems detected before the
    /// output directory is touched; everything after that is recorded in
    /// the returned results and their exit code.
    pub async fn run(&self) -> Result<RunResults> {
        self.config.validate()?;
        self.validate_filters()?;

        let started_at = Utc::now();
        let clock = Instant::now();
        let env = self.child_env(true)?;
        let keys = self.selected_keys();
        emit_run_started(&self.options.script_name, keys.len(), self.toolchain.name());

        let mut state = RunState::default();
        let mut designs = Vec::with_capacity(keys.len());
        for key in &keys {
            let results = self
                .run_design(key, &env, &mut state)
                .instrument(design_span(&key.to_string()))
                .await;
            designs.push(results);
        }
        state.cancelled |= self.cancel.is_cancelled();

        let verdict = RunGate::evaluate(&designs, state.cancelled, self.run_log.error_count());
        tracing::info!(passed = verdict.passed, exit_code = verdict.exit_code, "{}", verdict.message);

        let mut run = RunResults {
            script_name: self.options.script_name.clone(),
            prefix: self.config.prefix().to_string(),
            toolchain: self.toolchain.name().to_string(),
            outdir: self.options.outdir.clone(),
            designs,
            started_at,
            elapsed: clock.elapsed(),
            cancelled: state.cancelled,
            exit_code: verdict.exit_code,
            violations: verdict.violations,
        };

        if let Err(e) = self
            .reporter
            .finalize(&run, self.executor.as_ref(), &env)
            .await
        {
            self.run_log.error(format!("report generation failed: {e}"));
            if run.exit_code == 0 {
                run.exit_code = FailureClass::CheckFailed.exit_code();
            }
        }

        if self.options.gui && !state.cancelled {
            self.launch_gui(&run, &env);
        }

        emit_run_finished(
            run.exit_code,
            run.passed_count(),
            run.failed_count(),
            run.elapsed.as_millis() as u64,
        );
        Ok(run)
    }

    async fn run_design(
        &self,
        key: &DesignKey,
        env: &BTreeMap<String, String>,
        state: &mut RunState,
    ) -> DesignResults {
        let key_name = key.to_string();
        let plan = self.plan_design(key);
        let mut results = DesignResults::new(key.clone());

        if self.cancel.is_cancelled() {
            state.cancelled = true;
        }
        if state.halted() {
            for planned in &plan.steps {
                results
                    .steps
                    .push(StepResult::omitted(&planned.step, state.reason()));
            }
            return results;
        }

        let runnable = plan
            .steps
            .iter()
            .filter(|s| s.action == PlanAction::Run)
            .count();
        emit_design_started(&key_name, runnable);

        let design_dir = self.options.outdir.join(key.dir_name());
        let (scripts, generated) = match self.prepare_design(key, &plan, &design_dir, env).await {
            Ok(prepared) => prepared,
            Err(failure) => {
                self.record_prelude_failure(&mut results, &plan, failure, state);
                return results;
            }
        };

        let mut planned = plan.steps.iter();
        for entry in self.toolchain.steps().entries() {
            let parent_action = planned.next().map_or(PlanAction::Omit, |p| p.action);
            let parent = self
                .dispatch(&entry.step, parent_action, key, &design_dir, &generated, env, &scripts, state)
                .await;
            let parent_blocked =
                parent.status != StepStatus::Pass && parent_action != PlanAction::Omit;
            results.steps.push(parent);

            for post in &entry.post_steps {
                let action = planned.next().map_or(PlanAction::Omit, |p| p.action);
                let result = if action != PlanAction::Skip && parent_blocked && !state.halted() {
                    StepResult::omitted(post.name(), "parent step did not pass")
                } else {
                    self.dispatch(post, action, key, &design_dir, &generated, env, &scripts, state)
                        .await
                };
                results.steps.push(result);
            }
        }
        results
    }

    /// Archive, translate wavedrom sources, then set up every step that
    /// is going to run.
    async fn prepare_design(
        &self,
        key: &DesignKey,
        plan: &PlannedDesign,
        design_dir: &Path,
        env: &BTreeMap<String, String>,
    ) -> std::result::Result<(BTreeMap<String, ScriptArtifact>, Vec<SourceFile>), PreludeFailure>
    {
        let outdir = &self.options.outdir;
        archive_design_dir(outdir, &key.dir_name(), &archive_timestamp(Utc::now()))
            .map_err(PreludeFailure::design)?;

        let wavedrom: Vec<&SourceFile> = self.config.sources_of(SourceKind::WaveJson).collect();
        let generated = if wavedrom.is_empty() {
            Vec::new()
        } else {
            let drom_dir = outdir.join(&key.design).join("drom2psl");
            self.drom
                .translate(self.executor.as_ref(), &wavedrom, &drom_dir, env)
                .await
                .map_err(PreludeFailure::design)?
        };

        let key_name = key.to_string();
        let mut scripts = BTreeMap::new();
        for planned in plan.steps.iter().filter(|s| s.action == PlanAction::Run) {
            let Some(step) = self.toolchain.steps().get(&planned.step) else {
                continue;
            };
            let step_dir = design_dir.join(step.name());
            let ctx = StepContext {
                config: &self.config,
                toolchain: self.toolchain.as_ref(),
                key,
                step: step.name(),
                step_dir: &step_dir,
                generated_psl: &generated,
                env,
                failure_allowed: false,
            };
            let artifact = step.setup(&ctx).map_err(|e| PreludeFailure {
                step: Some(step.name().to_string()),
                error: e.into(),
            })?;
            emit_script_written(
                &key_name,
                step.name(),
                &artifact.path.display().to_string(),
                &artifact.digest,
            );
            scripts.insert(step.name().to_string(), artifact);
        }
        Ok((scripts, generated))
    }

    fn record_prelude_failure(
        &self,
        results: &mut DesignResults,
        plan: &PlannedDesign,
        failure: PreludeFailure,
        state: &mut RunState,
    ) {
        let key_name = plan.key.to_string();
        let message = failure.error.to_string();
        let class = failure.error.class();
        self.run_log.error(format!("{key_name}: {message}"));

        let mut blamed = false;
        for planned in &plan.steps {
            let result = match planned.action {
                PlanAction::Run
                    if !blamed
                        && failure
                            .step
                            .as_deref()
                            .map_or(true, |s| s == planned.step) =>
                {
                    blamed = true;
                    let mut result = StepResult::pending(&planned.step);
                    result.seal_broken(message.clone(), class, false);
                    emit_run_aborting(&key_name, &planned.step, &message);
                    result
                }
                PlanAction::Skip => StepResult::skipped(&planned.step, "skipped by policy"),
                _ => StepResult::omitted(&planned.step, "design setup failed"),
            };
            results.steps.push(result);
        }
        if !self.options.continue_on_error {
            state.aborting = true;
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn dispatch(
        &self,
        step: &Arc<dyn Step>,
        action: PlanAction,
        key: &DesignKey,
        design_dir: &Path,
        generated: &[SourceFile],
        env: &BTreeMap<String, String>,
        scripts: &BTreeMap<String, ScriptArtifact>,
        state: &mut RunState,
    ) -> StepResult {
        let name = step.name();
        if self.cancel.is_cancelled() {
            state.cancelled = true;
        }
        if state.halted() {
            return StepResult::omitted(name, state.reason());
        }
        match action {
            PlanAction::Omit => StepResult::omitted(name, "not selected"),
            PlanAction::Skip => {
                emit_step_skipped(&key.to_string(), name, "skip policy");
                StepResult::skipped(name, "skipped by policy")
            }
            PlanAction::Run => {
                let step_dir = design_dir.join(name);
                let ctx = StepContext {
                    config: &self.config,
                    toolchain: self.toolchain.as_ref(),
                    key,
                    step: name,
                    step_dir: &step_dir,
                    generated_psl: generated,
                    env,
                    failure_allowed: self.config.policy().is_failure_allowed(&key.design, name),
                };
                let mut result = StepResult::pending(name);
                result.script = scripts.get(name).cloned();
                self.execute_step(step.as_ref(), &ctx, &mut result).await;
                self.judge(&ctx, &result, state);
                result
            }
        }
    }

    async fn execute_step(&self, step: &dyn Step, ctx: &StepContext<'_>, result: &mut StepResult) {
        let key_name = ctx.key.to_string();
        result.start();
        emit_step_started(&key_name, ctx.step);

        if let Err(e) = self.run_hook(HookPhase::Pre, ctx).await {
            result.seal_broken(e.to_string(), FailureClass::ToolError, ctx.failure_allowed);
        } else {
            match step.run(ctx, self.executor.as_ref()).await {
                Ok(outcome) => result.seal_outcome(outcome, ctx.failure_allowed),
                Err(e) => result.seal_broken(e.to_string(), e.class(), ctx.failure_allowed),
            }
            if let Err(e) = result.write_log(ctx.step_dir) {
                self.run_log.error(format!("{key_name}.{}: {e}", ctx.step));
            }
            if result.failure_class != Some(FailureClass::Interrupted) {
                if let Err(e) = self.run_hook(HookPhase::Post, ctx).await {
                    self.run_log.error(format!("{key_name}: {e}"));
                }
            }
        }

        emit_step_finished(
            &key_name,
            ctx.step,
            result.status.as_str(),
            result.elapsed.as_millis() as u64,
        );
    }

    /// Decide what a sealed step means for the rest of the run.
    fn judge(&self, ctx: &StepContext<'_>, result: &StepResult, state: &mut RunState) {
        if result.failure_class == Some(FailureClass::Interrupted) {
            state.cancelled = true;
            return;
        }
        if !matches!(result.status, StepStatus::Fail | StepStatus::Broken) {
            return;
        }

        let key_name = ctx.key.to_string();
        let reason = result
            .message
            .as_deref()
            .and_then(|m| m.lines().next())
            .unwrap_or("failed");
        if result.allowed {
            self.run_log
                .warn(format!("{key_name}.{} failed (allowed): {reason}", ctx.step));
            return;
        }

        self.run_log
            .error(format!("{key_name}.{} {}: {reason}", ctx.step, result.status));
        emit_run_aborting(&key_name, ctx.step, reason);
        if !self.options.continue_on_error {
            state.aborting = true;
        }
    }

    async fn run_hook(&self, phase: HookPhase, ctx: &StepContext<'_>) -> Result<()> {
        let Some(hook) = self.config.hooks().lookup(phase, ctx.design(), ctx.step) else {
            return Ok(());
        };
        let failed = |message: String| RunnerError::Hook {
            phase: phase.as_str(),
            step: ctx.step.to_string(),
            message,
        };
        std::fs::create_dir_all(ctx.step_dir).map_err(|e| RunnerError::io(ctx.step_dir, e))?;
        tracing::debug!(step = %ctx.step, phase = phase.as_str(), "running hook");

        match hook {
            Hook::Callback(f) => {
                let key_name = ctx.key.to_string();
                let hook_ctx = HookContext {
                    design: ctx.design(),
                    design_key: &key_name,
                    step: ctx.step,
                    step_dir: ctx.step_dir,
                };
                f(&hook_ctx).map_err(|e| failed(format!("{e:#}")))
            }
            Hook::Command(argv) => {
                let Some((program, args)) = argv.split_first() else {
                    return Err(failed("empty hook command".to_string()));
                };
                let invocation = ToolInvocation::new(program, ctx.step_dir)
                    .args(args.iter().cloned())
                    .envs(ctx.env);
                let step = ctx.step;
                let echo = move |_stream: StreamKind, line: &str| {
                    tracing::info!(step = %step, hook = phase.as_str(), "{line}")
                };
                let output = self
                    .executor
                    .execute(&invocation, &echo)
                    .await
                    .map_err(|e| failed(e.to_string()))?;
                if output.exit.success() {
                    Ok(())
                } else {
                    Err(failed(format!(
                        "{} ended with {:?}",
                        invocation.command_line(),
                        output.exit
                    )))
                }
            }
        }
    }

    fn gui_for(&self, key: &DesignKey, step: &str, env: &BTreeMap<String, String>) -> Option<ToolInvocation> {
        let registered = self.toolchain.steps().get(step)?;
        let step_dir: PathBuf = self.options.outdir.join(key.dir_name()).join(step);
        if !step_dir.is_dir() {
            return None;
        }
        let ctx = StepContext {
            config: &self.config,
            toolchain: self.toolchain.as_ref(),
            key,
            step,
            step_dir: &step_dir,
            generated_psl: &[],
            env,
            failure_allowed: false,
        };
        registered.gui_invocation(&ctx)
    }

    fn launch(&self, invocation: &ToolInvocation) -> bool {
        match spawn_detached(invocation) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "failed to open gui");
                false
            }
        }
    }

    fn launch_gui(&self, run: &RunResults, env: &BTreeMap<String, String>) {
        for design in &run.designs {
            for step in design.steps.iter().filter(|s| s.status.was_executed()) {
                if let Some(invocation) = self.gui_for(&design.key, &step.step, env) {
                    self.launch(&invocation);
                }
            }
        }
    }

    /// Open the GUI on results of a previous run. Nothing is archived,
    /// set up or executed. Returns how many viewers were started.
    pub fn view_previous(&self) -> Result<usize> {
        self.validate_filters()?;
        let env = self.child_env(false)?;
        let mut opened = 0;
        for key in self.selected_keys() {
            let _span = DesignSpan::enter(&key.to_string());
            let plan = self.plan_design(&key);
            for planned in plan.steps.iter().filter(|s| s.action == PlanAction::Run) {
                if let Some(invocation) = self.gui_for(&key, &planned.step, &env) {
                    if self.launch(&invocation) {
                        opened += 1;
                    }
                }
            }
        }
        if opened == 0 {
            tracing::warn!(outdir = %self.options.outdir.display(), "no previous results to view");
        }
        Ok(opened)
    }
}
