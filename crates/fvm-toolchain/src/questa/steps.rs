//! The Questa formal steps.
//!
//! One [`QuestaStep`] type serves every step; what differs between them
//! (tool binary, analysis commands, result database, console metric,
//! classification keywords) is looked up from [`StepKind`].

use super::emit;
use super::{QuestaSettings, COVERAGE_TYPES};
use crate::error::Result;
use crate::exec::{ToolExecutor, ToolInvocation};
use crate::patterns::ClassificationTable;
use crate::script::{tcl_quote, ScriptArtifact, ScriptWriter};
use crate::step::{run_tool, Evaluation, Step, StepContext, StepOutcome};
use crate::summary::{KeywordSummaryParser, MetricStyle};
use async_trait::async_trait;
use std::sync::Arc;

const QVERIFY: &str = "qverify";
const VSIM: &str = "vsim";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    Lint,
    Friendliness,
    Rulecheck,
    Xverify,
    Reachability,
    Fault,
    Resets,
    Clocks,
    Prove,
    FormalCover,
    SimCover,
}

impl StepKind {
    /// Top-level steps in execution order.
    pub const ORDER: [StepKind; 9] = [
        StepKind::Lint,
        StepKind::Friendliness,
        StepKind::Rulecheck,
        StepKind::Xverify,
        StepKind::Reachability,
        StepKind::Fault,
        StepKind::Resets,
        StepKind::Clocks,
        StepKind::Prove,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StepKind::Lint => "lint",
            StepKind::Friendliness => "friendliness",
            StepKind::Rulecheck => "rulecheck",
            StepKind::Xverify => "xverify",
            StepKind::Reachability => "reachability",
            StepKind::Fault => "fault",
            StepKind::Resets => "resets",
            StepKind::Clocks => "clocks",
            StepKind::Prove => "prove",
            StepKind::FormalCover => "prove.formalcover",
            StepKind::SimCover => "prove.simcover",
        }
    }

    pub fn post_steps(self) -> &'static [StepKind] {
        match self {
            StepKind::Prove => &[StepKind::FormalCover, StepKind::SimCover],
            _ => &[],
        }
    }

    fn program(self) -> &'static str {
        match self {
            StepKind::SimCover => VSIM,
            _ => QVERIFY,
        }
    }

    /// Result database opened by the GUI, relative to the step directory.
    fn database(self) -> &'static str {
        match self {
            StepKind::Lint => "lint.db",
            StepKind::Friendliness | StepKind::Rulecheck => "autocheck.db",
            StepKind::Xverify => "xcheck.db",
            StepKind::Reachability => "covercheck.db",
            StepKind::Fault => "fault.db",
            StepKind::Resets => "rdc.db",
            StepKind::Clocks => "cdc.db",
            StepKind::Prove | StepKind::FormalCover => "propcheck.db",
            StepKind::SimCover => "coverage.ucdb",
        }
    }

    pub fn metric_style(self) -> MetricStyle {
        match self {
            StepKind::Lint | StepKind::Friendliness => MetricStyle::Diagnostics,
            StepKind::Rulecheck | StepKind::Xverify | StepKind::Resets | StepKind::Clocks => {
                MetricStyle::Checks
            }
            StepKind::Prove => MetricStyle::Proofs,
            StepKind::Reachability
            | StepKind::Fault
            | StepKind::FormalCover
            | StepKind::SimCover => MetricStyle::Coverage,
        }
    }

    fn uses_clocks_and_resets(self) -> bool {
        !matches!(self, StepKind::Lint | StepKind::SimCover)
    }

    fn uses_domains(self) -> bool {
        matches!(self, StepKind::Resets | StepKind::Clocks)
    }

    fn uses_model_edits(self) -> bool {
        matches!(self, StepKind::Prove | StepKind::FormalCover)
    }

    fn uses_timeout(self) -> bool {
        matches!(
            self,
            StepKind::Reachability | StepKind::Fault | StepKind::Prove | StepKind::FormalCover
        )
    }

    fn classification(self) -> ClassificationTable {
        let base = ClassificationTable::new()
            .ignore(&[
                "errors: 0",
                "error (0)",
                "errors (0)",
                " 0 errors",
                "fatal (0)",
                "warnings: 0",
                "warning (0)",
                "warnings (0)",
                " 0 warnings",
            ])
            .error(&["** error", "error:", "fatal"])
            .warning(&["** warning", "warning:"])
            .success(&["completed successfully", "finished successfully"]);

        match self {
            StepKind::Rulecheck | StepKind::Xverify | StepKind::Resets | StepKind::Clocks => base
                .ignore(&["violations (0)", "violations: 0", "cautions (0)", "cautions: 0"])
                .error(&["violation"])
                .warning(&["caution"]),
            StepKind::Prove => base
                .ignore(&["fired (0)", "fired: 0", "inconclusive (0)", "inconclusive: 0"])
                .error(&["fired"])
                .warning(&["inconclusive"]),
            StepKind::Reachability | StepKind::FormalCover => base
                .ignore(&["unreachable (0)", "uncoverable (0)"])
                .warning(&["unreachable", "uncoverable"]),
            _ => base,
        }
    }
}

pub struct QuestaStep {
    kind: StepKind,
    settings: Arc<QuestaSettings>,
    table: ClassificationTable,
}

impl QuestaStep {
    pub fn new(kind: StepKind, settings: Arc<QuestaSettings>) -> Self {
        Self {
            kind,
            settings,
            table: kind.classification(),
        }
    }

    pub fn kind(&self) -> StepKind {
        self.kind
    }

    pub fn script_name(&self) -> String {
        format!("{}.do", self.kind.name())
    }

    /// Flags for this step: the config override, else the default.
    fn flags(&self, ctx: &StepContext<'_>) -> Vec<String> {
        let flags = ctx
            .config
            .tool_flags(self.kind.name())
            .or_else(|| {
                self.settings
                    .default_flags
                    .get(self.kind.name())
                    .map(String::as_str)
            })
            .unwrap_or("");
        flags.split_whitespace().map(str::to_string).collect()
    }

    fn design_args(&self, ctx: &StepContext<'_>) -> String {
        let mut words = vec!["-d".to_string(), tcl_quote(ctx.design())];
        words.extend(ctx.toolchain.generics_to_args(&ctx.config.generics_of(ctx.key)));
        words.join(" ")
    }

    /// `cmd` followed by `-timeout` (when the step takes one) and flags.
    fn verify_line(&self, ctx: &StepContext<'_>, cmd: &str) -> String {
        let mut words = vec![cmd.to_string()];
        if self.kind.uses_timeout() {
            if let Some(timeout) = ctx.timeout() {
                words.push("-timeout".into());
                words.push(ctx.toolchain.encode_timeout(timeout));
            }
        }
        words.extend(self.flags(ctx));
        words.join(" ")
    }

    fn analysis(&self, w: &mut ScriptWriter, ctx: &StepContext<'_>) {
        let design = self.design_args(ctx);
        match self.kind {
            StepKind::Lint => {
                w.line("lint methodology standard -goal start");
                w.line(format!("lint run {design} {}", self.flags(ctx).join(" ")).trim_end());
            }
            StepKind::Friendliness => {
                w.line(format!("autocheck compile {design}"));
                w.line(self.verify_line(ctx, "autocheck report design_friendliness"));
            }
            StepKind::Rulecheck => {
                w.line(format!("autocheck compile {design}"));
                w.line(self.verify_line(ctx, "autocheck verify"));
            }
            StepKind::Xverify => {
                w.line(format!("xcheck compile {design}"));
                w.line(self.verify_line(ctx, "xcheck verify"));
            }
            StepKind::Reachability => {
                w.line(format!("covercheck compile {design}"));
                w.line(self.verify_line(ctx, "covercheck verify"));
                w.line("covercheck report -summary");
            }
            StepKind::Fault => {
                w.line(format!("fault compile {design}"));
                w.line(self.verify_line(ctx, "fault verify"));
                w.line("fault report -summary");
            }
            StepKind::Resets => {
                w.line(self.verify_line(ctx, &format!("rdc run {design}")));
            }
            StepKind::Clocks => {
                w.line(self.verify_line(ctx, &format!("cdc run {design}")));
            }
            StepKind::Prove => {
                w.line(format!("formal compile {design}"));
                w.line(self.verify_line(ctx, "formal verify"));
            }
            StepKind::FormalCover => {
                let enabled: Vec<&str> = COVERAGE_TYPES
                    .iter()
                    .copied()
                    .filter(|cov| {
                        !ctx.config
                            .policy()
                            .is_coverage_disabled(ctx.design(), "prove", cov)
                    })
                    .collect();
                w.line(format!("formal compile {design} -cuname fvm_cover"));
                w.line(self.verify_line(
                    ctx,
                    &format!("formal verify -cov_mode {{{}}}", enabled.join(" ")),
                ));
                w.line("formal generate coverage -summary");
            }
            StepKind::SimCover => {
                let mut words = vec!["vsim".to_string(), "-c".into(), "-coverage".into()];
                words.push(tcl_quote(ctx.design()));
                words.extend(ctx.toolchain.generics_to_args(&ctx.config.generics_of(ctx.key)));
                words.extend(self.flags(ctx));
                w.line(words.join(" "));
                w.line("run -all");
                w.line("coverage save coverage.ucdb");
                w.line("coverage report -summary");
            }
        }
    }

    fn invocation(&self, ctx: &StepContext<'_>) -> ToolInvocation {
        let script = self.script_name();
        let args: Vec<String> = match self.kind {
            StepKind::SimCover => vec!["-c".into(), "-do".into(), script],
            _ => vec!["-c".into(), "-od".into(), ".".into(), "-do".into(), script],
        };
        ToolInvocation::new(self.kind.program(), ctx.step_dir)
            .args(args)
            .envs(ctx.env)
            .timeout(ctx.timeout())
    }
}

#[async_trait]
impl Step for QuestaStep {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn setup(&self, ctx: &StepContext<'_>) -> Result<ScriptArtifact> {
        let design = ctx.design();
        let mut w = ScriptWriter::new("#");
        w.comment(&format!("{} script for {}", self.kind.name(), ctx.key));
        w.blank();

        emit::compile_preamble(&mut w, ctx.config, ctx.generated_psl);

        if self.kind.uses_clocks_and_resets() {
            w.comment("clocks and resets");
            emit::clocks_and_resets(&mut w, ctx.config, design);
        }
        if self.kind.uses_domains() {
            w.comment("port domains");
            emit::domains(&mut w, ctx.config, design);
        }
        if self.kind.uses_model_edits() {
            w.comment("model edits");
            emit::model_edits(&mut w, ctx.config, design);
        }

        w.comment("analysis");
        self.analysis(&mut w, ctx);
        w.finish("exit", &ctx.step_dir.join(self.script_name()))
    }

    async fn run(&self, ctx: &StepContext<'_>, exec: &dyn ToolExecutor) -> Result<StepOutcome> {
        let style = self.kind.metric_style();
        let rules = Evaluation {
            table: &self.table,
            parser: &KeywordSummaryParser,
            style,
            goal: match style {
                MetricStyle::Coverage => ctx.coverage_goal(),
                _ => None,
            },
            timeout: ctx.timeout(),
        };
        run_tool(ctx, exec, self.invocation(ctx), &rules).await
    }

    fn classification(&self) -> &ClassificationTable {
        &self.table
    }

    fn gui_invocation(&self, ctx: &StepContext<'_>) -> Option<ToolInvocation> {
        let db = ctx.step_dir.join(self.kind.database());
        if !db.exists() {
            return None;
        }
        let db = db.to_string_lossy().into_owned();
        let inv = ToolInvocation::new(self.kind.program(), ctx.step_dir).envs(ctx.env);
        Some(match self.kind {
            StepKind::SimCover => inv.arg("-viewcov").arg(db),
            _ => inv.arg(db),
        })
    }
}
