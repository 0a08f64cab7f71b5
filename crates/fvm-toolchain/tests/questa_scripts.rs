//! Script generation and run behaviour of the built-in toolchain.

use async_trait::async_trait;
use chrono::Utc;
use fvm_core::{Blackbox, Clock, Config, Cutpoint, DesignKey, GenericValue, Generics, Reset};
use fvm_toolchain::{
    ExitKind, LineCallback, QuestaToolchain, Step, StepContext, StepRegistry, StreamKind,
    ToolExecutor, ToolInvocation, ToolOutput, Toolchain, Verdict,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

fn counter_config(dir: &Path, catalog: fvm_core::StepCatalog) -> Config {
    std::fs::write(dir.join("counter.vhd"), "entity counter is end;\n").unwrap();
    std::fs::write(dir.join("counter.psl"), "vunit v (counter) {}\n").unwrap();

    let mut config = Config::new(catalog);
    config.add_vhdl_source(dir.join("counter.vhd"), "work").unwrap();
    config.add_psl_source(dir.join("counter.psl"), None).unwrap();
    config.set_toplevel("counter").unwrap();

    let mut generics = Generics::new();
    generics.insert("MAX_COUNT".into(), GenericValue::Integer(128));
    config.add_config("counter", "max_128", generics).unwrap();

    let mut clk = Clock::new("clk");
    clk.period = Some(10.0);
    config.add_clock(clk).unwrap();
    let mut rst = Reset::new("rst");
    rst.active_high = true;
    config.add_reset(rst).unwrap();
    config.blackbox(Blackbox::entity("fifo")).unwrap();
    config.cutpoint(Cutpoint::new("overflow")).unwrap();
    config.set_timeout("prove", "10m").unwrap();
    config
}

fn all_steps(registry: &StepRegistry) -> Vec<&std::sync::Arc<dyn Step>> {
    registry
        .entries()
        .iter()
        .flat_map(|e| std::iter::once(&e.step).chain(e.post_steps.iter()))
        .collect()
}

fn setup_all(tc: &dyn Toolchain, config: &Config, outdir: &Path) -> BTreeMap<String, String> {
    let key = DesignKey::new("counter", Some("max_128"));
    let env = BTreeMap::new();
    let mut digests = BTreeMap::new();
    for step in all_steps(tc.steps()) {
        let step_dir = outdir.join(key.dir_name()).join(step.name());
        let ctx = StepContext {
            config,
            toolchain: tc,
            key: &key,
            step: step.name(),
            step_dir: &step_dir,
            generated_psl: &[],
            env: &env,
            failure_allowed: false,
        };
        let artifact = step.setup(&ctx).unwrap();
        digests.insert(step.name().to_string(), artifact.digest);
    }
    digests
}

#[test]
fn test_setup_is_byte_identical_across_runs() {
    let src = tempfile::tempdir().unwrap();
    let tc = QuestaToolchain::new();
    let config = counter_config(src.path(), tc.catalog());

    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let a = setup_all(&tc, &config, first.path());
    let b = setup_all(&tc, &config, second.path());

    assert_eq!(a.len(), 11);
    assert_eq!(a, b);
}

#[test]
fn test_prove_script_orders_directives_before_compile() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let tc = QuestaToolchain::new();
    let config = counter_config(src.path(), tc.catalog());
    setup_all(&tc, &config, out.path());

    let script =
        std::fs::read_to_string(out.path().join("counter.max_128/prove/prove.do")).unwrap();
    let pos = |needle: &str| {
        script
            .find(needle)
            .unwrap_or_else(|| panic!("{needle} missing from:\n{script}"))
    };

    assert!(pos("vlib work") < pos("vcom -2008"));
    assert!(pos("netlist clock clk -period 10") < pos("formal verify"));
    assert!(pos("netlist blackbox fifo") < pos("formal compile"));
    assert!(pos("netlist cutpoint overflow") < pos("formal compile"));
    assert!(script.contains("formal compile -d counter -GMAX_COUNT=128"));
    assert!(script.contains("formal verify -timeout 10m -jobs 4"));
    assert!(script.ends_with("exit\n"));
}

/// The built-in steps with generics and timeouts rendered another way.
struct RenamedArgs(QuestaToolchain);

impl Toolchain for RenamedArgs {
    fn name(&self) -> &str {
        "questa-renamed"
    }

    fn steps(&self) -> &StepRegistry {
        self.0.steps()
    }

    fn default_flags(&self) -> &BTreeMap<String, String> {
        self.0.default_flags()
    }

    fn generics_to_args(&self, generics: &Generics) -> Vec<String> {
        generics.iter().map(|(name, value)| format!("-g{name}={value}")).collect()
    }

    fn encode_timeout(&self, timeout: Duration) -> String {
        format!("{}s", timeout.as_secs())
    }
}

#[test]
fn test_scripts_render_generics_and_timeouts_through_the_toolchain() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let tc = RenamedArgs(QuestaToolchain::new());
    let config = counter_config(src.path(), tc.catalog());
    setup_all(&tc, &config, out.path());

    let prove =
        std::fs::read_to_string(out.path().join("counter.max_128/prove/prove.do")).unwrap();
    assert!(prove.contains("formal compile -d counter -gMAX_COUNT=128"));
    assert!(prove.contains("formal verify -timeout 600s -jobs 4"));
    assert!(!prove.contains("-GMAX_COUNT"));

    let simcover = std::fs::read_to_string(
        out.path()
            .join("counter.max_128/prove.simcover/prove.simcover.do"),
    )
    .unwrap();
    assert!(simcover.contains("-gMAX_COUNT=128"));
}

#[test]
fn test_lint_script_has_no_formal_directives() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let tc = QuestaToolchain::new();
    let config = counter_config(src.path(), tc.catalog());
    setup_all(&tc, &config, out.path());

    let script = std::fs::read_to_string(out.path().join("counter.max_128/lint/lint.do")).unwrap();
    assert!(!script.contains("netlist"));
    assert!(script.contains("lint run -d counter -GMAX_COUNT=128"));
}

#[test]
fn test_disabled_coverage_types_are_left_out() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let tc = QuestaToolchain::new();
    let mut config = counter_config(src.path(), tc.catalog());
    config.disable_coverage("counter.prove.toggle").unwrap();
    config.set_tool_flags("prove.formalcover", "-jobs 8").unwrap();
    setup_all(&tc, &config, out.path());

    let script = std::fs::read_to_string(
        out.path()
            .join("counter.max_128/prove.formalcover/prove.formalcover.do"),
    )
    .unwrap();
    assert!(script.contains("-cov_mode {statement branch condition expression fsm} "));
    assert!(script.contains("-jobs 8"));
    assert!(!script.contains("toggle"));
}

/// Records invocations and replays canned output.
struct ScriptedExecutor {
    stdout: Vec<String>,
    exit: ExitKind,
    seen: Mutex<Vec<ToolInvocation>>,
}

impl ScriptedExecutor {
    fn new(stdout: &[&str], exit: ExitKind) -> Self {
        Self {
            stdout: stdout.iter().map(|s| s.to_string()).collect(),
            exit,
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ToolExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        invocation: &ToolInvocation,
        on_line: LineCallback<'_>,
    ) -> fvm_toolchain::Result<ToolOutput> {
        self.seen.lock().unwrap().push(invocation.clone());
        for line in &self.stdout {
            on_line(StreamKind::Stdout, line.as_str());
        }
        Ok(ToolOutput {
            stdout: self.stdout.clone(),
            stderr: Vec::new(),
            exit: self.exit,
            started_at: Utc::now(),
            elapsed: Duration::from_millis(3),
        })
    }
}

#[tokio::test]
async fn test_prove_run_invokes_qverify_in_step_dir() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let tc = QuestaToolchain::new();
    let config = counter_config(src.path(), tc.catalog());

    let key = DesignKey::new("counter", Some("max_128"));
    let step_dir = out.path().join("counter.max_128/prove");
    let mut env = BTreeMap::new();
    env.insert("FLEXLM_DIAGNOSTICS_PATH".to_string(), "/x/.flexlm.log".to_string());
    let ctx = StepContext {
        config: &config,
        toolchain: &tc,
        key: &key,
        step: "prove",
        step_dir: &step_dir,
        generated_psl: &[],
        env: &env,
        failure_allowed: false,
    };

    let exec = ScriptedExecutor::new(&["Proven (3)", "Fired (0)", "Inconclusive (0)"], ExitKind::Code(0));
    let step = tc.steps().get("prove").unwrap();
    step.setup(&ctx).unwrap();
    let outcome = step.run(&ctx, &exec).await.unwrap();

    assert_eq!(outcome.verdict, Verdict::Passed);
    assert_eq!(outcome.metric, "3P 0F 0I");
    let seen = exec.seen.lock().unwrap();
    assert_eq!(seen[0].program, "qverify");
    assert_eq!(seen[0].args, vec!["-c", "-od", ".", "-do", "prove.do"]);
    assert_eq!(seen[0].cwd, step_dir);
    assert_eq!(seen[0].timeout, Some(Duration::from_secs(600)));
    assert_eq!(seen[0].env["FLEXLM_DIAGNOSTICS_PATH"], "/x/.flexlm.log");
}

#[tokio::test]
async fn test_reachability_below_goal_fails() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let tc = QuestaToolchain::new();
    let mut config = counter_config(src.path(), tc.catalog());
    config.set_coverage_goal("reachability", 75.0).unwrap();

    let key = DesignKey::new("counter", Some("max_128"));
    let step_dir = out.path().join("counter.max_128/reachability");
    let env = BTreeMap::new();
    let ctx = StepContext {
        config: &config,
        toolchain: &tc,
        key: &key,
        step: "reachability",
        step_dir: &step_dir,
        generated_psl: &[],
        env: &env,
        failure_allowed: false,
    };

    let exec = ScriptedExecutor::new(&["Reachability Coverage: 60.0%"], ExitKind::Code(0));
    let outcome = tc
        .steps()
        .get("reachability")
        .unwrap()
        .run(&ctx, &exec)
        .await
        .unwrap();

    match outcome.verdict {
        Verdict::Failed(reason) => {
            assert_eq!(reason.class().exit_code(), 5);
        }
        other => panic!("expected goal failure, got {other:?}"),
    }
    assert_eq!(outcome.metric, "60.0%");
}
