//! Verification programs.
//!
//! A program is an ordered list of config calls, read from TOML
//! (`[[call]]` tables) or JSON (`{"call": [...]}`). Each call carries its
//! operation in the `op` field. Relative paths and glob patterns resolve
//! against the directory holding the program file.

use anyhow::{Context, Result};
use fvm_core::{
    Blackbox, BlackboxTarget, Clock, ClockDomain, Config, Cutpoint, FvmError, Generics, Hook,
    PslFlavor, Reset, ResetDomain, SourceKind, DEFAULT_LIBRARY,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};

fn default_library() -> String {
    DEFAULT_LIBRARY.to_string()
}

fn all_designs() -> String {
    "*".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Program {
    #[serde(default, rename = "call")]
    pub calls: Vec<ProgramCall>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
pub enum ProgramCall {
    AddVhdlSource {
        path: PathBuf,
        #[serde(default = "default_library")]
        library: String,
    },
    AddVhdlSources {
        pattern: String,
        #[serde(default = "default_library")]
        library: String,
    },
    AddVerilogSource {
        path: PathBuf,
        #[serde(default = "default_library")]
        library: String,
    },
    AddVerilogSources {
        pattern: String,
        #[serde(default = "default_library")]
        library: String,
    },
    AddSystemverilogSource {
        path: PathBuf,
        #[serde(default = "default_library")]
        library: String,
    },
    AddSystemverilogSources {
        pattern: String,
        #[serde(default = "default_library")]
        library: String,
    },
    AddPslSource {
        path: PathBuf,
        flavor: Option<PslFlavor>,
    },
    AddPslSources {
        pattern: String,
        flavor: Option<PslFlavor>,
    },
    AddDromSource {
        path: PathBuf,
    },
    AddDromSources {
        pattern: String,
    },
    SetToplevel {
        name: String,
    },
    SetToplevels {
        names: Vec<String>,
    },
    AddConfig {
        design: String,
        name: String,
        #[serde(default)]
        generics: Generics,
    },
    AddClock(Clock),
    AddReset(Reset),
    AddClockDomain(ClockDomain),
    AddResetDomain(ResetDomain),
    Blackbox {
        design: Option<String>,
        entity: Option<String>,
        instance: Option<String>,
    },
    Cutpoint(Cutpoint),
    SetPrefix {
        prefix: String,
    },
    SetCoverageGoal {
        step: String,
        goal: f64,
    },
    SetTimeout {
        step: String,
        timeout: String,
    },
    SetToolFlags {
        step: String,
        flags: String,
    },
    Skip {
        step: String,
        #[serde(default = "all_designs")]
        design: String,
    },
    AllowFailure {
        step: String,
        #[serde(default = "all_designs")]
        design: String,
    },
    DisableCoverage {
        pattern: String,
    },
    SetPreHook {
        step: String,
        #[serde(default = "all_designs")]
        design: String,
        command: Vec<String>,
    },
    SetPostHook {
        step: String,
        #[serde(default = "all_designs")]
        design: String,
        command: Vec<String>,
    },
}

impl Program {
    /// Read a program; `.json` files are JSON, anything else TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read program {}", path.display()))?;
        let program = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&text)
                .with_context(|| format!("failed to parse program {}", path.display()))?,
            _ => toml::from_str(&text)
                .with_context(|| format!("failed to parse program {}", path.display()))?,
        };
        Ok(program)
    }

    /// Apply every call in order. The first rejected call stops the program.
    pub fn apply(&self, config: &mut Config, base: &Path) -> Result<()> {
        for (i, call) in self.calls.iter().enumerate() {
            call.apply(config, base)
                .with_context(|| format!("call #{} ({})", i + 1, call.op()))?;
        }
        tracing::debug!(calls = self.calls.len(), "program applied");
        Ok(())
    }
}

impl ProgramCall {
    pub fn op(&self) -> &'static str {
        match self {
            ProgramCall::AddVhdlSource { .. } => "add_vhdl_source",
            ProgramCall::AddVhdlSources { .. } => "add_vhdl_sources",
            ProgramCall::AddVerilogSource { .. } => "add_verilog_source",
            ProgramCall::AddVerilogSources { .. } => "add_verilog_sources",
            ProgramCall::AddSystemverilogSource { .. } => "add_systemverilog_source",
            ProgramCall::AddSystemverilogSources { .. } => "add_systemverilog_sources",
            ProgramCall::AddPslSource { .. } => "add_psl_source",
            ProgramCall::AddPslSources { .. } => "add_psl_sources",
            ProgramCall::AddDromSource { .. } => "add_drom_source",
            ProgramCall::AddDromSources { .. } => "add_drom_sources",
            ProgramCall::SetToplevel { .. } => "set_toplevel",
            ProgramCall::SetToplevels { .. } => "set_toplevels",
            ProgramCall::AddConfig { .. } => "add_config",
            ProgramCall::AddClock(_) => "add_clock",
            ProgramCall::AddReset(_) => "add_reset",
            ProgramCall::AddClockDomain(_) => "add_clock_domain",
            ProgramCall::AddResetDomain(_) => "add_reset_domain",
            ProgramCall::Blackbox { .. } => "blackbox",
            ProgramCall::Cutpoint(_) => "cutpoint",
            ProgramCall::SetPrefix { .. } => "set_prefix",
            ProgramCall::SetCoverageGoal { .. } => "set_coverage_goal",
            ProgramCall::SetTimeout { .. } => "set_timeout",
            ProgramCall::SetToolFlags { .. } => "set_tool_flags",
            ProgramCall::Skip { .. } => "skip",
            ProgramCall::AllowFailure { .. } => "allow_failure",
            ProgramCall::DisableCoverage { .. } => "disable_coverage",
            ProgramCall::SetPreHook { .. } => "set_pre_hook",
            ProgramCall::SetPostHook { .. } => "set_post_hook",
        }
    }

    fn apply(&self, config: &mut Config, base: &Path) -> fvm_core::Result<()> {
        match self {
            ProgramCall::AddVhdlSource { path, library } => {
                config.add_source(SourceKind::Vhdl, resolve_path(base, path), library)
            }
            ProgramCall::AddVhdlSources { pattern, library } => config
                .add_sources(SourceKind::Vhdl, &resolve_pattern(base, pattern), library)
                .map(drop),
            ProgramCall::AddVerilogSource { path, library } => {
                config.add_source(SourceKind::Verilog, resolve_path(base, path), library)
            }
            ProgramCall::AddVerilogSources { pattern, library } => config
                .add_sources(SourceKind::Verilog, &resolve_pattern(base, pattern), library)
                .map(drop),
            ProgramCall::AddSystemverilogSource { path, library } => {
                config.add_source(SourceKind::SystemVerilog, resolve_path(base, path), library)
            }
            ProgramCall::AddSystemverilogSources { pattern, library } => config
                .add_sources(SourceKind::SystemVerilog, &resolve_pattern(base, pattern), library)
                .map(drop),
            ProgramCall::AddPslSource { path, flavor } => {
                config.add_psl_source(resolve_path(base, path), *flavor)
            }
            ProgramCall::AddPslSources { pattern, flavor } => config
                .add_psl_sources(&resolve_pattern(base, pattern), *flavor)
                .map(drop),
            ProgramCall::AddDromSource { path } => config.add_drom_source(resolve_path(base, path)),
            ProgramCall::AddDromSources { pattern } => config
                .add_drom_sources(&resolve_pattern(base, pattern))
                .map(drop),
            ProgramCall::SetToplevel { name } => config.set_toplevel(name),
            ProgramCall::SetToplevels { names } => config.set_toplevels(names),
            ProgramCall::AddConfig {
                design,
                name,
                generics,
            } => config.add_config(design, name, generics.clone()),
            ProgramCall::AddClock(clock) => config.add_clock(clock.clone()),
            ProgramCall::AddReset(reset) => config.add_reset(reset.clone()),
            ProgramCall::AddClockDomain(domain) => config.add_clock_domain(domain.clone()),
            ProgramCall::AddResetDomain(domain) => config.add_reset_domain(domain.clone()),
            ProgramCall::Blackbox {
                design,
                entity,
                instance,
            } => {
                let target = match (entity, instance) {
                    (Some(entity), None) => BlackboxTarget::Entity(entity.clone()),
                    (None, Some(instance)) => BlackboxTarget::Instance(instance.clone()),
                    _ => {
                        return Err(FvmError::BadValue(
                            "blackbox needs exactly one of entity or instance".to_string(),
                        ))
                    }
                };
                config.blackbox(Blackbox {
                    design: design.clone(),
                    target,
                })
            }
            ProgramCall::Cutpoint(cutpoint) => config.cutpoint(cutpoint.clone()),
            ProgramCall::SetPrefix { prefix } => config.set_prefix(prefix),
            ProgramCall::SetCoverageGoal { step, goal } => config.set_coverage_goal(step, *goal),
            ProgramCall::SetTimeout { step, timeout } => config.set_timeout(step, timeout),
            ProgramCall::SetToolFlags { step, flags } => config.set_tool_flags(step, flags),
            ProgramCall::Skip { step, design } => config.skip(step, design),
            ProgramCall::AllowFailure { step, design } => config.allow_failure(step, design),
            ProgramCall::DisableCoverage { pattern } => config.disable_coverage(pattern),
            ProgramCall::SetPreHook {
                step,
                design,
                command,
            } => config.set_pre_hook(step, design, command_hook(command)?),
            ProgramCall::SetPostHook {
                step,
                design,
                command,
            } => config.set_post_hook(step, design, command_hook(command)?),
        }
    }
}

fn command_hook(command: &[String]) -> fvm_core::Result<Hook> {
    if command.first().map_or(true, |program| program.trim().is_empty()) {
        return Err(FvmError::BadValue("hook command must not be empty".to_string()));
    }
    Ok(Hook::Command(command.to_vec()))
}

fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn resolve_pattern(base: &Path, pattern: &str) -> String {
    if Path::new(pattern).is_absolute() || base.as_os_str().is_empty() {
        return pattern.to_string();
    }
    let base = glob::Pattern::escape(&base.to_string_lossy());
    format!("{}/{}", base.trim_end_matches('/'), pattern)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fvm_core::{GenericValue, HookPhase};
    use fvm_toolchain::toolchain_by_name;

    fn config() -> Config {
        Config::new(toolchain_by_name("questa").unwrap().catalog())
    }

    fn sources(dir: &Path) {
        std::fs::write(dir.join("counter.vhd"), "entity counter is end;\n").unwrap();
        std::fs::write(dir.join("dualcounter.vhd"), "entity dualcounter is end;\n").unwrap();
        std::fs::write(dir.join("counter.psl"), "vunit v (counter) {}\n").unwrap();
    }

    const COUNTER: &str = r#"
[[call]]
op = "add_vhdl_sources"
pattern = "*.vhd"

[[call]]
op = "add_psl_source"
path = "counter.psl"
flavor = "vhdl"

[[call]]
op = "set_toplevels"
names = ["counter", "dualcounter"]

[[call]]
op = "add_config"
design = "counter"
name = "wide"
generics = { WIDTH = 16, SATURATE = true }

[[call]]
op = "add_clock"
name = "clk"
period = 10.0

[[call]]
op = "add_reset"
design = "dualcounter"
name = "rst"
async = true
active_high = true

[[call]]
op = "blackbox"
entity = "fifo"

[[call]]
op = "set_coverage_goal"
step = "prove.formalcover"
goal = 90

[[call]]
op = "set_timeout"
step = "prove"
timeout = "2h"

[[call]]
op = "skip"
step = "xverify"

[[call]]
op = "allow_failure"
step = "lint"
design = "dualcounter"

[[call]]
op = "set_post_hook"
step = "prove"
design = "counter"
command = ["touch", "proven"]
"#;

    #[test]
    fn test_toml_program_builds_config() {
        let dir = tempfile::tempdir().unwrap();
        sources(dir.path());
        let program: Program = toml::from_str(COUNTER).unwrap();
        assert_eq!(program.calls.len(), 12);

        let mut config = config();
        program.apply(&mut config, dir.path()).unwrap();

        assert_eq!(config.sources().len(), 3);
        assert_eq!(config.libraries(), vec!["work".to_string()]);
        assert_eq!(config.toplevels(), ["counter", "dualcounter"]);

        let wide: Vec<_> = config.configs_of("counter").collect();
        assert_eq!(wide.len(), 1);
        assert_eq!(wide[0].generics.get("WIDTH"), Some(&GenericValue::Integer(16)));
        assert_eq!(wide[0].generics.get("SATURATE"), Some(&GenericValue::Boolean(true)));

        assert_eq!(config.clocks_for("counter").count(), 1);
        assert_eq!(config.resets_for("counter").count(), 0);
        assert!(config.resets_for("dualcounter").all(|r| r.asynchronous));
        assert_eq!(config.blackboxes_for("dualcounter").count(), 1);
        assert_eq!(config.coverage_goal("prove.formalcover"), Some(90.0));
        assert_eq!(config.timeout("prove").map(|d| d.as_secs()), Some(7200));
        assert!(config.policy().is_skipped("counter", "xverify"));
        assert!(config.policy().is_failure_allowed("dualcounter", "lint"));
        assert!(!config.policy().is_failure_allowed("counter", "lint"));
        assert!(config.hooks().lookup(HookPhase::Post, "counter", "prove").is_some());
        assert!(config.hooks().lookup(HookPhase::Post, "dualcounter", "prove").is_none());
    }

    #[test]
    fn test_json_program_loads_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        sources(dir.path());
        let path = dir.path().join("counter.json");
        std::fs::write(
            &path,
            r#"{"call": [
                {"op": "add_vhdl_source", "path": "counter.vhd", "library": "lib_a"},
                {"op": "set_toplevel", "name": "counter"},
                {"op": "cutpoint", "signal": "cnt", "resetval": true}
            ]}"#,
        )
        .unwrap();

        let program = Program::load(&path).unwrap();
        let mut config = config();
        program.apply(&mut config, dir.path()).unwrap();

        assert_eq!(config.libraries(), vec!["lib_a".to_string()]);
        assert_eq!(config.cutpoints_for("counter").count(), 1);
    }

    #[test]
    fn test_empty_glob_names_the_call() {
        let dir = tempfile::tempdir().unwrap();
        let program: Program = toml::from_str(
            r#"
[[call]]
op = "add_verilog_sources"
pattern = "rtl/*.v"
"#,
        )
        .unwrap();

        let err = program.apply(&mut config(), dir.path()).unwrap_err();
        assert!(err.to_string().contains("call #1 (add_verilog_sources)"));
        let cause = err.downcast_ref::<FvmError>().unwrap();
        assert!(matches!(cause, FvmError::NoFilesFound { .. }));
        assert_eq!(cause.exit_code(), 3);
    }

    #[test]
    fn test_unknown_op_is_a_parse_error() {
        let parsed: std::result::Result<Program, _> = toml::from_str(
            r#"
[[call]]
op = "launch_rockets"
"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_unknown_clock_field_is_rejected() {
        let parsed: std::result::Result<Program, _> = serde_json::from_str(
            r#"{"call": [{"op": "add_clock", "name": "clk", "frequency": 100}]}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_blackbox_needs_one_target() {
        let program: Program = serde_json::from_str(
            r#"{"call": [
                {"op": "set_toplevel", "name": "counter"},
                {"op": "blackbox", "entity": "fifo", "instance": "u_fifo"}
            ]}"#,
        )
        .unwrap();
        let err = program.apply(&mut config(), Path::new("")).unwrap_err();
        assert!(err.to_string().contains("call #2 (blackbox)"));
    }

    #[test]
    fn test_empty_hook_command_is_rejected() {
        let program: Program = serde_json::from_str(
            r#"{"call": [{"op": "set_pre_hook", "step": "lint", "command": []}]}"#,
        )
        .unwrap();
        assert!(program.apply(&mut config(), Path::new("")).is_err());
    }

    #[test]
    fn test_hook_on_unknown_step_is_rejected() {
        let program: Program = serde_json::from_str(
            r#"{"call": [{"op": "set_post_hook", "step": "synth", "command": ["true"]}]}"#,
        )
        .unwrap();
        let err = program.apply(&mut config(), Path::new("")).unwrap_err();
        let cause = err.downcast_ref::<FvmError>().unwrap();
        assert!(matches!(cause, FvmError::UnknownStep(_)));
    }

    #[test]
    fn test_patterns_resolve_against_program_dir() {
        assert_eq!(resolve_pattern(Path::new("demos/counter"), "*.vhd"), "demos/counter/*.vhd");
        assert_eq!(resolve_pattern(Path::new("rtl[1]"), "*.v"), "rtl[[]1[]]/*.v");
        assert_eq!(resolve_pattern(Path::new(""), "*.vhd"), "*.vhd");
        assert_eq!(resolve_pattern(Path::new("demos"), "/abs/*.vhd"), "/abs/*.vhd");
        assert_eq!(
            resolve_path(Path::new("demos"), Path::new("a.vhd")),
            PathBuf::from("demos/a.vhd")
        );
    }
}
