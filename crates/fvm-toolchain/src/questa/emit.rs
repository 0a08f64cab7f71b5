//! Table-driven emitters for Questa directives.
//!
//! Each constraint record maps to one `netlist ...` command. The option
//! tables below list, per record type, which field renders which switch;
//! the emitter walks the table in order so output is stable.

use crate::script::{tcl_quote, ScriptWriter};
use fvm_core::{
    BlackboxTarget, Clock, ClockDomain, Config, Cutpoint, PslFlavor, Reset, ResetDomain,
    SourceFile, SourceKind,
};
use std::path::{Path, PathBuf};

/// A boolean switch, present when the field is set.
struct Switch<T> {
    option: &'static str,
    get: fn(&T) -> bool,
}

/// A switch followed by a value, present when the field is `Some`.
struct Valued<T> {
    option: &'static str,
    get: fn(&T) -> Option<String>,
}

fn render<T>(head: &str, positional: &[String], valued: &[Valued<T>], switches: &[Switch<T>], item: &T) -> String {
    let mut words: Vec<String> = vec![head.to_string()];
    words.extend(positional.iter().map(|p| tcl_quote(p)));
    for v in valued {
        if let Some(value) = (v.get)(item) {
            words.push(v.option.to_string());
            words.push(tcl_quote(&value));
        }
    }
    for s in switches {
        if (s.get)(item) {
            words.push(s.option.to_string());
        }
    }
    words.join(" ")
}

const CLOCK_VALUED: &[Valued<Clock>] = &[
    Valued { option: "-module", get: |c| c.module.clone() },
    Valued { option: "-group", get: |c| c.group.clone() },
    Valued { option: "-period", get: |c| c.period.map(|p| p.to_string()) },
    Valued { option: "-waveform", get: |c| c.waveform.map(|(r, f)| format!("{r} {f}")) },
];

const CLOCK_SWITCHES: &[Switch<Clock>] = &[
    Switch { option: "-external", get: |c| c.external },
    Switch { option: "-ignore", get: |c| c.ignore },
    Switch { option: "-remove", get: |c| c.remove },
];

const RESET_VALUED: &[Valued<Reset>] = &[
    Valued { option: "-module", get: |r| r.module.clone() },
    Valued { option: "-group", get: |r| r.group.clone() },
];

const RESET_SWITCHES: &[Switch<Reset>] = &[
    Switch { option: "-active_high", get: |r| r.active_high },
    Switch { option: "-active_low", get: |r| r.active_low },
    Switch { option: "-sync", get: |r| r.sync },
    Switch { option: "-async", get: |r| r.asynchronous },
    Switch { option: "-external", get: |r| r.external },
    Switch { option: "-ignore", get: |r| r.ignore },
    Switch { option: "-remove", get: |r| r.remove },
];

const CLOCK_DOMAIN_VALUED: &[Valued<ClockDomain>] = &[
    Valued { option: "-clock", get: |d| d.clock_name.clone() },
    Valued { option: "-module", get: |d| d.module.clone() },
];

const CLOCK_DOMAIN_SWITCHES: &[Switch<ClockDomain>] = &[
    Switch { option: "-async", get: |d| d.asynchronous },
    Switch { option: "-sync", get: |d| d.sync },
    Switch { option: "-ignore", get: |d| d.ignore },
    Switch { option: "-posedge", get: |d| d.posedge },
    Switch { option: "-negedge", get: |d| d.negedge },
    Switch { option: "-inout_in", get: |d| d.inout_in },
    Switch { option: "-inout_out", get: |d| d.inout_out },
];

const RESET_DOMAIN_VALUED: &[Valued<ResetDomain>] = &[
    Valued { option: "-reset", get: |d| d.reset_name.clone() },
    Valued { option: "-module", get: |d| d.module.clone() },
];

const RESET_DOMAIN_SWITCHES: &[Switch<ResetDomain>] = &[
    Switch { option: "-async", get: |d| d.asynchronous },
    Switch { option: "-sync", get: |d| d.sync },
    Switch { option: "-active_high", get: |d| d.active_high },
    Switch { option: "-active_low", get: |d| d.active_low },
    Switch { option: "-set", get: |d| d.is_set },
    Switch { option: "-no_reset", get: |d| d.no_reset },
    Switch { option: "-ignore", get: |d| d.ignore },
];

const CUTPOINT_VALUED: &[Valued<Cutpoint>] = &[
    Valued { option: "-module", get: |c| c.module.clone() },
    Valued { option: "-cond", get: |c| c.condition.clone() },
    Valued { option: "-driver", get: |c| c.driver.clone() },
];

const CUTPOINT_SWITCHES: &[Switch<Cutpoint>] = &[
    Switch { option: "-reset_value", get: |c| c.resetval },
    Switch { option: "-local_scope", get: |c| c.local_scope },
];

/// Consecutive sources of one kind and library, compiled with one command.
#[derive(Debug, Clone, PartialEq)]
struct CompileGroup {
    kind: SourceKind,
    library: String,
    files: Vec<PathBuf>,
    psl: Vec<PathBuf>,
}

impl CompileGroup {
    fn is_vhdl(&self) -> bool {
        self.kind == SourceKind::Vhdl
    }

    fn command(&self) -> String {
        let mut words: Vec<String> = match self.kind {
            SourceKind::Vhdl => vec!["vcom".into(), "-2008".into()],
            SourceKind::SystemVerilog => vec!["vlog".into(), "-sv".into()],
            _ => vec!["vlog".into()],
        };
        words.push("-work".into());
        words.push(tcl_quote(&self.library));
        for psl in &self.psl {
            words.push("-pslfile".into());
            words.push(tcl_quote(&script_path(psl)));
        }
        words.extend(self.files.iter().map(|f| tcl_quote(&script_path(f))));
        words.join(" ")
    }
}

/// Absolute path as written into scripts.
pub fn script_path(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

fn compile_groups(config: &Config, generated_psl: &[SourceFile]) -> Vec<CompileGroup> {
    let mut groups: Vec<CompileGroup> = Vec::new();
    for src in config.sources().iter().filter(|s| s.kind.is_hdl()) {
        match groups.last_mut() {
            Some(g) if g.kind == src.kind && g.library == src.library => {
                g.files.push(src.path.clone())
            }
            _ => groups.push(CompileGroup {
                kind: src.kind,
                library: src.library.clone(),
                files: vec![src.path.clone()],
                psl: Vec::new(),
            }),
        }
    }

    let has_vhdl = groups.iter().any(CompileGroup::is_vhdl);
    let psl_sources = config.sources_of(SourceKind::Psl).chain(generated_psl.iter());
    for psl in psl_sources {
        let flavor = psl.psl_flavor.unwrap_or(if has_vhdl {
            PslFlavor::Vhdl
        } else {
            PslFlavor::Verilog
        });
        let target = groups.iter_mut().rev().find(|g| match flavor {
            PslFlavor::Vhdl => g.is_vhdl(),
            PslFlavor::Verilog => !g.is_vhdl(),
        });
        match target {
            Some(g) => g.psl.push(psl.path.clone()),
            None => tracing::warn!(
                path = %psl.path.display(),
                "no compile unit matches the PSL flavour, property file not compiled"
            ),
        }
    }
    groups
}

/// Recreate every library and compile the sources in file-list order.
pub fn compile_preamble(w: &mut ScriptWriter, config: &Config, generated_psl: &[SourceFile]) {
    w.comment("libraries");
    for lib in config.libraries() {
        let lib = tcl_quote(&lib);
        w.line(format!("if {{[file exists {lib}]}} {{vdel -lib {lib} -all}}"));
        w.line(format!("vlib {lib}"));
        w.line(format!("vmap {lib} {lib}"));
    }
    w.comment("compile");
    for group in compile_groups(config, generated_psl) {
        w.line(group.command());
    }
}

/// Clock and reset declarations.
pub fn clocks_and_resets(w: &mut ScriptWriter, config: &Config, design: &str) {
    for clock in config.clocks_for(design) {
        w.line(render(
            "netlist clock",
            &[clock.name.clone()],
            CLOCK_VALUED,
            CLOCK_SWITCHES,
            clock,
        ));
    }
    for reset in config.resets_for(design) {
        w.line(render(
            "netlist reset",
            &[reset.name.clone()],
            RESET_VALUED,
            RESET_SWITCHES,
            reset,
        ));
    }
}

/// Port domain declarations, used by the clock and reset checks.
pub fn domains(w: &mut ScriptWriter, config: &Config, design: &str) {
    for domain in config.clock_domains_for(design) {
        w.line(render(
            "netlist port domain",
            &domain.ports,
            CLOCK_DOMAIN_VALUED,
            CLOCK_DOMAIN_SWITCHES,
            domain,
        ));
    }
    for domain in config.reset_domains_for(design) {
        w.line(render(
            "netlist port resetdomain",
            &domain.ports,
            RESET_DOMAIN_VALUED,
            RESET_DOMAIN_SWITCHES,
            domain,
        ));
    }
}

/// Blackboxes and cutpoints; must precede model compilation.
pub fn model_edits(w: &mut ScriptWriter, config: &Config, design: &str) {
    for bb in config.blackboxes_for(design) {
        match &bb.target {
            BlackboxTarget::Entity(name) => w.line(format!("netlist blackbox {}", tcl_quote(name))),
            BlackboxTarget::Instance(path) => {
                w.line(format!("netlist blackbox instance {}", tcl_quote(path)))
            }
        };
    }
    for cp in config.cutpoints_for(design) {
        w.line(render(
            "netlist cutpoint",
            &[cp.signal.clone()],
            CUTPOINT_VALUED,
            CUTPOINT_SWITCHES,
            cp,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fvm_core::{Blackbox, StepCatalog, StepNames};
    use std::fs;

    fn config(dir: &Path) -> Config {
        let mut config = Config::new(StepCatalog::new(vec![StepNames {
            name: "prove".into(),
            post_steps: vec![],
        }]));
        for name in ["pkg.vhd", "counter.vhd", "helper.sv", "counter.psl"] {
            fs::write(dir.join(name), "\n").unwrap();
        }
        config.add_vhdl_source(dir.join("pkg.vhd"), "work").unwrap();
        config.add_vhdl_source(dir.join("counter.vhd"), "work").unwrap();
        config.add_systemverilog_source(dir.join("helper.sv"), "ip").unwrap();
        config.add_psl_source(dir.join("counter.psl"), None).unwrap();
        config.set_toplevel("counter").unwrap();
        config
    }

    #[test]
    fn test_consecutive_sources_share_a_command() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let groups = compile_groups(&cfg, &[]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].files.len(), 2);
        assert_eq!(groups[0].psl.len(), 1, "unflavoured PSL goes to VHDL");
        assert!(groups[1].command().starts_with("vlog -sv -work ip "));
    }

    #[test]
    fn test_preamble_recreates_libraries() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let mut w = ScriptWriter::new("#");
        compile_preamble(&mut w, &cfg, &[]);
        let body = w.body();
        assert!(body.contains("vlib work\nvmap work work\n"));
        assert!(body.contains("vlib ip\n"));
        let vcom = body.find("vcom -2008 -work work -pslfile").unwrap();
        let vlog = body.find("vlog -sv").unwrap();
        assert!(vcom < vlog);
    }

    #[test]
    fn test_clock_and_reset_rendering() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        let mut clk = Clock::new("clk");
        clk.period = Some(10.0);
        clk.waveform = Some((0.0, 5.0));
        cfg.add_clock(clk).unwrap();
        let mut rst = Reset::new("rst_n");
        rst.active_low = true;
        rst.asynchronous = true;
        cfg.add_reset(rst).unwrap();

        let mut w = ScriptWriter::new("#");
        clocks_and_resets(&mut w, &cfg, "counter");
        assert_eq!(
            w.body(),
            "netlist clock clk -period 10 -waveform {0 5}\nnetlist reset rst_n -active_low -async\n"
        );
    }

    #[test]
    fn test_design_selector_filters_directives() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        let mut bb = Blackbox::entity("fifo");
        bb.design = Some("other".into());
        cfg.blackbox(bb).unwrap();
        cfg.cutpoint(Cutpoint::new("count")).unwrap();

        let mut w = ScriptWriter::new("#");
        model_edits(&mut w, &cfg, "counter");
        assert_eq!(w.body(), "netlist cutpoint count\n");
    }
}
