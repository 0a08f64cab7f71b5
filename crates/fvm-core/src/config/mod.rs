//! The config model: everything a verification program registers.
//!
//! `Config` is a builder. Every registration validates eagerly and fails
//! with a bad-value error at the offending call. Once handed to the driver
//! it is shared immutably.

pub mod constraints;
pub mod design;
pub mod source;

pub use constraints::{
    Blackbox, BlackboxTarget, Clock, ClockDomain, Cutpoint, DesignScoped, Reset, ResetDomain,
};
pub use design::{
    DesignConfig, DesignKey, GenericValue, Generics, DEFAULT_CONFIG, RESERVED_NAMES,
};
pub use source::{PslFlavor, SourceFile, SourceKind, DEFAULT_LIBRARY};

use crate::catalog::StepCatalog;
use crate::error::{FvmError, Result};
use crate::hooks::{Hook, HookPhase, HookTable};
use crate::policy::Policy;
use crate::timeout::parse_timeout;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_PREFIX: &str = "fvm";

#[derive(Debug, Clone)]
pub struct Config {
    catalog: StepCatalog,
    prefix: String,
    sources: Vec<SourceFile>,
    toplevels: Vec<String>,
    design_configs: Vec<DesignConfig>,
    clocks: Vec<Clock>,
    resets: Vec<Reset>,
    clock_domains: Vec<ClockDomain>,
    reset_domains: Vec<ResetDomain>,
    blackboxes: Vec<Blackbox>,
    cutpoints: Vec<Cutpoint>,
    coverage_goals: BTreeMap<String, f64>,
    timeouts: BTreeMap<String, Duration>,
    tool_flags: BTreeMap<String, String>,
    policy: Policy,
    hooks: HookTable,
}

impl Config {
    /// Empty config validating step references against `catalog`.
    pub fn new(catalog: StepCatalog) -> Self {
        Self {
            catalog,
            prefix: DEFAULT_PREFIX.to_string(),
            sources: Vec::new(),
            toplevels: Vec::new(),
            design_configs: Vec::new(),
            clocks: Vec::new(),
            resets: Vec::new(),
            clock_domains: Vec::new(),
            reset_domains: Vec::new(),
            blackboxes: Vec::new(),
            cutpoints: Vec::new(),
            coverage_goals: BTreeMap::new(),
            timeouts: BTreeMap::new(),
            tool_flags: BTreeMap::new(),
            policy: Policy::default(),
            hooks: HookTable::default(),
        }
    }

    // ------------------------------------------------------------------
    // Sources
    // ------------------------------------------------------------------

    /// Register one source file. The file must exist.
    pub fn add_source(&mut self, kind: SourceKind, path: impl AsRef<Path>, library: &str) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FvmError::FileNotFound(path.to_path_buf()));
        }
        if library.trim().is_empty() {
            return Err(FvmError::BadValue("library name must not be empty".to_string()));
        }
        if !kind.has_expected_extension(path) {
            warn!(
                path = %path.display(),
                kind = kind.label(),
                "unusual extension for {} source",
                kind.label()
            );
        }
        debug!(path = %path.display(), library = %library, "adding {} source", kind.label());
        self.sources
            .push(SourceFile::new(path.to_path_buf(), kind).with_library(library));
        Ok(())
    }

    /// Register every file matching `pattern`, in sorted order.
    ///
    /// A pattern matching nothing is a hard error.
    pub fn add_sources(&mut self, kind: SourceKind, pattern: &str, library: &str) -> Result<usize> {
        let paths = resolve_glob(pattern)?;
        for path in &paths {
            self.add_source(kind, path, library)?;
        }
        Ok(paths.len())
    }

    pub fn add_vhdl_source(&mut self, path: impl AsRef<Path>, library: &str) -> Result<()> {
        self.add_source(SourceKind::Vhdl, path, library)
    }

    pub fn add_vhdl_sources(&mut self, pattern: &str, library: &str) -> Result<usize> {
        self.add_sources(SourceKind::Vhdl, pattern, library)
    }

    pub fn add_verilog_source(&mut self, path: impl AsRef<Path>, library: &str) -> Result<()> {
        self.add_source(SourceKind::Verilog, path, library)
    }

    pub fn add_verilog_sources(&mut self, pattern: &str, library: &str) -> Result<usize> {
        self.add_sources(SourceKind::Verilog, pattern, library)
    }

    pub fn add_systemverilog_source(&mut self, path: impl AsRef<Path>, library: &str) -> Result<()> {
        self.add_source(SourceKind::SystemVerilog, path, library)
    }

    pub fn add_systemverilog_sources(&mut self, pattern: &str, library: &str) -> Result<usize> {
        self.add_sources(SourceKind::SystemVerilog, pattern, library)
    }

    /// Register a PSL property file, optionally pinning its flavour.
    pub fn add_psl_source(&mut self, path: impl AsRef<Path>, flavor: Option<PslFlavor>) -> Result<()> {
        self.add_source(SourceKind::Psl, path, DEFAULT_LIBRARY)?;
        if let (Some(flavor), Some(last)) = (flavor, self.sources.last_mut()) {
            last.psl_flavor = Some(flavor);
        }
        Ok(())
    }

    pub fn add_psl_sources(&mut self, pattern: &str, flavor: Option<PslFlavor>) -> Result<usize> {
        let paths = resolve_glob(pattern)?;
        for path in &paths {
            self.add_psl_source(path, flavor)?;
        }
        Ok(paths.len())
    }

    pub fn add_drom_source(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.add_source(SourceKind::WaveJson, path, DEFAULT_LIBRARY)
    }

    pub fn add_drom_sources(&mut self, pattern: &str) -> Result<usize> {
        self.add_sources(SourceKind::WaveJson, pattern, DEFAULT_LIBRARY)
    }

    // ------------------------------------------------------------------
    // Designs
    // ------------------------------------------------------------------

    /// Set a single top-level.
    pub fn set_toplevel(&mut self, name: &str) -> Result<()> {
        self.set_toplevels([name])
    }

    /// Set the list of top-levels, replacing any earlier list.
    pub fn set_toplevels<I, S>(&mut self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut toplevels: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            // Dots separate design, config and step in keys and policy patterns.
            if name.is_empty() || name.contains(['/', '\\', '.']) {
                return Err(FvmError::BadValue(format!("invalid top-level name {name:?}")));
            }
            if RESERVED_NAMES.contains(&name) {
                return Err(FvmError::ReservedName(name.to_string()));
            }
            if toplevels.iter().any(|t| t == name) {
                return Err(FvmError::DuplicateToplevel(name.to_string()));
            }
            toplevels.push(name.to_string());
        }
        if toplevels.is_empty() {
            return Err(FvmError::BadValue("top-level list must not be empty".to_string()));
        }
        self.design_configs
            .retain(|c| toplevels.iter().any(|t| *t == c.design));
        self.toplevels = toplevels;
        Ok(())
    }

    /// Add a named configuration of a registered top-level.
    ///
    /// Once a design has one config, its implicit default is suppressed.
    pub fn add_config(&mut self, design: &str, name: &str, generics: Generics) -> Result<()> {
        if !self.toplevels.iter().any(|t| t == design) {
            return Err(FvmError::UnknownDesign(design.to_string()));
        }
        if name.is_empty() || name.contains(['/', '\\', '.']) {
            return Err(FvmError::BadValue(format!("invalid config name {name:?}")));
        }
        if self
            .design_configs
            .iter()
            .any(|c| c.design == design && c.name == name)
        {
            return Err(FvmError::DuplicateConfig {
                design: design.to_string(),
                config: name.to_string(),
            });
        }
        self.design_configs.push(DesignConfig {
            design: design.to_string(),
            name: name.to_string(),
            generics,
        });
        Ok(())
    }

    /// Every design key, in registration order.
    pub fn design_keys(&self) -> Vec<DesignKey> {
        let mut keys = Vec::new();
        for design in &self.toplevels {
            let mut configs = self.configs_of(design).peekable();
            if configs.peek().is_none() {
                keys.push(DesignKey::new(design, None));
            }
            keys.extend(configs.map(|c| DesignKey::new(design, Some(&c.name))));
        }
        keys
    }

    pub fn configs_of<'a>(&'a self, design: &'a str) -> impl Iterator<Item = &'a DesignConfig> + 'a {
        self.design_configs.iter().filter(move |c| c.design == design)
    }

    /// Generics of a key; empty for the default config.
    pub fn generics_of(&self, key: &DesignKey) -> Generics {
        match &key.config {
            Some(name) => self
                .configs_of(&key.design)
                .find(|c| &c.name == name)
                .map(|c| c.generics.clone())
                .unwrap_or_default(),
            None => Generics::new(),
        }
    }

    // ------------------------------------------------------------------
    // Constraints
    // ------------------------------------------------------------------

    pub fn add_clock(&mut self, clock: Clock) -> Result<()> {
        require_name("clock", &clock.name)?;
        self.clocks.push(clock);
        Ok(())
    }

    pub fn add_reset(&mut self, reset: Reset) -> Result<()> {
        require_name("reset", &reset.name)?;
        if reset.active_high && reset.active_low {
            return Err(FvmError::BadValue(format!(
                "reset {} cannot be both active-high and active-low",
                reset.name
            )));
        }
        if reset.sync && reset.asynchronous {
            return Err(FvmError::BadValue(format!(
                "reset {} cannot be both sync and async",
                reset.name
            )));
        }
        self.resets.push(reset);
        Ok(())
    }

    pub fn add_clock_domain(&mut self, domain: ClockDomain) -> Result<()> {
        require_ports("clock domain", &domain.ports)?;
        if domain.clock_name.is_none() && !domain.asynchronous && !domain.ignore {
            return Err(FvmError::BadValue(
                "clock domain needs a clock name unless it is async or ignored".to_string(),
            ));
        }
        self.clock_domains.push(domain);
        Ok(())
    }

    pub fn add_reset_domain(&mut self, domain: ResetDomain) -> Result<()> {
        require_ports("reset domain", &domain.ports)?;
        if domain.reset_name.is_none() && !domain.no_reset && !domain.ignore {
            return Err(FvmError::BadValue(
                "reset domain needs a reset name unless it is no-reset or ignored".to_string(),
            ));
        }
        self.reset_domains.push(domain);
        Ok(())
    }

    pub fn blackbox(&mut self, blackbox: Blackbox) -> Result<()> {
        let target = match &blackbox.target {
            BlackboxTarget::Entity(name) | BlackboxTarget::Instance(name) => name,
        };
        require_name("blackbox", target)?;
        self.blackboxes.push(blackbox);
        Ok(())
    }

    pub fn cutpoint(&mut self, cutpoint: Cutpoint) -> Result<()> {
        require_name("cutpoint", &cutpoint.signal)?;
        self.cutpoints.push(cutpoint);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Per-step settings and policies
    // ------------------------------------------------------------------

    pub fn set_prefix(&mut self, prefix: &str) -> Result<()> {
        require_name("prefix", prefix)?;
        self.prefix = prefix.to_string();
        Ok(())
    }

    /// Minimum coverage percentage for `step` or `step.post-step`.
    pub fn set_coverage_goal(&mut self, step: &str, value: f64) -> Result<()> {
        self.require_step(step)?;
        if !(0.0..=100.0).contains(&value) {
            return Err(FvmError::InvalidGoal {
                step: step.to_string(),
                value,
            });
        }
        self.coverage_goals.insert(step.to_string(), value);
        Ok(())
    }

    /// Step timeout as `<n><unit>`, unit one of s, m, h, d.
    pub fn set_timeout(&mut self, step: &str, text: &str) -> Result<()> {
        self.require_step(step)?;
        let duration = parse_timeout(text)?;
        self.timeouts.insert(step.to_string(), duration);
        Ok(())
    }

    /// Replace the toolchain's default flags for `step`.
    pub fn set_tool_flags(&mut self, step: &str, flags: &str) -> Result<()> {
        self.require_step(step)?;
        self.tool_flags.insert(step.to_string(), flags.to_string());
        Ok(())
    }

    pub fn skip(&mut self, step: &str, design: &str) -> Result<()> {
        self.policy.add_skip(step, design)
    }

    pub fn allow_failure(&mut self, step: &str, design: &str) -> Result<()> {
        self.policy.add_allow_failure(step, design)
    }

    pub fn disable_coverage(&mut self, pattern: &str) -> Result<()> {
        self.policy.add_disabled_coverage(pattern)
    }

    pub fn set_pre_hook(&mut self, step: &str, design: &str, hook: Hook) -> Result<()> {
        self.require_step(step)?;
        self.hooks.insert(HookPhase::Pre, design, step, hook);
        Ok(())
    }

    pub fn set_post_hook(&mut self, step: &str, design: &str, hook: Hook) -> Result<()> {
        self.require_step(step)?;
        self.hooks.insert(HookPhase::Post, design, step, hook);
        Ok(())
    }

    /// Ready-to-run check: at least one top-level.
    pub fn validate(&self) -> Result<()> {
        if self.toplevels.is_empty() {
            return Err(FvmError::BadValue("no top-level set".to_string()));
        }
        Ok(())
    }

    fn require_step(&self, step: &str) -> Result<()> {
        if self.catalog.contains(step) {
            Ok(())
        } else {
            Err(FvmError::UnknownStep(step.to_string()))
        }
    }

    // ------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------

    pub fn catalog(&self) -> &StepCatalog {
        &self.catalog
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn sources(&self) -> &[SourceFile] {
        &self.sources
    }

    pub fn sources_of(&self, kind: SourceKind) -> impl Iterator<Item = &SourceFile> {
        self.sources.iter().filter(move |s| s.kind == kind)
    }

    /// HDL libraries in first-use order.
    pub fn libraries(&self) -> Vec<String> {
        let mut libs: Vec<String> = Vec::new();
        for src in self.sources.iter().filter(|s| s.kind.is_hdl()) {
            if !libs.contains(&src.library) {
                libs.push(src.library.clone());
            }
        }
        libs
    }

    pub fn toplevels(&self) -> &[String] {
        &self.toplevels
    }

    pub fn clocks_for<'a>(&'a self, design: &'a str) -> impl Iterator<Item = &'a Clock> + 'a {
        self.clocks.iter().filter(move |c| c.applies_to(design))
    }

    pub fn resets_for<'a>(&'a self, design: &'a str) -> impl Iterator<Item = &'a Reset> + 'a {
        self.resets.iter().filter(move |r| r.applies_to(design))
    }

    pub fn clock_domains_for<'a>(
        &'a self,
        design: &'a str,
    ) -> impl Iterator<Item = &'a ClockDomain> + 'a {
        self.clock_domains.iter().filter(move |d| d.applies_to(design))
    }

    pub fn reset_domains_for<'a>(
        &'a self,
        design: &'a str,
    ) -> impl Iterator<Item = &'a ResetDomain> + 'a {
        self.reset_domains.iter().filter(move |d| d.applies_to(design))
    }

    pub fn blackboxes_for<'a>(&'a self, design: &'a str) -> impl Iterator<Item = &'a Blackbox> + 'a {
        self.blackboxes.iter().filter(move |b| b.applies_to(design))
    }

    pub fn cutpoints_for<'a>(&'a self, design: &'a str) -> impl Iterator<Item = &'a Cutpoint> + 'a {
        self.cutpoints.iter().filter(move |c| c.applies_to(design))
    }

    pub fn coverage_goal(&self, step: &str) -> Option<f64> {
        self.coverage_goals.get(step).copied()
    }

    pub fn timeout(&self, step: &str) -> Option<Duration> {
        self.timeouts.get(step).copied()
    }

    pub fn tool_flags(&self, step: &str) -> Option<&str> {
        self.tool_flags.get(step).map(String::as_str)
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn hooks(&self) -> &HookTable {
        &self.hooks
    }
}

fn require_name(what: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        Err(FvmError::BadValue(format!("{what} name must not be empty")))
    } else {
        Ok(())
    }
}

fn require_ports(what: &str, ports: &[String]) -> Result<()> {
    if ports.is_empty() || ports.iter().any(|p| p.trim().is_empty()) {
        Err(FvmError::BadValue(format!("{what} needs at least one non-empty port")))
    } else {
        Ok(())
    }
}

/// Expand a glob into a sorted, non-empty list of files.
pub fn resolve_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let entries = glob::glob(pattern).map_err(|e| FvmError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.msg.to_string(),
    })?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();
    if paths.is_empty() {
        return Err(FvmError::NoFilesFound {
            pattern: pattern.to_string(),
        });
    }
    paths.sort();
    Ok(paths)
}
