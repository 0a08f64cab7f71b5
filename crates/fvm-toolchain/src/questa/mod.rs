//! Built-in Questa formal toolchain.
//!
//! Every step writes a `.do` script into its directory and runs it with
//! `qverify -c -od . -do <step>.do`; the simulation coverage post-step
//! runs under `vsim` instead.

pub mod emit;
pub mod steps;

pub use steps::{QuestaStep, StepKind};

use crate::step::{Step, StepRegistry};
use crate::toolchain::{generic_literal, Toolchain};
use fvm_core::{format_timeout, Generics};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Coverage types reported by the formal coverage post-step, in report order.
pub const COVERAGE_TYPES: &[&str] = &["statement", "branch", "condition", "expression", "fsm", "toggle"];

/// Defaults shared by every Questa step.
#[derive(Debug, Clone)]
pub struct QuestaSettings {
    pub default_flags: BTreeMap<String, String>,
}

impl Default for QuestaSettings {
    fn default() -> Self {
        let default_flags = [
            ("prove", "-jobs 4"),
            ("prove.formalcover", "-jobs 4"),
            ("reachability", "-jobs 4"),
            ("xverify", "-rpt_flow xverify.rpt"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self { default_flags }
    }
}

/// `-G<name>=<value>` per generic, in name order.
fn generic_args(generics: &Generics) -> Vec<String> {
    generics
        .iter()
        .map(|(name, value)| format!("-G{name}={}", generic_literal(value)))
        .collect()
}

pub struct QuestaToolchain {
    settings: Arc<QuestaSettings>,
    steps: StepRegistry,
}

impl Default for QuestaToolchain {
    fn default() -> Self {
        Self::new()
    }
}

impl QuestaToolchain {
    pub fn new() -> Self {
        Self::with_settings(QuestaSettings::default())
    }

    pub fn with_settings(settings: QuestaSettings) -> Self {
        let settings = Arc::new(settings);
        let mut steps = StepRegistry::new();
        for kind in StepKind::ORDER {
            let step: Arc<dyn Step> = Arc::new(QuestaStep::new(kind, Arc::clone(&settings)));
            let post_steps: Vec<Arc<dyn Step>> = kind
                .post_steps()
                .iter()
                .map(|post| Arc::new(QuestaStep::new(*post, Arc::clone(&settings))) as Arc<dyn Step>)
                .collect();
            steps.push_with_post_steps(step, post_steps);
        }
        Self { settings, steps }
    }
}

impl Toolchain for QuestaToolchain {
    fn name(&self) -> &str {
        "questa"
    }

    fn steps(&self) -> &StepRegistry {
        &self.steps
    }

    fn default_flags(&self) -> &BTreeMap<String, String> {
        &self.settings.default_flags
    }

    fn generics_to_args(&self, generics: &Generics) -> Vec<String> {
        generic_args(generics)
    }

    /// Questa takes timeouts in the same `<n><unit>` form users write.
    fn encode_timeout(&self, timeout: Duration) -> String {
        format_timeout(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fvm_core::GenericValue;

    #[test]
    fn test_catalog_matches_registry() {
        let tc = QuestaToolchain::new();
        let catalog = tc.catalog();
        assert!(catalog.contains("prove.formalcover"));
        assert!(catalog.contains("prove.simcover"));
        assert!(!catalog.contains("lint.formalcover"));
        assert_eq!(catalog.qualified_names().len(), 11);
    }

    #[test]
    fn test_generics_to_args() {
        let mut generics = Generics::new();
        generics.insert("MAX_COUNT".into(), GenericValue::Integer(128));
        generics.insert("ENABLE".into(), GenericValue::Boolean(false));
        assert_eq!(
            QuestaToolchain::new().generics_to_args(&generics),
            vec!["-GENABLE=false", "-GMAX_COUNT=128"]
        );
    }

    #[test]
    fn test_encode_timeout() {
        assert_eq!(QuestaToolchain::new().encode_timeout(Duration::from_secs(3600)), "1h");
    }
}
