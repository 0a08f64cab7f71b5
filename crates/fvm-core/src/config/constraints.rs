//! Clocks, resets, clock/reset domains, blackboxes and cutpoints.
//!
//! Each entity is a plain record with explicit optional fields, plus a
//! `design` selector (`None` or `"*"` meaning every design). The toolchain
//! renders them with table-driven emitters.

use crate::policy::selector_applies;
use serde::{Deserialize, Serialize};

/// Entities that can be restricted to a subset of designs.
pub trait DesignScoped {
    fn design_selector(&self) -> Option<&str>;

    fn applies_to(&self, design: &str) -> bool {
        selector_applies(self.design_selector(), design)
    }
}

macro_rules! design_scoped {
    ($($ty:ty),* $(,)?) => {
        $(impl DesignScoped for $ty {
            fn design_selector(&self) -> Option<&str> {
                self.design.as_deref()
            }
        })*
    };
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Clock {
    pub design: Option<String>,
    pub name: String,
    pub module: Option<String>,
    pub group: Option<String>,
    /// Period in tool time units.
    pub period: Option<f64>,
    /// `(rise, fall)` edges within the period.
    pub waveform: Option<(f64, f64)>,
    pub external: bool,
    pub ignore: bool,
    pub remove: bool,
}

impl Clock {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Reset {
    pub design: Option<String>,
    pub name: String,
    pub module: Option<String>,
    pub group: Option<String>,
    pub active_high: bool,
    pub active_low: bool,
    pub sync: bool,
    #[serde(rename = "async")]
    pub asynchronous: bool,
    pub external: bool,
    pub ignore: bool,
    pub remove: bool,
}

impl Reset {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClockDomain {
    pub design: Option<String>,
    pub ports: Vec<String>,
    pub clock_name: Option<String>,
    #[serde(rename = "async")]
    pub asynchronous: bool,
    pub sync: bool,
    pub ignore: bool,
    pub posedge: bool,
    pub negedge: bool,
    pub module: Option<String>,
    pub inout_in: bool,
    pub inout_out: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResetDomain {
    pub design: Option<String>,
    pub ports: Vec<String>,
    pub reset_name: Option<String>,
    #[serde(rename = "async")]
    pub asynchronous: bool,
    pub sync: bool,
    pub active_high: bool,
    pub active_low: bool,
    pub is_set: bool,
    pub no_reset: bool,
    pub module: Option<String>,
    pub ignore: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Cutpoint {
    pub design: Option<String>,
    pub signal: String,
    pub module: Option<String>,
    pub resetval: bool,
    pub condition: Option<String>,
    pub driver: Option<String>,
    pub local_scope: bool,
}

impl Cutpoint {
    pub fn new(signal: &str) -> Self {
        Self {
            signal: signal.to_string(),
            ..Self::default()
        }
    }
}

/// What a blackbox replaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlackboxTarget {
    /// Every instance of an entity/module.
    Entity(String),
    /// One instance by hierarchical path.
    Instance(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blackbox {
    #[serde(default)]
    pub design: Option<String>,
    #[serde(flatten)]
    pub target: BlackboxTarget,
}

impl Blackbox {
    pub fn entity(name: &str) -> Self {
        Self {
            design: None,
            target: BlackboxTarget::Entity(name.to_string()),
        }
    }

    pub fn instance(path: &str) -> Self {
        Self {
            design: None,
            target: BlackboxTarget::Instance(path.to_string()),
        }
    }
}

design_scoped!(Clock, Reset, ClockDomain, ResetDomain, Cutpoint, Blackbox);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_design_selector_defaults_to_all() {
        let clk = Clock::new("clk");
        assert!(clk.applies_to("counter"));
        assert!(clk.applies_to("dualcounter"));
    }

    #[test]
    fn test_design_selector_restricts() {
        let rst = Reset {
            design: Some("dualcounter".to_string()),
            ..Reset::new("rst")
        };
        assert!(rst.applies_to("dualcounter"));
        assert!(!rst.applies_to("counter"));
    }

    #[test]
    fn test_reset_async_field_name() {
        let rst: Reset = serde_json::from_str(r#"{"name":"rst","async":true}"#).unwrap();
        assert!(rst.asynchronous);
        assert!(!rst.sync);
    }

    #[test]
    fn test_blackbox_flattened_target() {
        let bb: Blackbox = serde_json::from_str(r#"{"entity":"fifo"}"#).unwrap();
        assert_eq!(bb.target, BlackboxTarget::Entity("fifo".to_string()));
        let bb: Blackbox =
            serde_json::from_str(r#"{"design":"top","instance":"u_core/u_fifo"}"#).unwrap();
        assert_eq!(bb.design.as_deref(), Some("top"));
        assert_eq!(bb.target, BlackboxTarget::Instance("u_core/u_fifo".to_string()));
    }
}
