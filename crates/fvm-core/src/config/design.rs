//! Design configurations and design keys.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Output directory names a top-level may not take.
pub const RESERVED_NAMES: &[&str] = &[
    "fvm_dashboard",
    "fvm_reports",
    "fvm_report",
    "fvm_results",
    "fvm_history",
    "previous_executions",
];

/// Name of the implicit configuration of a design without registered configs.
pub const DEFAULT_CONFIG: &str = "default";

/// Value of a generic/parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GenericValue {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl fmt::Display for GenericValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenericValue::Boolean(b) => write!(f, "{b}"),
            GenericValue::Integer(i) => write!(f, "{i}"),
            GenericValue::Real(r) => write!(f, "{r}"),
            GenericValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for GenericValue {
    fn from(v: i64) -> Self {
        GenericValue::Integer(v)
    }
}

impl From<bool> for GenericValue {
    fn from(v: bool) -> Self {
        GenericValue::Boolean(v)
    }
}

impl From<&str> for GenericValue {
    fn from(v: &str) -> Self {
        GenericValue::Text(v.to_string())
    }
}

pub type Generics = BTreeMap<String, GenericValue>;

/// A named set of generic values for one design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignConfig {
    pub design: String,
    pub name: String,
    pub generics: Generics,
}

/// `(top-level, config)`: the unit of scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DesignKey {
    pub design: String,
    /// `None` for the implicit default config.
    pub config: Option<String>,
}

impl DesignKey {
    pub fn new(design: &str, config: Option<&str>) -> Self {
        Self {
            design: design.to_string(),
            config: config.map(str::to_string),
        }
    }

    pub fn config_name(&self) -> &str {
        self.config.as_deref().unwrap_or(DEFAULT_CONFIG)
    }

    /// Directory name under the output directory.
    pub fn dir_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DesignKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.config {
            Some(config) => write!(f, "{}.{}", self.design, config),
            None => f.write_str(&self.design),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_design_key_rendering() {
        assert_eq!(DesignKey::new("counter", None).to_string(), "counter");
        assert_eq!(
            DesignKey::new("counter", Some("max_128")).dir_name(),
            "counter.max_128"
        );
        assert_eq!(DesignKey::new("counter", None).config_name(), "default");
    }

    #[test]
    fn test_generic_value_untagged() {
        let generics: Generics =
            serde_json::from_str(r#"{"MAX_COUNT":128,"MODE":"fast","EN":true}"#).unwrap();
        assert_eq!(generics["MAX_COUNT"], GenericValue::Integer(128));
        assert_eq!(generics["MODE"], GenericValue::Text("fast".to_string()));
        assert_eq!(generics["EN"].to_string(), "true");
    }
}
