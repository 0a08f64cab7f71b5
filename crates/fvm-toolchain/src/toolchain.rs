//! Toolchain plugins and the process-wide toolchain table.
//!
//! `FVM_TOOLCHAIN` picks the active toolchain by name; `questa` is the
//! built-in default. Further adapters can be registered at startup with
//! [`register_toolchain`].

use crate::error::{Result, ToolchainError};
use crate::questa::QuestaToolchain;
use crate::step::StepRegistry;
use fvm_core::{GenericValue, Generics, StepCatalog};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

/// Environment variable selecting the toolchain.
pub const TOOLCHAIN_ENV: &str = "FVM_TOOLCHAIN";

/// Toolchain used when `FVM_TOOLCHAIN` is unset.
pub const DEFAULT_TOOLCHAIN: &str = "questa";

pub trait Toolchain: Send + Sync {
    fn name(&self) -> &str;

    /// Steps in execution order.
    fn steps(&self) -> &StepRegistry;

    /// Default flag string per canonical step name.
    fn default_flags(&self) -> &BTreeMap<String, String>;

    /// Render design generics as tool arguments.
    fn generics_to_args(&self, generics: &Generics) -> Vec<String>;

    /// Render a step timeout in the tool's own syntax.
    fn encode_timeout(&self, timeout: Duration) -> String;

    fn catalog(&self) -> StepCatalog {
        self.steps().catalog()
    }
}

pub type ToolchainFactory = fn() -> Arc<dyn Toolchain>;

fn builtin_questa() -> Arc<dyn Toolchain> {
    Arc::new(QuestaToolchain::new())
}

fn table() -> &'static RwLock<BTreeMap<String, ToolchainFactory>> {
    static TABLE: OnceLock<RwLock<BTreeMap<String, ToolchainFactory>>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut builtin: BTreeMap<String, ToolchainFactory> = BTreeMap::new();
        builtin.insert(DEFAULT_TOOLCHAIN.to_string(), builtin_questa as ToolchainFactory);
        RwLock::new(builtin)
    })
}

/// Register (or replace) a toolchain under `name`.
pub fn register_toolchain(name: &str, factory: ToolchainFactory) {
    let mut table = match table().write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    table.insert(name.to_string(), factory);
}

/// Names of every registered toolchain, sorted.
pub fn available_toolchains() -> Vec<String> {
    let table = match table().read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    table.keys().cloned().collect()
}

pub fn toolchain_by_name(name: &str) -> Result<Arc<dyn Toolchain>> {
    let factory = {
        let table = match table().read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        table.get(name).copied()
    };
    match factory {
        Some(factory) => Ok(factory()),
        None => Err(ToolchainError::UnknownToolchain {
            name: name.to_string(),
            available: available_toolchains().join(", "),
        }),
    }
}

/// Toolchain named by `FVM_TOOLCHAIN`, or the default.
pub fn toolchain_from_env() -> Result<Arc<dyn Toolchain>> {
    let name = std::env::var(TOOLCHAIN_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TOOLCHAIN.to_string());
    tracing::debug!(toolchain = %name, "selecting toolchain");
    toolchain_by_name(name.trim())
}

/// Text form of a generic value as most HDL tools accept it.
pub fn generic_literal(value: &GenericValue) -> String {
    match value {
        GenericValue::Text(s) if s.chars().any(char::is_whitespace) => format!("\"{s}\""),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_is_registered() {
        let tc = toolchain_by_name(DEFAULT_TOOLCHAIN).unwrap();
        assert_eq!(tc.name(), "questa");
        assert!(available_toolchains().contains(&"questa".to_string()));
    }

    #[test]
    fn test_unknown_toolchain_is_bad_value() {
        let err = match toolchain_by_name("no-such-tool") {
            Err(e) => e,
            Ok(_) => panic!("expected error"),
        };
        assert_eq!(err.class(), fvm_core::FailureClass::BadValue);
        assert!(err.to_string().contains("questa"));
    }

    #[test]
    fn test_register_custom_toolchain() {
        register_toolchain("questa-alt", builtin_questa);
        assert!(toolchain_by_name("questa-alt").is_ok());
    }

    #[test]
    fn test_generic_literal() {
        assert_eq!(generic_literal(&GenericValue::Integer(128)), "128");
        assert_eq!(generic_literal(&GenericValue::Boolean(true)), "true");
        assert_eq!(generic_literal(&GenericValue::Text("a b".into())), "\"a b\"");
    }
}
