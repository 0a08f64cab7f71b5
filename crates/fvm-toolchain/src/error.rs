//! Error types for toolchain adapters.

use fvm_core::{FailureClass, FvmError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolchainError {
    /// `FVM_TOOLCHAIN` names an adapter nobody registered.
    #[error("unknown toolchain {name:?} (available: {available})")]
    UnknownToolchain { name: String, available: String },

    /// The external program could not be started.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing a script or reading a log failed.
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The waveform translator ran but produced nothing usable.
    #[error("drom2psl translation failed: {0}")]
    Translator(String),

    #[error(transparent)]
    Config(#[from] FvmError),
}

impl ToolchainError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ToolchainError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn class(&self) -> FailureClass {
        match self {
            ToolchainError::UnknownToolchain { .. } | ToolchainError::Config(_) => {
                FailureClass::BadValue
            }
            _ => FailureClass::ToolError,
        }
    }
}

/// Result type for toolchain operations.
pub type Result<T> = std::result::Result<T, ToolchainError>;
