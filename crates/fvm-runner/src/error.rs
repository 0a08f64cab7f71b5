//! Runner errors.

use fvm_core::{FailureClass, FvmError};
use fvm_toolchain::ToolchainError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error(transparent)]
    Config(#[from] FvmError),

    #[error(transparent)]
    Toolchain(#[from] ToolchainError),

    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {what}: {source}")]
    Serialization {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A hook returned an error or its command exited non-zero.
    #[error("{phase} hook for {step} failed: {message}")]
    Hook {
        phase: &'static str,
        step: String,
        message: String,
    },
}

impl RunnerError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RunnerError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn class(&self) -> FailureClass {
        match self {
            RunnerError::Config(e) => e.class(),
            RunnerError::Toolchain(e) => e.class(),
            _ => FailureClass::ToolError,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.class().exit_code()
    }
}

pub type Result<T> = std::result::Result<T, RunnerError>;
