//! Design and property source files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Kind of a registered source file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Vhdl,
    Verilog,
    SystemVerilog,
    Psl,
    WaveJson,
}

impl SourceKind {
    /// Extensions that do not trigger an "unusual extension" warning.
    pub fn expected_extensions(self) -> &'static [&'static str] {
        match self {
            SourceKind::Vhdl => &["vhd", "vhdl"],
            SourceKind::Verilog => &["v", "vh"],
            SourceKind::SystemVerilog => &["sv", "svh"],
            SourceKind::Psl => &["psl"],
            SourceKind::WaveJson => &["json"],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SourceKind::Vhdl => "VHDL",
            SourceKind::Verilog => "Verilog",
            SourceKind::SystemVerilog => "SystemVerilog",
            SourceKind::Psl => "PSL",
            SourceKind::WaveJson => "wavedrom JSON",
        }
    }

    /// Whether the file is compiled as HDL into a library.
    pub fn is_hdl(self) -> bool {
        matches!(
            self,
            SourceKind::Vhdl | SourceKind::Verilog | SourceKind::SystemVerilog
        )
    }

    pub fn has_expected_extension(self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                self.expected_extensions()
                    .iter()
                    .any(|x| x.eq_ignore_ascii_case(e))
            })
            .unwrap_or(false)
    }
}

/// Language flavour of a PSL property file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PslFlavor {
    Vhdl,
    Verilog,
}

pub const DEFAULT_LIBRARY: &str = "work";

/// A registered source file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub kind: SourceKind,
    pub library: String,
    pub psl_flavor: Option<PslFlavor>,
}

impl SourceFile {
    pub fn new(path: PathBuf, kind: SourceKind) -> Self {
        Self {
            path,
            kind,
            library: DEFAULT_LIBRARY.to_string(),
            psl_flavor: None,
        }
    }

    pub fn with_library(mut self, library: &str) -> Self {
        self.library = library.to_string();
        self
    }

    pub fn with_psl_flavor(mut self, flavor: PslFlavor) -> Self {
        self.psl_flavor = Some(flavor);
        self
    }
}
