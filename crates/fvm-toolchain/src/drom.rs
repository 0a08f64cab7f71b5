//! drom2psl: the waveform-JSON to PSL translator.
//!
//! An external collaborator. It is run once per design before setup and
//! its generated `.psl` files join that design's property set.

use crate::error::{Result, ToolchainError};
use crate::exec::{StreamKind, ToolExecutor, ToolInvocation};
use fvm_core::{PslFlavor, SourceFile, SourceKind};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable naming the translator binary.
pub const DROM2PSL_ENV: &str = "FVM_DROM2PSL";

pub const DEFAULT_DROM2PSL: &str = "drom2psl";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drom2Psl {
    program: String,
}

impl Default for Drom2Psl {
    fn default() -> Self {
        Self::new(DEFAULT_DROM2PSL)
    }
}

impl Drom2Psl {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }

    pub fn from_env() -> Self {
        match std::env::var(DROM2PSL_ENV) {
            Ok(program) if !program.trim().is_empty() => Self::new(program.trim()),
            _ => Self::default(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn invocation(
        &self,
        sources: &[&SourceFile],
        outdir: &Path,
        env: &BTreeMap<String, String>,
    ) -> ToolInvocation {
        ToolInvocation::new(&self.program, outdir)
            .arg("--outdir")
            .arg(outdir.to_string_lossy())
            .args(sources.iter().map(|s| s.path.to_string_lossy().into_owned()))
            .envs(env)
    }

    /// Translate every wavedrom source into `outdir`, returning the
    /// generated property files in name order.
    pub async fn translate(
        &self,
        exec: &dyn ToolExecutor,
        sources: &[&SourceFile],
        outdir: &Path,
        env: &BTreeMap<String, String>,
    ) -> Result<Vec<SourceFile>> {
        std::fs::create_dir_all(outdir).map_err(|e| ToolchainError::io(outdir, e))?;

        let invocation = self.invocation(sources, outdir, env);
        tracing::info!(command = %invocation.command_line(), "translating wavedrom sources");
        let echo = |_stream: StreamKind, line: &str| tracing::debug!(tool = "drom2psl", "{line}");
        let output = exec.execute(&invocation, &echo).await?;

        if !output.exit.success() {
            let detail = output.stderr.last().cloned().unwrap_or_default();
            return Err(ToolchainError::Translator(format!(
                "{} ended with {:?} {}",
                self.program, output.exit, detail
            )));
        }

        let generated = generated_psl(outdir)?;
        if generated.is_empty() {
            return Err(ToolchainError::Translator(format!(
                "no property files written to {}",
                outdir.display()
            )));
        }
        Ok(generated
            .into_iter()
            .map(|path| SourceFile::new(path, SourceKind::Psl).with_psl_flavor(PslFlavor::Vhdl))
            .collect())
    }
}

fn generated_psl(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| ToolchainError::io(dir, e))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| SourceKind::Psl.has_expected_extension(p))
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_lists_sources_in_order() {
        let a = SourceFile::new(PathBuf::from("/w/a.json"), SourceKind::WaveJson);
        let b = SourceFile::new(PathBuf::from("/w/b.json"), SourceKind::WaveJson);
        let inv = Drom2Psl::new("drom2psl").invocation(
            &[&a, &b],
            Path::new("/out/counter/drom2psl"),
            &BTreeMap::new(),
        );
        assert_eq!(
            inv.command_line(),
            "drom2psl --outdir /out/counter/drom2psl /w/a.json /w/b.json"
        );
    }

    #[test]
    fn test_generated_psl_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["z.psl", "a.psl", "readme.txt"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let found = generated_psl(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.psl", "z.psl"]);
    }
}
