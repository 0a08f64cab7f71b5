//! Generated tool scripts.
//!
//! Scripts are assembled line by line in memory, terminated with the
//! toolchain's exit sentinel and written in one go. The SHA-256 digest of
//! the bytes on disk is kept so two setups can be compared cheaply.

use crate::error::{Result, ToolchainError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// A script written by a step's setup function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptArtifact {
    pub path: PathBuf,
    /// Hex-encoded SHA-256 of the file contents.
    pub digest: String,
}

impl ScriptArtifact {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct ScriptWriter {
    comment: &'static str,
    body: String,
}

impl ScriptWriter {
    /// `comment` is the line-comment leader of the script language.
    pub fn new(comment: &'static str) -> Self {
        Self {
            comment,
            body: String::new(),
        }
    }

    pub fn line(&mut self, line: impl AsRef<str>) -> &mut Self {
        self.body.push_str(line.as_ref());
        self.body.push('\n');
        self
    }

    pub fn lines<I, S>(&mut self, lines: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.line(line);
        }
        self
    }

    pub fn comment(&mut self, text: &str) -> &mut Self {
        let _ = writeln!(self.body, "{} {}", self.comment, text);
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.body.push('\n');
        self
    }

    /// Contents so far, without the sentinel.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Append `sentinel` and write the script to `path`.
    pub fn finish(mut self, sentinel: &str, path: &Path) -> Result<ScriptArtifact> {
        self.line(sentinel);
        write_script(path, &self.body)
    }
}

/// Write `contents` to `path` and record its digest.
pub fn write_script(path: &Path, contents: &str) -> Result<ScriptArtifact> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ToolchainError::io(parent, e))?;
    }
    std::fs::write(path, contents).map_err(|e| ToolchainError::io(path, e))?;
    Ok(ScriptArtifact {
        path: path.to_path_buf(),
        digest: digest_of(contents.as_bytes()),
    })
}

pub fn digest_of(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Quote a script word when it contains whitespace or braces.
pub fn tcl_quote(word: &str) -> String {
    if word.is_empty() || word.chars().any(|c| c.is_whitespace() || "{}\"$[]".contains(c)) {
        format!("{{{word}}}")
    } else {
        word.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_appends_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lint").join("lint.do");

        let mut w = ScriptWriter::new("#");
        w.comment("generated").line("vlib work");
        let artifact = w.finish("exit", &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "# generated\nvlib work\nexit\n");
        assert_eq!(artifact.digest, digest_of(text.as_bytes()));
        assert_eq!(artifact.file_name(), "lint.do");
    }

    #[test]
    fn test_tcl_quote() {
        assert_eq!(tcl_quote("clk"), "clk");
        assert_eq!(tcl_quote("a b"), "{a b}");
        assert_eq!(tcl_quote(""), "{}");
    }
}
