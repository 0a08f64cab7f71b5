//! Line classification.
//!
//! A table holds case-insensitive literal keywords in three categories
//! plus an `ignore` pre-filter. A line that contains any ignore keyword is
//! never classified; otherwise error wins over warning, warning over
//! success. The same table is applied to live lines and to archived logs.

use crate::error::{Result, ToolchainError};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// One classified line, kept for the JUnit failure body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedLine {
    pub severity: Severity,
    pub line: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationTable {
    pub ignore: Vec<String>,
    pub error: Vec<String>,
    pub warning: Vec<String>,
    pub success: Vec<String>,
}

impl ClassificationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignore(mut self, keywords: &[&str]) -> Self {
        self.ignore.extend(lowered(keywords));
        self
    }

    pub fn error(mut self, keywords: &[&str]) -> Self {
        self.error.extend(lowered(keywords));
        self
    }

    pub fn warning(mut self, keywords: &[&str]) -> Self {
        self.warning.extend(lowered(keywords));
        self
    }

    pub fn success(mut self, keywords: &[&str]) -> Self {
        self.success.extend(lowered(keywords));
        self
    }

    pub fn classify(&self, line: &str) -> Option<Severity> {
        let lower = line.to_lowercase();
        let hit = |keywords: &[String]| keywords.iter().any(|k| lower.contains(k.as_str()));

        if hit(&self.ignore) {
            None
        } else if hit(&self.error) {
            Some(Severity::Error)
        } else if hit(&self.warning) {
            Some(Severity::Warning)
        } else if hit(&self.success) {
            Some(Severity::Success)
        } else {
            None
        }
    }

    /// Classify every line, dropping unclassified ones.
    pub fn classify_lines<'a, I>(&self, lines: I) -> Vec<ClassifiedLine>
    where
        I: IntoIterator<Item = &'a str>,
    {
        lines
            .into_iter()
            .filter_map(|line| {
                self.classify(line).map(|severity| ClassifiedLine {
                    severity,
                    line: line.to_string(),
                })
            })
            .collect()
    }

    /// Re-classify an archived `<step>.log`.
    pub fn classify_log(&self, path: &Path) -> Result<Vec<ClassifiedLine>> {
        let text = std::fs::read_to_string(path).map_err(|e| ToolchainError::io(path, e))?;
        Ok(self.classify_lines(text.lines()))
    }
}

fn lowered<'a>(keywords: &'a [&'a str]) -> impl Iterator<Item = String> + 'a {
    keywords.iter().map(|k| k.to_lowercase())
}

/// Count of classified lines at `severity`.
pub fn count_of(lines: &[ClassifiedLine], severity: Severity) -> usize {
    lines.iter().filter(|l| l.severity == severity).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ClassificationTable {
        ClassificationTable::new()
            .ignore(&["Errors: 0", "error (0)"])
            .error(&["Error"])
            .warning(&["Warning"])
            .success(&["Completed"])
    }

    #[test]
    fn test_case_insensitive_match() {
        let t = table();
        assert_eq!(t.classify("** ERROR: boom"), Some(Severity::Error));
        assert_eq!(t.classify("warning: odd"), Some(Severity::Warning));
        assert_eq!(t.classify("Run completed."), Some(Severity::Success));
        assert_eq!(t.classify("just chatter"), None);
    }

    #[test]
    fn test_ignore_takes_precedence() {
        let t = table();
        assert_eq!(t.classify("Summary: errors: 0, warnings: 2"), None);
        assert_eq!(t.classify("Error (0)"), None);
    }

    #[test]
    fn test_error_beats_warning() {
        assert_eq!(
            table().classify("Warning: previous Error repeated"),
            Some(Severity::Error)
        );
    }

    #[test]
    fn test_classify_log_matches_live() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("lint.log");
        std::fs::write(&log, "start\nError: x\nWarning: y\nErrors: 0\n").unwrap();

        let t = table();
        let archived = t.classify_log(&log).unwrap();
        let live = t.classify_lines(["start", "Error: x", "Warning: y", "Errors: 0"]);
        assert_eq!(archived, live);
        assert_eq!(count_of(&archived, Severity::Error), 1);
        assert_eq!(count_of(&archived, Severity::Warning), 1);
    }
}
