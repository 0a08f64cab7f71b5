//! Tool summary scraping.
//!
//! Tools print a closing summary block; a [`SummaryParser`] turns it into
//! a [`ToolSummary`]. The default parser is regex based and recognises
//! `Label (N)`, `Label: N` and `... Coverage: P%` lines.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolSummary {
    pub errors: u64,
    pub warnings: u64,
    pub violations: u64,
    pub cautions: u64,
    pub proven: u64,
    pub fired: u64,
    pub inconclusive: u64,
    pub covered: u64,
    pub uncoverable: u64,
    /// Overall coverage percentage, when the tool reports one.
    pub coverage: Option<f64>,
}

/// Which figures the console shows for a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricStyle {
    /// Errors and warnings (lint, friendliness).
    Diagnostics,
    /// Violations and cautions (rulecheck, xverify, resets, clocks).
    Checks,
    /// Proven, fired, inconclusive (prove).
    Proofs,
    /// A percentage (reachability, fault, coverage post-steps).
    Coverage,
}

impl ToolSummary {
    pub fn is_empty(&self) -> bool {
        *self == ToolSummary::default()
    }

    /// Concise figure for the console table.
    pub fn metric(&self, style: MetricStyle) -> String {
        match style {
            MetricStyle::Diagnostics => format!("{}E {}W", self.errors, self.warnings),
            MetricStyle::Checks => format!("{}V {}C", self.violations, self.cautions),
            MetricStyle::Proofs => format!(
                "{}P {}F {}I",
                self.proven, self.fired, self.inconclusive
            ),
            MetricStyle::Coverage => match self.coverage {
                Some(pct) => format!("{pct:.1}%"),
                None => format!("{} covered", self.covered),
            },
        }
    }

    fn record(&mut self, label: &str, count: u64) -> bool {
        let label = label.to_lowercase();
        let slot = if label.contains("inconclusive") {
            &mut self.inconclusive
        } else if label.contains("uncoverable") || label.contains("unreachable") {
            &mut self.uncoverable
        } else if label.contains("error") {
            &mut self.errors
        } else if label.contains("warning") {
            &mut self.warnings
        } else if label.contains("violation") {
            &mut self.violations
        } else if label.contains("caution") {
            &mut self.cautions
        } else if label.contains("proven") || label.contains("proof") {
            &mut self.proven
        } else if label.contains("fired") || label.contains("falsified") {
            &mut self.fired
        } else if label.contains("covered") || label.contains("reachable") {
            &mut self.covered
        } else {
            return false;
        };
        *slot = count;
        true
    }
}

/// Turns captured output into a summary.
pub trait SummaryParser: Send + Sync {
    fn parse(&self, lines: &[&str]) -> ToolSummary;
}

/// Built-in parser for `Label (N)`, `Label: N` and `Coverage: P%`.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordSummaryParser;

struct Patterns {
    parenthesized: Regex,
    colon: Regex,
    percent: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            parenthesized: Regex::new(r"^\s*([A-Za-z][A-Za-z \-]*?)\s*\((\d+)\)\s*$")?,
            colon: Regex::new(r"^\s*([A-Za-z][A-Za-z \-]*?)\s*:\s*(\d+)\s*$")?,
            percent: Regex::new(r"(?i)coverage[^:%]*:\s*(\d+(?:\.\d+)?)\s*%")?,
        })
    }
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns::compile().ok()).as_ref()
}

impl SummaryParser for KeywordSummaryParser {
    fn parse(&self, lines: &[&str]) -> ToolSummary {
        let mut summary = ToolSummary::default();
        let Some(p) = patterns() else {
            return summary;
        };

        for line in lines {
            if let Some(caps) = p.percent.captures(line) {
                if let Ok(pct) = caps[1].parse::<f64>() {
                    summary.coverage = Some(pct);
                }
                continue;
            }
            let caps = p
                .parenthesized
                .captures(line)
                .or_else(|| p.colon.captures(line));
            if let Some(caps) = caps {
                if let Ok(count) = caps[2].parse::<u64>() {
                    summary.record(&caps[1], count);
                }
            }
        }
        summary
    }
}
