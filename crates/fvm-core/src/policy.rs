//! Skip, allow-failure and disabled-coverage policies.
//!
//! Every rule is a wildcard pattern over the canonical key
//! `<design>.<step>[.<post-step>]`. Evaluation is match-any-wins: a key is
//! skipped as soon as one skip pattern matches it. Post-steps are matched
//! on their own key and inherit nothing from their parent.

use crate::error::{FvmError, Result};
use glob::{MatchOptions, Pattern};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// A `*`-wildcard pattern over dotted policy keys.
#[derive(Debug, Clone, PartialEq)]
pub struct WildcardPattern {
    pattern: Pattern,
}

impl WildcardPattern {
    /// Compile a pattern such as `"*.prove.formalcover"`.
    pub fn new(source: &str) -> Result<Self> {
        let pattern = Pattern::new(source).map_err(|e| FvmError::InvalidPattern {
            pattern: source.to_string(),
            reason: e.msg.to_string(),
        })?;
        Ok(Self { pattern })
    }

    /// Whether `key` matches this pattern in full.
    pub fn matches(&self, key: &str) -> bool {
        self.pattern.matches_with(key, MATCH_OPTIONS)
    }
}

/// Whether a design selector (`None` or `"*"` for every design) applies to `design`.
pub fn selector_applies(selector: Option<&str>, design: &str) -> bool {
    match selector {
        None | Some("*") => true,
        Some(sel) => WildcardPattern::new(sel)
            .map(|p| p.matches(design))
            .unwrap_or(false),
    }
}

/// Canonical policy key for a step of a design.
pub fn policy_key(design: &str, step: &str) -> String {
    format!("{design}.{step}")
}

/// Pattern lists consulted by the driver.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    skip: Vec<WildcardPattern>,
    allow_failure: Vec<WildcardPattern>,
    disabled_coverage: Vec<WildcardPattern>,
}

impl Policy {
    /// Skip `step` (or `"parent.post"`) for designs matching `design`.
    pub fn add_skip(&mut self, step: &str, design: &str) -> Result<()> {
        self.skip
            .push(WildcardPattern::new(&policy_key(design, step))?);
        Ok(())
    }

    /// Allow `step` to fail without aborting for designs matching `design`.
    pub fn add_allow_failure(&mut self, step: &str, design: &str) -> Result<()> {
        self.allow_failure
            .push(WildcardPattern::new(&policy_key(design, step))?);
        Ok(())
    }

    /// Disable a coverage type, pattern `"design.step.covtype"`.
    pub fn add_disabled_coverage(&mut self, pattern: &str) -> Result<()> {
        if pattern.split('.').count() < 3 {
            return Err(FvmError::BadValue(format!(
                "disabled coverage pattern {pattern:?} must have the form design.step.covtype"
            )));
        }
        self.disabled_coverage.push(WildcardPattern::new(pattern)?);
        Ok(())
    }

    pub fn is_skipped(&self, design: &str, step: &str) -> bool {
        let key = policy_key(design, step);
        self.skip.iter().any(|p| p.matches(&key))
    }

    pub fn is_failure_allowed(&self, design: &str, step: &str) -> bool {
        let key = policy_key(design, step);
        self.allow_failure.iter().any(|p| p.matches(&key))
    }

    pub fn is_coverage_disabled(&self, design: &str, step: &str, covtype: &str) -> bool {
        let key = format!("{design}.{step}.{covtype}");
        self.disabled_coverage.iter().any(|p| p.matches(&key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_matches_whole_key() {
        let p = WildcardPattern::new("*.prove").unwrap();
        assert!(p.matches("counter.prove"));
        assert!(!p.matches("counter.prove.formalcover"));
    }

    #[test]
    fn test_design_specific_and_wildcard_skip_both_apply() {
        let mut policy = Policy::default();
        policy.add_skip("reachability", "dualcounter").unwrap();
        policy.add_skip("reachability", "*").unwrap();
        assert!(policy.is_skipped("dualcounter", "reachability"));
        assert!(policy.is_skipped("counter", "reachability"));
    }

    #[test]
    fn test_skip_is_design_scoped() {
        let mut policy = Policy::default();
        policy.add_skip("reachability", "dualcounter").unwrap();
        assert!(policy.is_skipped("dualcounter", "reachability"));
        assert!(!policy.is_skipped("counter", "reachability"));
        assert!(!policy.is_skipped("dualcounter", "lint"));
    }

    #[test]
    fn test_post_step_does_not_inherit_parent_rules() {
        let mut policy = Policy::default();
        policy.add_skip("prove", "*").unwrap();
        policy.add_allow_failure("prove", "*").unwrap();
        assert!(policy.is_skipped("counter", "prove"));
        assert!(!policy.is_skipped("counter", "prove.formalcover"));
        assert!(!policy.is_failure_allowed("counter", "prove.simcover"));
    }

    #[test]
    fn test_allow_failure_for_post_step() {
        let mut policy = Policy::default();
        policy.add_allow_failure("prove.formalcover", "*").unwrap();
        assert!(policy.is_failure_allowed("counter", "prove.formalcover"));
        assert!(!policy.is_failure_allowed("counter", "prove"));
    }

    #[test]
    fn test_disabled_coverage_requires_three_segments() {
        let mut policy = Policy::default();
        assert!(policy.add_disabled_coverage("counter.prove").is_err());
        policy.add_disabled_coverage("*.prove.branch").unwrap();
        assert!(policy.is_coverage_disabled("counter", "prove", "branch"));
        assert!(!policy.is_coverage_disabled("counter", "prove", "statement"));
    }

    #[test]
    fn test_selector_applies() {
        assert!(selector_applies(None, "counter"));
        assert!(selector_applies(Some("*"), "counter"));
        assert!(selector_applies(Some("count*"), "counter"));
        assert!(!selector_applies(Some("dualcounter"), "counter"));
    }
}
