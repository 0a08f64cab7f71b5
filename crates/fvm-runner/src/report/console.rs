//! Console summary table.

use crate::result::{DesignResults, RunResults, StepResult, StepStatus};
use std::time::Duration;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Debug, Clone, Tabled)]
struct StepRow {
    #[tabled(rename = "")]
    mark: &'static str,
    #[tabled(rename = "Step")]
    step: String,
    #[tabled(rename = "Status")]
    status: &'static str,
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Elapsed")]
    elapsed: String,
}

impl From<&StepResult> for StepRow {
    fn from(result: &StepResult) -> Self {
        let status = match (result.status, result.allowed) {
            (StepStatus::Fail, true) => "fail (allowed)",
            (status, _) => status.as_str(),
        };
        Self {
            mark: result.status.symbol(),
            step: result.step.clone(),
            status,
            metric: result.metric.clone(),
            elapsed: if result.status.was_executed() {
                format_elapsed(result.elapsed)
            } else {
                String::new()
            },
        }
    }
}

/// `1.2s`, `3m 04s`, `1h 02m`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs < 60 {
        format!("{:.1}s", elapsed.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
    }
}

pub fn render_design(design: &DesignResults) -> String {
    let rows: Vec<StepRow> = design.steps.iter().map(StepRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    format!("{}\n{}\n", design.key, table)
}

pub fn total_line(run: &RunResults) -> String {
    format!(
        "Total: {} pass, {} fail, {} broken, {} skip, {} omit in {}",
        run.count(StepStatus::Pass),
        run.count(StepStatus::Fail),
        run.count(StepStatus::Broken),
        run.count(StepStatus::Skip),
        run.count(StepStatus::Omit),
        format_elapsed(run.step_time()),
    )
}

pub fn render_summary(run: &RunResults) -> String {
    let mut out = String::new();
    for design in &run.designs {
        out.push_str(&render_design(design));
        out.push('\n');
    }
    out.push_str(&total_line(run));
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use fvm_core::DesignKey;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_millis(1250)), "1.2s");
        assert_eq!(format_elapsed(Duration::from_secs(184)), "3m 04s");
        assert_eq!(format_elapsed(Duration::from_secs(3720)), "1h 02m");
    }

    #[test]
    fn test_design_table_has_a_row_per_step() {
        let mut lint = StepResult::pending("lint");
        lint.status = StepStatus::Pass;
        lint.metric = "0E 2W".to_string();
        let design = DesignResults {
            key: DesignKey::new("counter", None),
            steps: vec![lint, StepResult::skipped("reachability", "skip")],
        };

        let text = render_design(&design);
        assert!(text.starts_with("counter\n"));
        assert!(text.contains("0E 2W"));
        assert!(text.contains("reachability"));
        assert!(text.contains("skip"));
    }
}
