//! HTML transcript of the console summary.

use super::console::format_elapsed;
use super::junit::escape_xml;
use crate::result::{RunResults, StepStatus};

pub const SUMMARY_HTML: &str = "summary.html";

pub fn render_html(run: &RunResults) -> String {
    let mut html = String::new();

    html.push_str(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>FVM Summary</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 20px; }
        table { border-collapse: collapse; margin-bottom: 24px; }
        th, td { padding: 4px 12px; text-align: left; border-bottom: 1px solid #ddd; }
        .pass { color: #2e7d32; }
        .fail, .broken { color: #c62828; }
        .skip, .omit { color: #9e9e9e; }
        .message { font-family: monospace; white-space: pre-wrap; }
    </style>
</head>
<body>
"#,
    );

    html.push_str(&format!(
        "<h1>{}</h1>\n<p>Started {} with toolchain {}, exit code {}</p>\n",
        escape_xml(&run.script_name),
        run.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        escape_xml(&run.toolchain),
        run.exit_code,
    ));

    for design in &run.designs {
        html.push_str(&format!(
            "<h2>{}</h2>\n<table>\n<tr><th>Status</th><th>Step</th><th>Metric</th><th>Elapsed</th><th>Message</th></tr>\n",
            escape_xml(&design.key.to_string())
        ));
        for step in &design.steps {
            let elapsed = if step.status.was_executed() {
                format_elapsed(step.elapsed)
            } else {
                String::new()
            };
            html.push_str(&format!(
                "<tr class=\"{status}\"><td>{status}</td><td>{}</td><td>{}</td><td>{}</td><td class=\"message\">{}</td></tr>\n",
                escape_xml(&step.step),
                escape_xml(&step.metric),
                elapsed,
                escape_xml(step.message.as_deref().unwrap_or_default()),
                status = step.status,
            ));
        }
        html.push_str("</table>\n");
    }

    html.push_str(&format!(
        "<p>Total: {} pass, {} fail, {} broken, {} skip, {} omit in {}</p>\n",
        run.count(StepStatus::Pass),
        run.count(StepStatus::Fail),
        run.count(StepStatus::Broken),
        run.count(StepStatus::Skip),
        run.count(StepStatus::Omit),
        format_elapsed(run.step_time()),
    ));
    html.push_str("</body>\n</html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{DesignResults, StepResult};
    use chrono::Utc;
    use fvm_core::DesignKey;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_html_lists_every_step() {
        let mut fail = StepResult::pending("prove");
        fail.status = StepStatus::Fail;
        fail.message = Some("tool exited with status 2".to_string());
        let run = RunResults {
            script_name: "counter.toml".to_string(),
            prefix: "fvm".to_string(),
            toolchain: "questa".to_string(),
            outdir: PathBuf::from("fvm_out"),
            designs: vec![DesignResults {
                key: DesignKey::new("counter", None),
                steps: vec![StepResult::skipped("lint", "skip"), fail],
            }],
            started_at: Utc::now(),
            elapsed: Duration::from_secs(1),
            cancelled: false,
            exit_code: 4,
            violations: Vec::new(),
        };

        let html = render_html(&run);
        assert!(html.contains("<h2>counter</h2>"));
        assert!(html.contains(r#"<tr class="fail"><td>fail</td><td>prove</td>"#));
        assert!(html.contains("tool exited with status 2"));
        assert!(html.contains("exit code 4"));
    }
}
