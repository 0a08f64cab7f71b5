//! JUnit XML: one suite per design key, one case per step and post-step.

use crate::result::{RunResults, StepResult, StepStatus};
use std::path::Path;

/// Escape XML special characters.
///
/// Terminal escape sequences are stripped and any other character outside
/// the XML 1.0 `Char` production is dropped, so tool output captured from
/// a log can be embedded as-is.
pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\x1b' => {
                // CSI: ESC '[' parameters, ended by a byte in '@'..='~'.
                if chars.next_if_eq(&'[').is_some() {
                    for c in chars.by_ref() {
                        if ('@'..='~').contains(&c) {
                            break;
                        }
                    }
                }
            }
            c if is_xml_char(c) => out.push(c),
            _ => {}
        }
    }
    out
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

/// File stem for the results document, derived from the program path.
pub fn sanitized_script_name(script: &str) -> String {
    let stem = Path::new(script).with_extension("");
    let name: String = stem
        .to_string_lossy()
        .trim_start_matches(['.', '/'])
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() {
        "fvm".to_string()
    } else {
        name
    }
}

fn render_case(xml: &mut String, classname: &str, step: &StepResult) {
    let name = escape_xml(&format!("{classname}.{}", step.step));
    let classname = escape_xml(classname);
    let time = step.elapsed.as_secs_f64();
    let message = step.message.as_deref().unwrap_or_default();

    let body = match step.status {
        StepStatus::Pass => None,
        StepStatus::Skip | StepStatus::Omit | StepStatus::Pending | StepStatus::Running => {
            Some(format!(
                r#"      <skipped message="{}">{}</skipped>"#,
                step.status,
                escape_xml(message)
            ))
        }
        StepStatus::Fail => {
            let class = step.failure_class.map(|c| c.name()).unwrap_or("tool-error");
            let first = message.lines().next().unwrap_or_default();
            let allowed = if step.allowed { " (allowed)" } else { "" };
            Some(format!(
                r#"      <failure type="{class}" message="{}{allowed}">{}</failure>"#,
                escape_xml(first),
                escape_xml(message)
            ))
        }
        StepStatus::Broken => {
            let class = step.failure_class.map(|c| c.name()).unwrap_or("tool-error");
            Some(format!(
                r#"      <error type="{class}" message="broken">{}</error>"#,
                escape_xml(message)
            ))
        }
    };

    match body {
        None if step.stdout.is_empty() => {
            xml.push_str(&format!(
                r#"    <testcase name="{name}" classname="{classname}" time="{time:.3}"/>"#
            ));
            xml.push('\n');
        }
        body => {
            xml.push_str(&format!(
                r#"    <testcase name="{name}" classname="{classname}" time="{time:.3}">"#
            ));
            xml.push('\n');
            if let Some(body) = body {
                xml.push_str(&body);
                xml.push('\n');
            }
            if let Some(log) = &step.log_path {
                xml.push_str(&format!(
                    "      <system-out>{}</system-out>\n",
                    escape_xml(&log.display().to_string())
                ));
            }
            xml.push_str("    </testcase>\n");
        }
    }
}

/// Render the full document.
pub fn render_junit(run: &RunResults) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(&format!(
        r#"<testsuites name="{}" tests="{}" failures="{}" time="{:.3}">"#,
        escape_xml(&run.script_name),
        run.total_steps(),
        run.count(StepStatus::Fail),
        run.step_time().as_secs_f64()
    ));
    xml.push('\n');

    for design in &run.designs {
        let classname = design.key.to_string();
        let skipped = design.count(StepStatus::Skip) + design.count(StepStatus::Omit);
        xml.push_str(&format!(
            r#"  <testsuite name="{}" tests="{}" failures="{}" errors="{}" skipped="{}" time="{:.3}" timestamp="{}">"#,
            escape_xml(&format!("{}.{}", run.prefix, classname)),
            design.steps.len(),
            design.count(StepStatus::Fail),
            design.count(StepStatus::Broken),
            skipped,
            design.elapsed().as_secs_f64(),
            run.started_at.format("%Y-%m-%dT%H:%M:%S"),
        ));
        xml.push('\n');
        for step in &design.steps {
            render_case(&mut xml, &classname, step);
        }
        xml.push_str("  </testsuite>\n");
    }

    xml.push_str("</testsuites>\n");
    xml
}
