use std::{fmt::Write as _, fs, path::Path, str::FromStr};

use anyhow::{Context, Result};

use super::model::{Outcome, RunReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Junit,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "junit" | "xml" => Ok(ReportFormat::Junit),
            other => Err(format!("unknown report format `{other}` (expected json or junit)")),
        }
    }
}

pub fn render_report(report: &RunReport, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Json => {
            serde_json::to_string_pretty(report).context("serializing run report")
        }
        ReportFormat::Junit => Ok(render_junit(report)),
    }
}

pub fn write_report(report: &RunReport, format: ReportFormat, path: &Path) -> Result<()> {
    let rendered = render_report(report, format)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating report directory {}", parent.display()))?;
    }
    fs::write(path, rendered).with_context(|| format!("writing report to {}", path.display()))
}

/// One `<testsuite>` per group; errored scenarios map to `<error>`, failed
/// ones to `<failure>`.
fn render_junit(report: &RunReport) -> String {
    let summary = &report.summary;
    let total_secs: f64 = report.groups.iter().map(|g| g.duration_ms).sum::<f64>() / 1000.0;

    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(
        out,
        "<testsuites name=\"contractpit\" tests=\"{}\" failures=\"{}\" errors=\"{}\" time=\"{:.3}\">",
        summary.total, summary.failed, summary.errored, total_secs
    );

    for group in &report.groups {
        let failures = group
            .results
            .iter()
            .filter(|r| r.outcome == Outcome::Fail)
            .count();
        let errors = group
            .results
            .iter()
            .filter(|r| r.outcome == Outcome::Error)
            .count();
        let _ = writeln!(
            out,
            "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" errors=\"{}\" time=\"{:.3}\" timestamp=\"{}\">",
            escape_xml(&format!("{}.{}", group.suite, group.name)),
            group.results.len(),
            failures,
            errors,
            group.duration_ms / 1000.0,
            report.started_at.to_rfc3339()
        );

        for result in &group.results {
            let _ = write!(
                out,
                "    <testcase classname=\"{}\" name=\"{}\" time=\"{:.3}\"",
                escape_xml(&group.name),
                escape_xml(&result.scenario_id),
                result.duration_ms / 1000.0
            );
            match result.outcome {
                Outcome::Pass => out.push_str("/>\n"),
                Outcome::Fail => {
                    let detail = result
                        .failed_assertions
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("\n");
                    let message = result
                        .failed_assertions
                        .first()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| "assertion failed".to_string());
                    let _ = write!(
                        out,
                        ">\n      <failure message=\"{}\" type=\"assertion\">{}</failure>\n    </testcase>\n",
                        escape_xml(&message),
                        escape_xml(&detail)
                    );
                }
                Outcome::Error => {
                    let message = result
                        .error
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| "error".to_string());
                    let _ = write!(
                        out,
                        ">\n      <error message=\"{}\" type=\"error\"/>\n    </testcase>\n",
                        escape_xml(&message)
                    );
                }
            }
        }
        out.push_str("  </testsuite>\n");
    }

    out.push_str("</testsuites>\n");
    out
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c if (c as u32) < 0x20 && !matches!(c, '\n' | '\r' | '\t') => {}
            c => escaped.push(c),
        }
    }
    escaped
}
