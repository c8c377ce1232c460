use std::fmt::Write as _;
use std::path::Path;

use colored::{Color, Colorize};
use url::Url;

use super::model::{Outcome, RunReport, ScenarioResult};

pub fn print_report(report: &RunReport) {
    print!("{}", format_report(report));
}

/// Renders the console report: one line per scenario, then failure detail and
/// the summary.
pub fn format_report(report: &RunReport) -> String {
    let mut out = String::new();

    for group in &report.groups {
        let _ = writeln!(
            out,
            "{} {} {}",
            group.name.bold(),
            format!("({})", group.suite).dimmed(),
            format!("{:.1} ms", group.duration_ms).dimmed()
        );
        for result in &group.results {
            write_result(&mut out, result);
        }
        out.push('\n');
    }

    let summary = &report.summary;
    let color = if report.success() {
        Color::Green
    } else {
        Color::Red
    };
    let _ = writeln!(
        out,
        "{} {} total, {} passed, {} failed, {} errored",
        "Summary:".bold(),
        summary.total,
        summary.passed.to_string().green(),
        summary.failed.to_string().color(if summary.failed > 0 {
            Color::Red
        } else {
            Color::White
        }),
        summary.errored.to_string().color(if summary.errored > 0 {
            Color::Yellow
        } else {
            Color::White
        }),
    );
    let verdict = if report.success() { "PASSED" } else { "FAILED" };
    let _ = writeln!(out, "{}", verdict.color(color).bold());
    out
}

fn write_result(out: &mut String, result: &ScenarioResult) {
    let (label, color) = match result.outcome {
        Outcome::Pass => ("PASS", Color::Green),
        Outcome::Fail => ("FAIL", Color::Red),
        Outcome::Error => ("ERROR", Color::Yellow),
    };

    let request = result
        .request
        .as_ref()
        .map(|request| format!("{} {}", request.method.bold(), request.url.cyan()))
        .unwrap_or_default();
    let status = result
        .status
        .map(|status| format!(" {}", status.to_string().color(status_color(status))))
        .unwrap_or_default();

    let _ = writeln!(
        out,
        "  {} {} {}{} {}",
        label.color(color).bold(),
        result.scenario_id,
        request,
        status,
        format!("({:.1} ms)", result.duration_ms).dimmed()
    );

    if let Some(description) = &result.description {
        let _ = writeln!(out, "      {}", description.dimmed());
    }
    for failure in &result.failed_assertions {
        let _ = writeln!(out, "      {} {}", "✗".red(), failure);
    }
    if let Some(error) = &result.error {
        let _ = writeln!(out, "      {} {}", "Cause:".bold(), error);
    }
    if result.outcome != Outcome::Pass {
        if let Some(preview) = &result.response_preview {
            let _ = writeln!(out, "      {} {}", "Body:".bold(), preview.dimmed());
        }
    }
    if let Some(path) = &result.exchange_path {
        let _ = writeln!(out, "      {} {}", "Saved:".bold(), format_file_link(path));
    }
}

fn status_color(status: u16) -> Color {
    if status >= 400 {
        Color::Red
    } else if status >= 300 {
        Color::Yellow
    } else {
        Color::Green
    }
}

fn format_file_link(path: &Path) -> String {
    let display = path.to_string_lossy();
    match Url::from_file_path(path) {
        Ok(url) => format!("\x1b]8;;{}\x1b\\{}\x1b]8;;\x1b\\", url, display.cyan()),
        Err(_) => display.cyan().to_string(),
    }
}
