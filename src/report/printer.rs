use std::fmt::Write as _;

use colored::{Color, Colorize};

use crate::model::{RequestResult, RunResult};

fn status_color(status: u16) -> Color {
    if status == 0 || status >= 400 {
        Color::Red
    } else if status >= 300 {
        Color::Yellow
    } else {
        Color::Green
    }
}

fn render_request(out: &mut String, result: &RequestResult) {
    let marker = if result.is_failure() {
        "✗".red()
    } else {
        "✓".green()
    };
    let status = if result.status_code == 0 {
        "---".to_string()
    } else {
        result.status_code.to_string()
    };
    let _ = writeln!(
        out,
        "{} {} {} {} {}",
        marker,
        result.name.bold(),
        result.method.as_str().dimmed(),
        result.url.cyan(),
        format!("{} ({} ms)", status, result.latency_ms).color(status_color(result.status_code))
    );

    if let Some(error) = &result.error {
        let _ = writeln!(out, "    {} {}", format!("[{}]", error.kind).red(), error.message);
    }
    for assertion in &result.assertions {
        let label = if assertion.passed {
            "pass".green()
        } else {
            "fail".red()
        };
        let _ = writeln!(out, "    {} {} {}", label, assertion.name.bold(), assertion.message.dimmed());
    }
    for extract in &result.extracts {
        let label = if extract.success {
            "set ".green()
        } else {
            "miss".yellow()
        };
        let _ = writeln!(out, "    {} {} {}", label, extract.name.bold(), extract.message.dimmed());
    }
    if result.response.truncated {
        let _ = writeln!(
            out,
            "    {}",
            format!("body truncated at {} bytes", result.response.body.len()).yellow()
        );
    }
}

/// Human-readable summary of a run.
pub fn render_pretty(run: &RunResult, run_id: Option<&str>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} {}",
        "Collection:".bold(),
        run.collection_name.cyan(),
        format!("(env {})", run.environment_name).dimmed()
    );

    for result in &run.results {
        render_request(&mut out, result);
    }

    let failures = run.failure_count();
    let elapsed = (run.ended_at - run.started_at).num_milliseconds();
    let summary = format!(
        "{} requests, {} failed, {} ms",
        run.results.len(),
        failures,
        elapsed
    );
    let _ = writeln!(
        out,
        "{} {}",
        "Summary:".bold(),
        if failures > 0 { summary.red() } else { summary.green() }
    );
    if let Some(id) = run_id {
        let _ = writeln!(out, "{} {}", "Saved:".bold(), id.dimmed());
    }
    out
}

pub fn render_json(run: &RunResult, run_id: Option<&str>) -> serde_json::Result<String> {
    let mut value = serde_json::to_value(run)?;
    if let (Some(id), Some(object)) = (run_id, value.as_object_mut()) {
        object.insert("id".to_string(), id.into());
    }
    serde_json::to_string_pretty(&value)
}

pub fn print_run(run: &RunResult, run_id: Option<&str>) {
    print!("{}", render_pretty(run, run_id));
}
