// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plain-text summaries printed after each document.

use std::fmt::Write;
use std::path::Path;

use satzwerk_core::error::{Result, SatzwerkError};
use satzwerk_core::human_errors::humanize_error;
use satzwerk_core::report::{DocumentReport, PageStatus};

/// Per-document summary: counts, problem pages and output paths.
pub fn render_report(report: &DocumentReport) -> String {
    let mut out = String::new();
    let translated_pages = report
        .pages
        .iter()
        .filter(|p| p.status != PageStatus::Untouched)
        .count();

    match report.elapsed() {
        Some(elapsed) => {
            let _ = writeln!(
                out,
                "{} ({:.1}s)",
                report.document.display(),
                elapsed.as_secs_f64()
            );
        }
        None => {
            let _ = writeln!(out, "{}", report.document.display());
        }
    }
    let _ = writeln!(
        out,
        "  pages: {translated_pages} of {} processed",
        report.pages.len()
    );
    let _ = writeln!(
        out,
        "  runs:  {} of {} translated, {} failed",
        report.runs_translated(),
        report.runs_total(),
        report.failed_runs()
    );

    for page in report.problem_pages() {
        let note = match &page.status {
            PageStatus::Degraded { reason } => format!("layout unavailable ({reason})"),
            PageStatus::Skipped { reason } => format!("copied unchanged ({reason})"),
            _ => format!("{} run(s) kept their original text", page.failures.len()),
        };
        let _ = writeln!(out, "  page {}: {note}", page.page);
        for failure in &page.failures {
            let _ = writeln!(out, "    \"{}\": {}", failure.excerpt, failure.error);
        }
    }

    for (label, path) in [
        ("mono", &report.mono_output),
        ("dual", &report.bilingual_output),
    ] {
        if let Some(path) = path {
            let _ = writeln!(out, "  {label}:  {}", path.display());
        }
    }
    out
}

/// Write every report as one pretty-printed JSON array.
pub fn write_json(path: &Path, reports: &[DocumentReport]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(reports)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Human-facing description of an error that stopped a document or the run.
pub fn render_error(context: &str, err: &SatzwerkError) -> String {
    let human = humanize_error(err);
    let mut out = format!("{context}: {}\n  {}\n", human.message, human.suggestion);
    if human.retriable {
        out.push_str("  (this may succeed if you run it again)\n");
    }
    let _ = writeln!(out, "  detail: {err}");
    out
}
