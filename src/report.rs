use std::fmt::Write as _;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use time::{macros::format_description, OffsetDateTime};

use crate::types::Report;

const HEADERS: [&str; 5] = ["Type", "Protocol", "Port", "Status", "Process"];

/// Current local time, or UTC when the local offset cannot be determined.
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// `YYYYMMDD_HHmmss` for a report file name.
pub fn timestamp(at: OffsetDateTime) -> String {
    at.format(format_description!("[year][month][day]_[hour][minute][second]"))
        .unwrap_or_else(|_| String::from("19700101_000000"))
}

/// `<prefix>_<YYYYMMDD_HHmmss>.<ext>`
pub fn report_file_name(prefix: &str, stamp: &str, ext: &str) -> String {
    let ext = ext.trim_start_matches('.');
    if ext.is_empty() {
        format!("{prefix}_{stamp}")
    } else {
        format!("{prefix}_{stamp}.{ext}")
    }
}

/// Render the report as a fixed-column plain-text table, one row per result.
pub fn render_table(report: &Report) -> String {
    let rows: Vec<[String; 5]> = report
        .entries
        .iter()
        .map(|e| {
            [
                e.probe_type.to_string(),
                e.protocol.to_string(),
                e.port.to_string(),
                e.status.to_string(),
                e.process_label().to_string(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &HEADERS.map(String::from), &widths);
    push_row(&mut out, &widths.map(|w| "-".repeat(w)), &widths);
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, cells: &[String; 5], widths: &[usize; 5]) {
    let _ = writeln!(
        out,
        "{:<tw$}  {:<pw$}  {:>nw$}  {:<sw$}  {}",
        cells[0],
        cells[1],
        cells[2],
        cells[3],
        cells[4],
        tw = widths[0],
        pw = widths[1],
        nw = widths[2],
        sw = widths[3],
    );
}

/// Write the table to `<dir>/<prefix>_<stamp>.<ext>` and return the path written.
pub fn write_report(dir: &Path, prefix: &str, ext: &str, report: &Report) -> Result<PathBuf> {
    let path = dir.join(report_file_name(prefix, &report.generated_at, ext));
    let mut body = format!(
        "Port check against {} at {}\n\n",
        report.remote_host, report.generated_at
    );
    body.push_str(&render_table(report));
    fs::write(&path, body)
        .with_context(|| format!("failed to write report: {}", path.display()))?;
    Ok(path)
}

/// Write results and any extra context as pretty JSON.
pub fn write_results_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create JSON report: {}", path.display()))?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}
