//! Plain-text reports.
//!
//! Layout is fixed-width and every cut is a hard character cutoff, so the
//! same results always render to the same bytes.

use crate::types::{
    ClassificationSummary, PortProbeResult, PortRange, Target, VerbProbeResult,
};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::OffsetDateTime;

const METHOD_W: usize = 8;
const STATUS_W: usize = 6;
const REASON_W: usize = 25;
const ALLOW_W: usize = 30;
const LOCATION_W: usize = 40;
const BODY_LEN_W: usize = 8;
const TABLE_RULE_W: usize = 130;
const DETAIL_RULE_W: usize = 80;

const PORT_W: usize = 6;
const STATE_W: usize = 6;

/// Report for one HTTP verb probe run.
#[derive(Debug, Clone)]
pub struct HttpReport<'a> {
    pub target: &'a Target,
    pub generated_at: OffsetDateTime,
    pub results: &'a [VerbProbeResult],
    pub summary: &'a ClassificationSummary,
    pub body_preview_chars: usize,
}

/// Report for one completed port scan.
#[derive(Debug, Clone)]
pub struct ScanReport<'a> {
    pub target: &'a Target,
    pub range: PortRange,
    pub generated_at: OffsetDateTime,
    pub results: &'a [PortProbeResult],
}

impl HttpReport<'_> {
    pub fn file_name(&self) -> String {
        format!(
            "results_{}_{}_{}.txt",
            sanitize_host(&self.target.host),
            self.target.port.unwrap_or_default(),
            file_stamp(self.generated_at)
        )
    }
}

impl ScanReport<'_> {
    pub fn file_name(&self) -> String {
        format!(
            "scan_{}_{}-{}_{}.txt",
            sanitize_host(&self.target.host),
            self.range.start,
            self.range.end,
            file_stamp(self.generated_at)
        )
    }
}

impl fmt::Display for HttpReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.target;
        writeln!(f, "HTTP Verb Probe Report")?;
        writeln!(f, "======================\n")?;
        match t.port {
            Some(port) => writeln!(f, "Target: {}:{port}", t.host)?,
            None => writeln!(f, "Target: {}", t.host)?,
        }
        writeln!(f, "Path:   {}", t.path)?;
        writeln!(f, "Time:   {}\n", display_stamp(self.generated_at))?;

        if self.summary.allow_union.is_empty() {
            writeln!(f, "Allow (observed): (not present)")?;
        } else {
            let allow: Vec<&str> = self.summary.allow_union.iter().map(String::as_str).collect();
            writeln!(f, "Allow (observed): {}", allow.join(", "))?;
        }
        if self.summary.supported_verbs.is_empty() {
            writeln!(f, "Supported (heuristic): (none)\n")?;
        } else {
            let verbs: Vec<&str> = self.summary.supported_verbs.iter().map(|m| m.as_str()).collect();
            writeln!(f, "Supported (heuristic): {}\n", verbs.join(", "))?;
        }

        writeln!(f, "Summary Table")?;
        writeln!(f, "-------------")?;
        writeln!(
            f,
            "{:<METHOD_W$} {:<STATUS_W$} {:<REASON_W$} {:<ALLOW_W$} {:<LOCATION_W$} {:<BODY_LEN_W$}",
            "METHOD", "STATUS", "REASON", "ALLOW", "LOCATION", "BODY_LEN"
        )?;
        writeln!(f, "{}", "-".repeat(TABLE_RULE_W))?;
        for r in self.results {
            match r {
                VerbProbeResult::Failure { method, error } => writeln!(
                    f,
                    "{:<METHOD_W$} {:<STATUS_W$} {:<REASON_W$} {:<ALLOW_W$} {:<LOCATION_W$} {:<BODY_LEN_W$}",
                    method.as_str(),
                    "ERR",
                    cut(error, REASON_W),
                    "",
                    "",
                    ""
                )?,
                VerbProbeResult::Success {
                    method,
                    status,
                    reason,
                    headers,
                    body_len,
                    ..
                } => writeln!(
                    f,
                    "{:<METHOD_W$} {:<STATUS_W$} {:<REASON_W$} {:<ALLOW_W$} {:<LOCATION_W$} {:<BODY_LEN_W$}",
                    method.as_str(),
                    status,
                    cut(reason, REASON_W),
                    cut(headers.get("Allow").unwrap_or_default(), ALLOW_W),
                    cut(headers.get("Location").unwrap_or_default(), LOCATION_W),
                    body_len
                )?,
            }
        }

        writeln!(f, "\n\nDetailed Results")?;
        writeln!(f, "----------------")?;
        for r in self.results {
            writeln!(f, "\n{}", "=".repeat(DETAIL_RULE_W))?;
            writeln!(f, "{} {}", r.method(), t.path)?;
            match r {
                VerbProbeResult::Failure { error, .. } => writeln!(f, "ERROR: {error}")?,
                VerbProbeResult::Success {
                    status,
                    reason,
                    http_version,
                    headers,
                    body_len,
                    body_preview,
                    ..
                } => {
                    writeln!(f, "HTTP/{http_version} {status} {reason}\n")?;
                    writeln!(f, "Headers:")?;
                    for (k, v) in headers.iter() {
                        writeln!(f, "  {k}: {v}")?;
                    }
                    writeln!(f, "\nBody length: {body_len} bytes")?;
                    if body_preview.is_empty() {
                        writeln!(f, "Body preview: (empty)")?;
                    } else {
                        writeln!(f, "Body preview (first {} chars):", self.body_preview_chars)?;
                        writeln!(f, "{body_preview}")?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for ScanReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.target;
        let open = crate::types::open_ports(self.results);

        writeln!(f, "Port Scan Report")?;
        writeln!(f, "================\n")?;
        writeln!(f, "Target: {} ({})", t.host, t.resolved_address)?;
        writeln!(f, "Ports:  {}", self.range)?;
        writeln!(f, "Time:   {}\n", display_stamp(self.generated_at))?;

        writeln!(
            f,
            "Open ports: {} of {} scanned",
            open.len(),
            self.results.len()
        )?;
        if open.is_empty() {
            writeln!(f, "Open list:  (none)\n")?;
        } else {
            let list: Vec<String> = open.iter().map(u16::to_string).collect();
            writeln!(f, "Open list:  {}\n", list.join(", "))?;
        }

        writeln!(f, "Summary Table")?;
        writeln!(f, "-------------")?;
        writeln!(f, "{:<PORT_W$} {:<STATE_W$}", "PORT", "STATE")?;
        writeln!(f, "{}", "-".repeat(PORT_W + 1 + STATE_W))?;
        for r in self.results {
            let state = if r.open { "OPEN" } else { "CLOSED" };
            writeln!(f, "{:<PORT_W$} {:<STATE_W$}", r.port, state)?;
        }
        Ok(())
    }
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_host(host: &str) -> String {
    host.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Write `contents` to `dir/name` and return the absolute path.
pub fn write_report(dir: &Path, name: &str, contents: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(name);
    fs::write(&path, contents)?;
    Ok(fs::canonicalize(&path).unwrap_or(path))
}

/// Local time when the offset is known, UTC otherwise.
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

fn file_stamp(at: OffsetDateTime) -> String {
    at.format(format_description!(
        "[year][month][day]_[hour][minute][second]"
    ))
    .unwrap_or_else(|_| String::from("19700101_000000"))
}

fn display_stamp(at: OffsetDateTime) -> String {
    at.format(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ))
    .unwrap_or_else(|_| String::from("1970-01-01 00:00:00"))
}

fn cut(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
