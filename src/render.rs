//! Human-readable output for measured reports and comparisons.

use std::collections::BTreeSet;
use std::fmt::Write;
use std::time::Duration;

use crate::diff::FileDelta;
use crate::model::{FileCoverage, LineStatus};
use crate::report::{Report, ReportDiff};

/// Result of one acceptability expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub expression: String,
    pub passed: bool,
}

/// Everything a formatter renders.
pub struct Summary<'a> {
    pub report: &'a Report,
    pub diff: Option<&'a ReportDiff>,
    pub checks: &'a [Check],
}

impl Summary<'_> {
    #[must_use]
    pub fn format(&self, formatter: &dyn ReportFormatter) -> String {
        formatter.format(self)
    }

    fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }
}

pub trait ReportFormatter {
    fn format(&self, summary: &Summary<'_>) -> String;
}

/// Plain text formatter.
pub struct TextFormatter;

impl ReportFormatter for TextFormatter {
    fn format(&self, summary: &Summary<'_>) -> String {
        let mut out = String::new();
        let report = summary.report;
        let diff = summary.diff;

        if report.count_measured() == 0 {
            out.push_str("Nothing measured.\n");
        }

        if let Some(coverage) = &report.coverage {
            let covered = coverage.covered;
            let total = coverage.total;
            let pct = format_percent(coverage.percent());
            let delta = signed(diff.and_then(|d| d.coverage.as_ref()).and_then(|c| c.percent), "%");
            writeln!(out, "Coverage:             {pct} ({covered}/{total}){delta}").unwrap();
        }
        if let Some(ratio) = report.code_to_test_ratio() {
            let delta = signed(diff.and_then(|d| d.code_to_test_ratio), "");
            writeln!(out, "Code to test ratio:   1:{ratio:.1}{delta}").unwrap();
        }
        if let Some(time) = report.test_execution_time {
            let time = format_duration(time);
            let delta = signed(diff.and_then(|d| d.test_execution_time), "s");
            writeln!(out, "Test execution time:  {time}{delta}").unwrap();
        }

        if let Some(coverage) = &report.coverage {
            let mut files_with_misses: Vec<&FileCoverage> = coverage
                .files
                .iter()
                .filter(|f| f.covered < f.total)
                .collect();
            files_with_misses.sort_by(|a, b| {
                let (a, b) = (a.percent().unwrap_or(0.0), b.percent().unwrap_or(0.0));
                a.total_cmp(&b)
            });
            if !files_with_misses.is_empty() {
                out.push('\n');
                for f in &files_with_misses {
                    let path = &f.file;
                    let (covered, total) = (f.covered, f.total);
                    let pct = format_percent(f.percent());
                    write!(out, "  {path}  {covered}/{total} ({pct})").unwrap();
                    if f.has_detail() {
                        let (missed, instrumented) = missed_lines(f);
                        let missed = format_line_ranges(&missed, &instrumented);
                        write!(out, "  missed: {missed}").unwrap();
                    }
                    out.push('\n');
                }
            }
        }

        if let Some(cov) = diff.and_then(|d| d.coverage.as_ref()) {
            let regressions: Vec<_> = cov.regressions().collect();
            if !regressions.is_empty() {
                out.push_str("\nRegressions:\n");
                for f in regressions {
                    if let FileDelta::Changed {
                        delta: Some(delta), ..
                    } = f.delta
                    {
                        writeln!(out, "  {}  {delta:+.1}%", f.file).unwrap();
                    }
                }
            }
        }

        if !summary.checks.is_empty() {
            out.push('\n');
            for check in summary.checks {
                let mark = if check.passed { "✓" } else { "✗" };
                writeln!(out, "{mark} {}", check.expression).unwrap();
            }
            let verdict = if summary.passed() {
                "acceptable"
            } else {
                "NOT acceptable"
            };
            writeln!(out, "Result: {verdict}").unwrap();
        }

        out
    }
}

/// Markdown formatter.
pub struct MarkdownFormatter;

impl ReportFormatter for MarkdownFormatter {
    fn format(&self, summary: &Summary<'_>) -> String {
        let mut md = String::new();
        let report = summary.report;
        let diff = summary.diff;

        md.push_str("| Metric | Value | Diff |\n");
        md.push_str("|:-------|------:|-----:|\n");
        if let Some(coverage) = &report.coverage {
            let pct = format_percent(coverage.percent());
            let delta = signed(diff.and_then(|d| d.coverage.as_ref()).and_then(|c| c.percent), "%");
            writeln!(md, "| Coverage | {pct} |{delta} |").unwrap();
        }
        if let Some(ratio) = report.code_to_test_ratio() {
            let delta = signed(diff.and_then(|d| d.code_to_test_ratio), "");
            writeln!(md, "| Code to test ratio | 1:{ratio:.1} |{delta} |").unwrap();
        }
        if let Some(time) = report.test_execution_time {
            let time = format_duration(time);
            let delta = signed(diff.and_then(|d| d.test_execution_time), "s");
            writeln!(md, "| Test execution time | {time} |{delta} |").unwrap();
        }

        if let Some(cov) = diff.and_then(|d| d.coverage.as_ref()) {
            let changed: Vec<_> = cov
                .files
                .iter()
                .filter(|f| !matches!(f.delta, FileDelta::Changed { delta: Some(d), .. } if d == 0.0))
                .collect();
            if !changed.is_empty() {
                md.push_str("\n<details>\n<summary>Changed files</summary>\n\n");
                md.push_str("| File | Coverage | Diff |\n");
                md.push_str("|:-----|---------:|-----:|\n");
                for f in changed {
                    let path = &f.file;
                    let (value, delta) = match f.delta {
                        FileDelta::Changed { current, delta, .. } => {
                            (format_percent(current), signed(delta, "%"))
                        }
                        FileDelta::Added { current } => (format_percent(current), " new".to_string()),
                        FileDelta::Removed { .. } => ("-".to_string(), " removed".to_string()),
                    };
                    writeln!(md, "| `{path}` | {value} |{delta} |").unwrap();
                }
                md.push_str("\n</details>\n");
            }
        }

        if !summary.checks.is_empty() {
            md.push('\n');
            for check in summary.checks {
                let mark = if check.passed { ":white_check_mark:" } else { ":x:" };
                writeln!(md, "- {mark} `{}`", check.expression).unwrap();
            }
        }

        md
    }
}

/// `80.0%`, or `-` when undefined.
pub fn format_percent(pct: Option<f64>) -> String {
    pct.map_or_else(|| "-".to_string(), |p| format!("{p:.1}%"))
}

/// ` [+1.2%]`, or an empty string when there is nothing to compare.
fn signed(delta: Option<f64>, unit: &str) -> String {
    delta.map_or_else(String::new, |d| format!(" [{d:+.1}{unit}]"))
}

/// `1m15s`, `1.5s`, `250ms`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 {
        let (m, s) = (secs / 60, secs % 60);
        if m >= 60 {
            format!("{}h{}m{s}s", m / 60, m % 60)
        } else {
            format!("{m}m{s}s")
        }
    } else if secs >= 1 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}ms", d.as_millis())
    }
}

/// Missed and instrumented line numbers of a file, both sorted.
pub fn missed_lines(file: &FileCoverage) -> (Vec<u32>, Vec<u32>) {
    let mut instrumented: BTreeSet<u32> = file.lines.iter().map(|l| l.number).collect();
    for block in file.blocks.iter().filter(|b| b.statements > 0) {
        instrumented.extend(block.start_line..=block.end_line);
    }
    let missed = instrumented
        .iter()
        .copied()
        .filter(|&n| file.line_status(n) == LineStatus::Missed)
        .collect();
    (missed, instrumented.into_iter().collect())
}

/// Maximum number of consecutive non-instrumented lines that can be bridged
/// when coalescing missed ranges.
const MAX_BRIDGE_GAP: u32 = 2;

/// Coalesce sorted line numbers into `(start, end)` ranges, bridging small
/// gaps where every line in the gap is non-instrumented.
///
/// Both `lines` and `instrumented` must be sorted and deduplicated.
#[must_use]
pub fn coalesce_ranges(lines: &[u32], instrumented: &[u32]) -> Vec<(u32, u32)> {
    let Some((&first, rest)) = lines.split_first() else {
        return Vec::new();
    };

    let mut ranges: Vec<(u32, u32)> = Vec::new();
    let (mut start, mut end) = (first, first);

    for &line in rest {
        let gap = line - end - 1;
        if gap <= MAX_BRIDGE_GAP && (end + 1..line).all(|l| instrumented.binary_search(&l).is_err())
        {
            end = line;
        } else {
            ranges.push((start, end));
            start = line;
            end = line;
        }
    }

    ranges.push((start, end));
    ranges
}

/// Format line numbers into compact range notation, e.g. "1, 3-5, 8".
#[must_use]
pub fn format_line_ranges(lines: &[u32], instrumented: &[u32]) -> String {
    coalesce_ranges(lines, instrumented)
        .iter()
        .map(|&(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{start}-{end}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
