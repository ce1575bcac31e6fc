//! Command handler functions for the covgate CLI.
//!
//! Each `cmd_*` function returns its output as a `String`, making them easy
//! to test without capturing stdout.

use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::ValueEnum;

use crate::detect;
use crate::fuzzy::{PathReconciler, Reconciled};
use crate::model::{Coverage, LineStatus};
use crate::parsers::Format;
use crate::ratio::RatioConfig;
use crate::render::{self, Check, MarkdownFormatter, ReportFormatter, Summary, TextFormatter};
use crate::report::Report;
use crate::threshold::{Expression, Metric, Metrics};

/// Output style for `measure`, `diff` and `check`.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum Style {
    #[default]
    Text,
    Markdown,
}

impl Style {
    fn formatter(self) -> &'static dyn ReportFormatter {
        match self {
            Style::Text => &TextFormatter,
            Style::Markdown => &MarkdownFormatter,
        }
    }
}

/// Acceptability rules as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Acceptable {
    /// Fully qualified expressions, e.g. `current.coverage >= 80%`.
    pub expressions: Vec<String>,
    /// Per-metric shorthand, e.g. `80%` or `diff >= -1`.
    pub coverage: Option<String>,
    pub ratio: Option<String>,
    pub time: Option<String>,
}

impl Acceptable {
    /// Compile every rule, labelled the way it is displayed.
    pub fn compile(&self) -> Result<Vec<(String, Expression)>> {
        let mut compiled = Vec::new();
        for src in &self.expressions {
            let expr = Expression::compile(src).with_context(|| format!("in '{src}'"))?;
            compiled.push((src.clone(), expr));
        }
        let per_metric = [
            (Metric::Coverage, &self.coverage),
            (Metric::Ratio, &self.ratio),
            (Metric::Time, &self.time),
        ];
        for (metric, src) in per_metric {
            if let Some(src) = src {
                let expr = Expression::compile_for(metric, src)
                    .with_context(|| format!("in {} rule '{src}'", metric.as_str()))?;
                compiled.push((format!("{}: {src}", metric.as_str()), expr));
            }
        }
        Ok(compiled)
    }
}

/// Output of a command that can reject the measured result.
#[derive(Debug)]
pub struct Outcome {
    pub output: String,
    pub passed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MeasureOptions {
    /// Coverage report file, or a project root holding one at a default
    /// location.
    pub coverage: Option<PathBuf>,
    pub format: Option<Format>,
    /// Project root walked for the code-to-test ratio.
    pub root: PathBuf,
    pub ratio: Option<RatioConfig>,
    pub test_execution_time: Option<Duration>,
    pub reconciler: PathReconciler,
    pub baseline: Option<PathBuf>,
    pub acceptable: Acceptable,
    /// Where to save the measured report.
    pub out: Option<PathBuf>,
    pub compact: bool,
    pub style: Style,
}

pub fn cmd_measure(opts: &MeasureOptions) -> Result<Outcome> {
    let rules = opts.acceptable.compile()?;

    let mut report = Report::new();
    if let Some(path) = &opts.coverage {
        report
            .measure_coverage(path, opts.format)
            .with_context(|| format!("Failed to read coverage from {}", path.display()))?;
    }
    if let Some(config) = &opts.ratio {
        report
            .measure_code_to_test_ratio(&opts.root, config)
            .with_context(|| format!("Failed to measure code to test ratio in {}", opts.root.display()))?;
    }
    if let Some(time) = opts.test_execution_time {
        report.set_test_execution_time(time);
    }
    if report.count_measured() == 0 {
        bail!("Nothing to measure: give a coverage report, ratio patterns or a test execution time");
    }

    let baseline = opts.baseline.as_deref().map(load_report).transpose()?;

    if let Some(out) = &opts.out {
        let mut saved = report.clone();
        if opts.compact {
            saved.compact();
        }
        saved
            .save(out)
            .with_context(|| format!("Failed to save report to {}", out.display()))?;
    }

    summarize(&report, baseline.as_ref(), &opts.reconciler, &rules, opts.style)
}

/// Compare two saved reports.
pub fn cmd_diff(
    current: &Path,
    baseline: &Path,
    reconciler: &PathReconciler,
    style: Style,
) -> Result<String> {
    let current = load_report(current)?;
    let baseline = load_report(baseline)?;
    let outcome = summarize(&current, Some(&baseline), reconciler, &[], style)?;
    Ok(outcome.output)
}

/// Evaluate acceptability rules against a saved report.
pub fn cmd_check(
    report: &Path,
    baseline: Option<&Path>,
    reconciler: &PathReconciler,
    acceptable: &Acceptable,
    style: Style,
) -> Result<Outcome> {
    let rules = acceptable.compile()?;
    if rules.is_empty() {
        bail!("No acceptability rules given");
    }
    let report = load_report(report)?;
    let baseline = baseline.map(load_report).transpose()?;
    summarize(&report, baseline.as_ref(), reconciler, &rules, style)
}

fn load_report(path: &Path) -> Result<Report> {
    Report::load(path).with_context(|| format!("Failed to load report {}", path.display()))
}

fn summarize(
    report: &Report,
    baseline: Option<&Report>,
    reconciler: &PathReconciler,
    rules: &[(String, Expression)],
    style: Style,
) -> Result<Outcome> {
    let diff = baseline.map(|b| report.compare(b, reconciler));
    let metrics = Metrics::from_reports(report, baseline);

    let mut checks = Vec::with_capacity(rules.len());
    for (label, expr) in rules {
        let passed = expr
            .evaluate(&metrics)
            .with_context(|| format!("Failed to evaluate '{label}'"))?;
        checks.push(Check {
            expression: label.clone(),
            passed,
        });
    }

    let summary = Summary {
        report,
        diff: diff.as_ref(),
        checks: &checks,
    };
    Ok(Outcome {
        output: summary.format(style.formatter()),
        passed: checks.iter().all(|c| c.passed),
    })
}

fn load_coverage(input: &Path, format: Option<Format>) -> Result<Coverage> {
    let (_, coverage) = detect::sniff_path(input, format)
        .with_context(|| format!("Failed to read coverage from {}", input.display()))?;
    Ok(coverage)
}

pub fn cmd_files(input: &Path, format: Option<Format>, sort_by_coverage: bool) -> Result<String> {
    let coverage = load_coverage(input, format)?;
    let mut files: Vec<_> = coverage.files.iter().collect();

    if sort_by_coverage {
        // unmeasured files last
        files.sort_by(|a, b| {
            let (a, b) = (a.percent().unwrap_or(f64::MAX), b.percent().unwrap_or(f64::MAX));
            a.total_cmp(&b)
        });
    }

    let mut out = String::new();
    writeln!(
        out,
        "{:<60} {:>8} {:>8} {:>8}",
        "FILE", "TOTAL", "COVERED", "RATE"
    )
    .unwrap();
    writeln!(out, "{}", "-".repeat(88)).unwrap();

    for f in &files {
        let rate = render::format_percent(f.percent());
        writeln!(
            out,
            "{:<60} {:>8} {:>8} {:>8}",
            f.file, f.total, f.covered, rate
        )
        .unwrap();
    }
    writeln!(out, "{}", "-".repeat(88)).unwrap();
    let rate = render::format_percent(coverage.percent());
    writeln!(
        out,
        "{:<60} {:>8} {:>8} {:>8}",
        "TOTAL", coverage.total, coverage.covered, rate
    )
    .unwrap();

    Ok(out)
}

/// Line-level coverage of one source file.
///
/// `source_file` is reconciled against the report's paths, so a
/// project-relative path finds an absolute report entry. When the source
/// is readable below `root` it is annotated line by line.
pub fn cmd_lines(
    input: &Path,
    format: Option<Format>,
    source_file: &str,
    reconciler: &PathReconciler,
    uncovered: bool,
) -> Result<String> {
    let coverage = load_coverage(input, format)?;
    let file = match reconciler.reconcile(source_file, &coverage.files) {
        Reconciled::Found { file, .. } => file,
        Reconciled::Ambiguous(candidates) => {
            let names: Vec<_> = candidates.iter().map(|f| f.file.as_str()).collect();
            bail!("'{source_file}' is ambiguous: {}", names.join(", "));
        }
        Reconciled::NotFound => bail!("No coverage data for '{source_file}'"),
    };
    if !file.has_detail() {
        bail!("Report has no line detail for '{}'", file.file);
    }

    let (missed, instrumented) = render::missed_lines(file);

    if uncovered {
        if missed.is_empty() {
            return Ok(format!(
                "All instrumentable lines are covered in '{}'\n",
                file.file
            ));
        }

        let mut out = String::new();
        writeln!(out, "Uncovered lines in '{}':", file.file).unwrap();
        writeln!(out, "  {}", render::format_line_ranges(&missed, &instrumented)).unwrap();
        writeln!(out, "  ({} lines)", missed.len()).unwrap();
        return Ok(out);
    }

    let source_path = match reconciler.root() {
        Some(root) => Path::new(root).join(source_file),
        None => PathBuf::from(source_file),
    };
    let mut out = String::new();
    match std::fs::read_to_string(&source_path) {
        Ok(source) => {
            for (idx, text) in source.lines().enumerate() {
                let number = u32::try_from(idx + 1)?;
                let (hits, marker) = match file.line_status(number) {
                    LineStatus::NotInstrumented => (String::new(), " "),
                    LineStatus::Missed => ("0".to_string(), "✗"),
                    LineStatus::Covered(hits) => (hits.to_string(), "✓"),
                };
                writeln!(out, "{number:>6} {hits:>8} {marker} {text}").unwrap();
            }
        }
        Err(_) => {
            writeln!(out, "{:>6}  {:>10}", "LINE", "HITS").unwrap();
            writeln!(out, "{}", "-".repeat(18)).unwrap();
            for number in instrumented {
                match file.line_status(number) {
                    LineStatus::Covered(hits) => {
                        writeln!(out, "{number:>6}  {hits:>10}  ✓").unwrap();
                    }
                    _ => writeln!(out, "{number:>6}  {:>10}  ✗", 0).unwrap(),
                }
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LCOV: &str = "\
SF:/build/src/main.rs
DA:1,5
DA:2,3
DA:3,0
DA:4,0
end_of_record
SF:/build/src/lib.rs
DA:1,10
DA:2,10
end_of_record
";

    fn write_lcov(dir: &Path) -> PathBuf {
        let path = dir.join("lcov.info");
        std::fs::write(&path, LCOV).unwrap();
        path
    }

    #[test]
    fn test_cmd_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_lcov(dir.path());

        let out = cmd_files(&input, None, true).unwrap();

        assert!(out.contains("/build/src/main.rs"));
        assert!(out.contains("100.0%"));
        assert!(out.contains("50.0%"));
        assert!(out.contains("66.7%"));
        let main_pos = out.find("src/main.rs").unwrap();
        let lib_pos = out.find("src/lib.rs").unwrap();
        assert!(main_pos < lib_pos);
    }

    #[test]
    fn test_cmd_lines_reconciles_path() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_lcov(dir.path());

        let out = cmd_lines(&input, None, "src/main.rs", &PathReconciler::new(), false).unwrap();
        assert!(out.contains("LINE"));
        assert!(out.contains("✓"));
        assert!(out.contains("✗"));

        let out = cmd_lines(&input, None, "src/main.rs", &PathReconciler::new(), true).unwrap();
        assert!(out.contains("Uncovered lines in '/build/src/main.rs':"));
        assert!(out.contains("3-4"));
        assert!(out.contains("(2 lines)"));

        let out = cmd_lines(&input, None, "src/lib.rs", &PathReconciler::new(), true).unwrap();
        assert!(out.contains("All instrumentable lines are covered"));

        assert!(cmd_lines(&input, None, "nope.rs", &PathReconciler::new(), false).is_err());
    }

    #[test]
    fn test_cmd_lines_annotates_source() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_lcov(dir.path());
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(
            dir.path().join("src/lib.rs"),
            "pub fn a() {}\npub fn b() {}\n// end\n",
        )
        .unwrap();
        let reconciler = PathReconciler::with_root(dir.path().to_string_lossy());

        let out = cmd_lines(&input, None, "src/lib.rs", &reconciler, false).unwrap();

        assert!(out.contains("     1       10 ✓ pub fn a() {}"));
        assert!(out.contains("     3            // end"));
    }

    #[test]
    fn test_cmd_measure_and_check() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_lcov(dir.path());
        let out = dir.path().join("reports/current.json");

        let opts = MeasureOptions {
            coverage: Some(input),
            out: Some(out.clone()),
            compact: true,
            acceptable: Acceptable {
                coverage: Some("60%".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let outcome = cmd_measure(&opts).unwrap();
        assert!(outcome.passed);
        assert!(outcome.output.contains("66.7% (4/6)"));
        assert!(outcome.output.contains("✓ coverage: 60%"));

        let saved = Report::load(&out).unwrap();
        assert!(saved.coverage.unwrap().is_compacted());

        let strict = Acceptable {
            expressions: vec!["current.coverage >= 70".to_string()],
            ..Default::default()
        };
        let outcome = cmd_check(&out, None, &PathReconciler::new(), &strict, Style::Text).unwrap();
        assert!(!outcome.passed);
        assert!(outcome.output.contains("Result: NOT acceptable"));
    }

    #[test]
    fn test_cmd_check_pairs_files_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let save = |name: &str, lcov: &str| {
            let input = dir.path().join(format!("{name}.info"));
            std::fs::write(&input, lcov).unwrap();
            let mut report = Report::new();
            report.measure_coverage(&input, Some(Format::Lcov)).unwrap();
            let path = dir.path().join(format!("{name}.json"));
            report.save(&path).unwrap();
            path
        };
        let current = save("current", "SF:src/main.rs\nDA:1,1\nDA:2,0\nend_of_record\n");
        let baseline = save(
            "baseline",
            "SF:/proj/src/main.rs\nDA:1,1\nDA:2,1\nend_of_record\n\
             SF:/other/src/main.rs\nDA:1,1\nend_of_record\n",
        );
        let rules = Acceptable {
            coverage: Some("0%".to_string()),
            ..Default::default()
        };

        let out = cmd_check(&current, Some(baseline.as_path()), &PathReconciler::new(), &rules, Style::Text)
            .unwrap();
        assert!(!out.output.contains("Regressions:"));

        let rooted = PathReconciler::with_root("/proj");
        let out = cmd_check(&current, Some(baseline.as_path()), &rooted, &rules, Style::Text).unwrap();
        assert!(out.passed);
        assert!(out.output.contains("Regressions:\n  src/main.rs  -50.0%"));
    }

    #[test]
    fn test_cmd_measure_nothing() {
        let err = cmd_measure(&MeasureOptions::default()).unwrap_err();
        assert!(err.to_string().contains("Nothing to measure"));
    }

    #[test]
    fn test_bad_rule_fails_before_measuring() {
        let opts = MeasureOptions {
            acceptable: Acceptable {
                expressions: vec!["current.coverage >".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };
        let err = cmd_measure(&opts).unwrap_err();
        assert!(err.to_string().contains("current.coverage >"));
    }

    #[test]
    fn test_cmd_diff_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_lcov(dir.path());
        let current = dir.path().join("current.json");
        let baseline = dir.path().join("baseline.json");

        let mut report = Report::new();
        report.measure_coverage(&input, Some(Format::Lcov)).unwrap();
        report.save(&current).unwrap();
        report.set_test_execution_time(Duration::from_secs(2));
        report.coverage.as_mut().unwrap().covered = 3;
        report.save(&baseline).unwrap();

        let out = cmd_diff(&current, &baseline, &PathReconciler::new(), Style::Markdown).unwrap();

        assert!(out.contains("| Metric | Value | Diff |"));
        assert!(out.contains("| Coverage | 66.7% | [+16.7%] |"));
    }
}
