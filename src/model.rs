//! Uniform in-memory representation of coverage data, independent of any
//! specific format. Decoders produce a `Coverage` through the
//! [`CoverageBuilder`](crate::builder::CoverageBuilder); everything
//! downstream (percentages, diffs, lookups, persistence) reads it.

use serde::{Deserialize, Serialize};

use crate::fuzzy::PathReconciler;

/// Compute a coverage percentage (0.0–100.0).
///
/// Returns `None` when `total` is zero: a file or report without any
/// statements is "not measured", which is different from 0%.
#[must_use]
pub fn percent(covered: u64, total: u64) -> Option<f64> {
    if total == 0 {
        None
    } else {
        Some(100.0 * covered as f64 / total as f64)
    }
}

/// What a coverage total counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageKind {
    /// Instrumented source lines (LCOV, Cobertura, Clover, JaCoCo, SimpleCov).
    Loc,
    /// Statements inside blocks (Go cover profiles).
    Statement,
}

/// A contiguous source range with a statement count and hit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
    pub statements: u64,
    pub hits: u64,
}

impl Block {
    fn spans(&self, line: u32) -> bool {
        self.start_line <= line && line <= self.end_line
    }
}

/// A single instrumented line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub number: u32,
    pub hits: u64,
}

/// Execution state of one source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStatus {
    NotInstrumented,
    Missed,
    Covered(u64),
}

impl LineStatus {
    fn from_hits(hits: u64) -> Self {
        if hits > 0 {
            LineStatus::Covered(hits)
        } else {
            LineStatus::Missed
        }
    }
}

/// Coverage data for a single source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCoverage {
    /// Path exactly as it appeared in the report.
    pub file: String,
    pub total: u64,
    pub covered: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lines: Vec<Line>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Block>,
}

impl FileCoverage {
    pub fn new(file: String) -> Self {
        Self {
            file,
            ..Default::default()
        }
    }

    /// Recompute `total` / `covered` from the line and block detail.
    ///
    /// Overlapping blocks are summed, never deduplicated.
    pub fn recount(&mut self) {
        let mut total = self.lines.len() as u64;
        let mut covered = self.lines.iter().filter(|l| l.hits > 0).count() as u64;
        for block in &self.blocks {
            total += block.statements;
            if block.hits > 0 {
                covered += block.statements;
            }
        }
        self.total = total;
        self.covered = covered;
    }

    #[must_use]
    pub fn percent(&self) -> Option<f64> {
        percent(self.covered, self.total)
    }

    /// Whether line/block detail is still present (see [`Coverage::compact`]).
    #[must_use]
    pub fn has_detail(&self) -> bool {
        !self.lines.is_empty() || !self.blocks.is_empty()
    }

    /// Status of a source line. Lines take precedence; for block-based
    /// files the highest hit count among the spanning blocks is used.
    #[must_use]
    pub fn line_status(&self, number: u32) -> LineStatus {
        if let Ok(idx) = self.lines.binary_search_by_key(&number, |l| l.number) {
            return LineStatus::from_hits(self.lines[idx].hits);
        }
        self.blocks
            .iter()
            .filter(|b| b.statements > 0 && b.spans(number))
            .map(|b| b.hits)
            .max()
            .map_or(LineStatus::NotInstrumented, LineStatus::from_hits)
    }
}

/// The aggregate of one decoded report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    #[serde(rename = "type")]
    pub kind: CoverageKind,
    pub total: u64,
    pub covered: u64,
    pub files: Vec<FileCoverage>,
}

impl Coverage {
    pub fn new(kind: CoverageKind) -> Self {
        Self {
            kind,
            total: 0,
            covered: 0,
            files: Vec::new(),
        }
    }

    #[must_use]
    pub fn percent(&self) -> Option<f64> {
        percent(self.covered, self.total)
    }

    /// Find the file matching `path` using the default reconciler
    /// (no project root).
    #[must_use]
    pub fn find(&self, path: &str) -> Option<&FileCoverage> {
        PathReconciler::new().find(path, &self.files)
    }

    /// Drop line and block detail, keeping per-file and aggregate totals.
    pub fn compact(&mut self) {
        for file in &mut self.files {
            file.lines = Vec::new();
            file.blocks = Vec::new();
        }
    }

    #[must_use]
    pub fn is_compacted(&self) -> bool {
        self.files.iter().all(|f| !f.has_detail())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(start: u32, end: u32, statements: u64, hits: u64) -> Block {
        Block {
            start_line: start,
            start_column: 1,
            end_line: end,
            end_column: 10,
            statements,
            hits,
        }
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(8, 10), Some(80.0));
        assert_eq!(percent(0, 10), Some(0.0));
        assert_eq!(percent(0, 0), None);
    }

    #[test]
    fn test_recount_lines() {
        let mut file = FileCoverage::new("a.rs".to_string());
        file.lines = vec![
            Line { number: 1, hits: 3 },
            Line { number: 2, hits: 0 },
            Line { number: 4, hits: 1 },
        ];
        file.recount();
        assert_eq!(file.total, 3);
        assert_eq!(file.covered, 2);
    }

    #[test]
    fn test_recount_overlapping_blocks_are_summed() {
        let mut file = FileCoverage::new("f.go".to_string());
        file.blocks = vec![block(1, 5, 3, 1), block(3, 8, 2, 0), block(9, 9, 0, 4)];
        file.recount();
        assert_eq!(file.total, 5);
        assert_eq!(file.covered, 3);
    }

    #[test]
    fn test_line_status_three_states() {
        let mut file = FileCoverage::new("a.rs".to_string());
        file.lines = vec![Line { number: 1, hits: 2 }, Line { number: 3, hits: 0 }];
        assert_eq!(file.line_status(1), LineStatus::Covered(2));
        assert_eq!(file.line_status(2), LineStatus::NotInstrumented);
        assert_eq!(file.line_status(3), LineStatus::Missed);
    }

    #[test]
    fn test_line_status_from_blocks() {
        let mut file = FileCoverage::new("f.go".to_string());
        file.blocks = vec![block(1, 4, 2, 0), block(3, 6, 1, 7)];
        assert_eq!(file.line_status(1), LineStatus::Missed);
        assert_eq!(file.line_status(3), LineStatus::Covered(7));
        assert_eq!(file.line_status(7), LineStatus::NotInstrumented);
    }

    #[test]
    fn test_compact_keeps_totals() {
        let mut file = FileCoverage::new("a.rs".to_string());
        file.lines = vec![Line { number: 1, hits: 1 }, Line { number: 2, hits: 0 }];
        file.recount();
        let mut coverage = Coverage {
            kind: CoverageKind::Loc,
            total: 2,
            covered: 1,
            files: vec![file],
        };

        coverage.compact();

        assert!(coverage.is_compacted());
        assert_eq!(coverage.files[0].total, 2);
        assert_eq!(coverage.files[0].covered, 1);
        assert_eq!(coverage.percent(), Some(50.0));
    }
}
