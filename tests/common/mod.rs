#![allow(dead_code)]

use std::path::{Path, PathBuf};

use covgate::model::{Coverage, CoverageKind, FileCoverage, Line};
use tempfile::TempDir;

/// Write `content` to `name` inside a fresh temporary directory.
/// The caller must hold onto `TempDir` to keep the temp directory alive.
pub fn write_temp(name: &str, content: &[u8]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    write_file(&path, content);
    (dir, path)
}

/// Write a file, creating parent directories.
pub fn write_file(path: &Path, content: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

/// A line-based file with `covered` of `total` lines hit.
pub fn file(path: &str, covered: u32, total: u32) -> FileCoverage {
    let mut file = FileCoverage::new(path.to_string());
    file.lines = (1..=total)
        .map(|number| Line {
            number,
            hits: u64::from(number <= covered),
        })
        .collect();
    file.recount();
    file
}

/// A coverage result whose totals are summed from `files`.
pub fn coverage(files: Vec<FileCoverage>) -> Coverage {
    let mut coverage = Coverage::new(CoverageKind::Loc);
    coverage.total = files.iter().map(|f| f.total).sum();
    coverage.covered = files.iter().map(|f| f.covered).sum();
    coverage.files = files;
    coverage
}

pub fn assert_consistent(coverage: &Coverage) {
    assert!(coverage.covered <= coverage.total);
    for f in &coverage.files {
        assert!(f.covered <= f.total, "{}: {}/{}", f.file, f.covered, f.total);
    }
    assert_eq!(coverage.total, coverage.files.iter().map(|f| f.total).sum::<u64>());
    assert_eq!(coverage.covered, coverage.files.iter().map(|f| f.covered).sum::<u64>());
}
