//! Assembles per-file fragments emitted by the decoders into one
//! [`Coverage`] with consistent totals.

use std::collections::HashMap;

use crate::model::{Block, Coverage, CoverageKind, FileCoverage, Line};

/// Collects lines and blocks per file, preserving first-seen file order.
///
/// Fragments for a path that was already seen are merged into the same
/// [`FileCoverage`]: line hits for the same line number are summed, blocks
/// are appended as-is.
#[derive(Debug)]
pub struct CoverageBuilder {
    kind: CoverageKind,
    files: Vec<FileCoverage>,
    index: HashMap<String, usize>,
}

impl CoverageBuilder {
    pub fn new(kind: CoverageKind) -> Self {
        Self {
            kind,
            files: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a file, even if no lines or blocks follow.
    pub fn file(&mut self, path: &str) -> &mut FileCoverage {
        let idx = match self.index.get(path) {
            Some(&idx) => idx,
            None => {
                self.files.push(FileCoverage::new(path.to_string()));
                self.index.insert(path.to_string(), self.files.len() - 1);
                self.files.len() - 1
            }
        };
        &mut self.files[idx]
    }

    pub fn line(&mut self, path: &str, number: u32, hits: u64) {
        self.file(path).lines.push(Line { number, hits });
    }

    pub fn block(&mut self, path: &str, block: Block) {
        self.file(path).blocks.push(block);
    }

    /// Merge a whole fragment (e.g. one Cobertura `<class>`).
    pub fn merge(&mut self, fragment: FileCoverage) {
        let file = self.file(&fragment.file);
        file.lines.extend(fragment.lines);
        file.blocks.extend(fragment.blocks);
    }

    pub fn build(self) -> Coverage {
        let mut coverage = Coverage::new(self.kind);
        for mut file in self.files {
            file.lines = merge_lines(file.lines);
            file.recount();
            coverage.total += file.total;
            coverage.covered += file.covered;
            coverage.files.push(file);
        }
        coverage
    }
}

/// Sort by line number and sum hits of duplicate entries.
fn merge_lines(mut lines: Vec<Line>) -> Vec<Line> {
    lines.sort_by_key(|l| l.number);
    let mut merged: Vec<Line> = Vec::with_capacity(lines.len());
    for line in lines {
        match merged.last_mut() {
            Some(last) if last.number == line.number => {
                last.hits = last.hits.saturating_add(line.hits);
            }
            _ => merged.push(line),
        }
    }
    merged
}
