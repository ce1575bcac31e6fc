//! Comparing two coverage results.
//!
//! Files of the current result are paired with files of the baseline via
//! the [`PathReconciler`], so reports produced on different machines (or
//! by different tools) still line up.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::fuzzy::{MatchKind, PathReconciler, Resolution};
use crate::model::Coverage;

/// Per-file change between two results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FileDelta {
    Changed {
        current: Option<f64>,
        baseline: Option<f64>,
        /// `None` when either side has nothing to measure.
        delta: Option<f64>,
    },
    Added {
        current: Option<f64>,
    },
    Removed {
        baseline: Option<f64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileDiff {
    /// Current path for changed/added files, baseline path for removed ones.
    pub file: String,
    #[serde(flatten)]
    pub delta: FileDelta,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageDiff {
    pub current: Option<f64>,
    pub baseline: Option<f64>,
    /// Aggregate percentage delta (current − baseline).
    pub percent: Option<f64>,
    pub files: Vec<FileDiff>,
}

impl CoverageDiff {
    /// Changed files whose percentage went down.
    pub fn regressions(&self) -> impl Iterator<Item = &FileDiff> {
        self.files.iter().filter(|f| {
            matches!(f.delta, FileDelta::Changed { delta: Some(d), .. } if d < 0.0)
        })
    }

    pub fn added(&self) -> impl Iterator<Item = &FileDiff> {
        self.files
            .iter()
            .filter(|f| matches!(f.delta, FileDelta::Added { .. }))
    }

    pub fn removed(&self) -> impl Iterator<Item = &FileDiff> {
        self.files
            .iter()
            .filter(|f| matches!(f.delta, FileDelta::Removed { .. }))
    }
}

/// Subtract two optional percentages.
#[must_use]
pub fn delta(current: Option<f64>, baseline: Option<f64>) -> Option<f64> {
    Some(current? - baseline?)
}

/// Rank of a match; higher wins a contested baseline file.
fn rank(how: MatchKind) -> (u8, usize) {
    match how {
        MatchKind::Exact => (2, 0),
        MatchKind::Normalized => (1, 0),
        MatchKind::Suffix { depth } => (0, depth),
    }
}

/// Compare `current` against `baseline`.
///
/// When several current files claim the same baseline file, the best
/// ranked match (exact, then normalized, then deepest suffix) is paired.
/// If that best rank is shared, none of them is: the claimants are
/// reported as added and the baseline file as removed.
pub fn diff(current: &Coverage, baseline: &Coverage, reconciler: &PathReconciler) -> CoverageDiff {
    let mut claims: HashMap<usize, Vec<(usize, MatchKind)>> = HashMap::new();

    for (ci, file) in current.files.iter().enumerate() {
        let resolved = reconciler.resolve(&file.file, baseline.files.iter().map(|f| f.file.as_str()));
        if let Resolution::Found { index, how } = resolved {
            claims.entry(index).or_default().push((ci, how));
        }
    }

    let mut pairing: Vec<Option<usize>> = vec![None; current.files.len()];
    let mut paired = vec![false; baseline.files.len()];
    for (&bi, claimants) in &claims {
        let Some(best) = claimants.iter().map(|&(_, how)| rank(how)).max() else {
            continue;
        };
        let winners: Vec<usize> = claimants
            .iter()
            .filter(|&&(_, how)| rank(how) == best)
            .map(|&(ci, _)| ci)
            .collect();
        if let [ci] = winners[..] {
            pairing[ci] = Some(bi);
            paired[bi] = true;
        }
        for &(ci, _) in claimants {
            if pairing[ci] != Some(bi) {
                debug!(
                    file = %current.files[ci].file,
                    baseline = %baseline.files[bi].file,
                    "baseline file claimed by a better or equal match"
                );
            }
        }
    }

    let mut files = Vec::with_capacity(current.files.len());

    for (file, matched) in current.files.iter().zip(&pairing) {
        let delta = match matched {
            Some(bi) => {
                let base = &baseline.files[*bi];
                FileDelta::Changed {
                    current: file.percent(),
                    baseline: base.percent(),
                    delta: delta(file.percent(), base.percent()),
                }
            }
            None => FileDelta::Added {
                current: file.percent(),
            },
        };
        files.push(FileDiff {
            file: file.file.clone(),
            delta,
        });
    }

    for (base, _) in baseline.files.iter().zip(&paired).filter(|(_, p)| !**p) {
        files.push(FileDiff {
            file: base.file.clone(),
            delta: FileDelta::Removed {
                baseline: base.percent(),
            },
        });
    }

    CoverageDiff {
        current: current.percent(),
        baseline: baseline.percent(),
        percent: delta(current.percent(), baseline.percent()),
        files,
    }
}
