//! Reconciling a path from one source (a project checkout, another report)
//! with the paths stored in a [`Coverage`](crate::model::Coverage).
//!
//! Coverage tools write paths however they like: absolute to the build
//! machine, relative to the module root, with `./` prefixes or Windows
//! separators. Matching is tried in this order:
//!
//!   1. exact string equality
//!   2. equality after normalization (`\` → `/`, `.` dropped, `..`
//!      resolved, leading `/` ignored, relative paths joined to the root
//!      when one is configured)
//!   3. separator-aligned suffix match in either direction, deepest wins
//!
//! Two candidates at the same rank are ambiguous and produce no match.
//! Everything here is string manipulation; the filesystem is never read.

use serde::Deserialize;
use tracing::debug;

use crate::model::FileCoverage;

/// How a path was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Normalized,
    /// Matched on the last `depth` path components.
    Suffix { depth: usize },
}

/// Outcome of a lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled<'a> {
    Found {
        file: &'a FileCoverage,
        how: MatchKind,
    },
    Ambiguous(Vec<&'a FileCoverage>),
    NotFound,
}

impl<'a> Reconciled<'a> {
    #[must_use]
    pub fn file(&self) -> Option<&'a FileCoverage> {
        match self {
            Reconciled::Found { file, .. } => Some(*file),
            _ => None,
        }
    }
}

/// Index-based outcome shared by [`PathReconciler::reconcile`] and the
/// diff engine, which needs to know which slot was claimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Resolution {
    Found { index: usize, how: MatchKind },
    Ambiguous(Vec<usize>),
    NotFound,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PathReconciler {
    /// Project root that relative paths are resolved against.
    #[serde(default)]
    root: Option<String>,
}

impl PathReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<String>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    /// Find the file matching `target`, or `None` when nothing (or more
    /// than one file) matches.
    #[must_use]
    pub fn find<'a>(&self, target: &str, files: &'a [FileCoverage]) -> Option<&'a FileCoverage> {
        self.reconcile(target, files).file()
    }

    pub fn reconcile<'a>(&self, target: &str, files: &'a [FileCoverage]) -> Reconciled<'a> {
        match self.resolve(target, files.iter().map(|f| f.file.as_str())) {
            Resolution::Found { index, how } => Reconciled::Found {
                file: &files[index],
                how,
            },
            Resolution::Ambiguous(indices) => {
                Reconciled::Ambiguous(indices.into_iter().map(|i| &files[i]).collect())
            }
            Resolution::NotFound => Reconciled::NotFound,
        }
    }

    pub(crate) fn resolve<'p>(
        &self,
        target: &str,
        candidates: impl Iterator<Item = &'p str> + Clone,
    ) -> Resolution {
        if let Some(index) = candidates.clone().position(|c| c == target) {
            return Resolution::Found {
                index,
                how: MatchKind::Exact,
            };
        }

        let target_parts = components(target);
        if target_parts.is_empty() {
            return Resolution::NotFound;
        }

        let anchored_target = self.anchor(target, &target_parts);
        let normalized: Vec<usize> = candidates
            .clone()
            .enumerate()
            .filter(|(_, c)| self.anchor(c, &components(c)) == anchored_target)
            .map(|(i, _)| i)
            .collect();
        match normalized.len() {
            0 => {}
            1 => {
                return Resolution::Found {
                    index: normalized[0],
                    how: MatchKind::Normalized,
                }
            }
            _ => {
                debug!(path = target, candidates = normalized.len(), "ambiguous normalized path");
                return Resolution::Ambiguous(normalized);
            }
        }

        let mut best_depth = 0;
        let mut best: Vec<usize> = Vec::new();
        for (index, candidate) in candidates.enumerate() {
            let depth = suffix_depth(&target_parts, &components(candidate));
            if depth == 0 || depth < best_depth {
                continue;
            }
            if depth > best_depth {
                best_depth = depth;
                best.clear();
            }
            best.push(index);
        }

        match best.len() {
            0 => Resolution::NotFound,
            1 => Resolution::Found {
                index: best[0],
                how: MatchKind::Suffix { depth: best_depth },
            },
            _ => {
                debug!(
                    path = target,
                    depth = best_depth,
                    candidates = best.len(),
                    "ambiguous suffix match"
                );
                Resolution::Ambiguous(best)
            }
        }
    }

    /// Components of `path`, prefixed with the root's when `path` is
    /// relative and a root is configured.
    fn anchor(&self, path: &str, parts: &[String]) -> Vec<String> {
        match &self.root {
            Some(root) if !is_absolute(path) => {
                let mut anchored = components(root);
                for part in parts {
                    push_component(&mut anchored, part);
                }
                anchored
            }
            _ => parts.to_vec(),
        }
    }
}

/// Split a path into normalized components.
pub fn components(path: &str) -> Vec<String> {
    let unified = path.replace('\\', "/");
    let mut parts: Vec<String> = Vec::new();
    for part in unified.split('/') {
        push_component(&mut parts, part);
    }
    parts
}

fn push_component(parts: &mut Vec<String>, part: &str) {
    match part {
        "" | "." => {}
        ".." => match parts.last() {
            Some(last) if last != ".." => {
                parts.pop();
            }
            _ => parts.push("..".to_string()),
        },
        _ => parts.push(part.to_string()),
    }
}

fn is_absolute(path: &str) -> bool {
    let bytes = path.as_bytes();
    matches!(bytes.first(), Some(b'/') | Some(b'\\'))
        || (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
}

/// Number of trailing components shared by `a` and `b`, provided the
/// shorter one is a whole suffix of the longer; 0 otherwise.
fn suffix_depth(a: &[String], b: &[String]) -> usize {
    let depth = a.len().min(b.len());
    if depth == 0 {
        return 0;
    }
    if a[a.len() - depth..] == b[b.len() - depth..] {
        depth
    } else {
        0
    }
}
