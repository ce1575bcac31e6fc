//! Code-to-test ratio: lines of test code per line of production code.
//!
//! Files below the project root are classified with glob patterns
//! (relative to the root, `/`-separated). A pattern starting with `!`
//! excludes. A file matching the test set is test code even if the code
//! set matches it too. Hidden directories are never walked.

use std::path::Path;

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::Result;
use crate::loc::{self, LocLanguage};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RatioConfig {
    #[serde(default)]
    pub code: Vec<String>,
    #[serde(default)]
    pub test: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeFile {
    pub file: String,
    pub code: u64,
    pub is_test: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeToTestRatio {
    pub code: u64,
    pub test: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<CodeFile>,
}

impl CodeToTestRatio {
    /// `test / code`; `None` when there is no production code.
    #[must_use]
    pub fn ratio(&self) -> Option<f64> {
        if self.code == 0 {
            None
        } else {
            Some(self.test as f64 / self.code as f64)
        }
    }
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Default)]
struct PatternSet {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl PatternSet {
    fn compile(patterns: &[String]) -> Result<Self> {
        let mut set = PatternSet::default();
        for raw in patterns {
            match raw.strip_prefix('!') {
                Some(negated) => set.exclude.push(Pattern::new(negated)?),
                None => set.include.push(Pattern::new(raw)?),
            }
        }
        Ok(set)
    }

    fn matches(&self, path: &str) -> bool {
        self.include.iter().any(|p| p.matches_with(path, MATCH_OPTIONS))
            && !self.exclude.iter().any(|p| p.matches_with(path, MATCH_OPTIONS))
    }
}

/// Walk `root` and count code lines of every production and test file.
pub fn measure(root: &Path, config: &RatioConfig) -> Result<CodeToTestRatio> {
    let code_set = PatternSet::compile(&config.code)?;
    let test_set = PatternSet::compile(&config.test)?;
    let mut result = CodeToTestRatio::default();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");

        let is_test = test_set.matches(&relative);
        if !is_test && !code_set.matches(&relative) {
            continue;
        }

        let content = std::fs::read(entry.path())?;
        let counted = loc::count(
            &String::from_utf8_lossy(&content),
            LocLanguage::from_path(entry.path()),
        );
        debug!(file = %relative, code = counted.code, is_test, "counted");

        if is_test {
            result.test += counted.code;
        } else {
            result.code += counted.code;
        }
        result.files.push(CodeFile {
            file: relative,
            code: counted.code,
            is_test,
        });
    }

    Ok(result)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}
