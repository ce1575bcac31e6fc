//! The persisted result of one measured run.
//!
//! A [`Report`] bundles the coverage of a run with the optional
//! code-to-test ratio and test execution time, and is stored as JSON so a
//! later run can be compared against it.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::detect;
use crate::diff::{self, CoverageDiff};
use crate::error::Result;
use crate::fuzzy::PathReconciler;
use crate::model::Coverage;
use crate::parsers::Format;
use crate::ratio::{self, CodeToTestRatio, RatioConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<Coverage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_to_test_ratio: Option<CodeToTestRatio>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "nanos")]
    pub test_execution_time: Option<Duration>,
}

/// Differences between two reports. Each field is `None` when either
/// report lacks the metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportDiff {
    pub coverage: Option<CoverageDiff>,
    pub code_to_test_ratio: Option<f64>,
    /// Seconds.
    pub test_execution_time: Option<f64>,
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

impl Report {
    pub fn new() -> Self {
        Self {
            timestamp: Utc::now(),
            coverage: None,
            code_to_test_ratio: None,
            test_execution_time: None,
        }
    }

    /// Decode the coverage report at `path` (a file, or a project root
    /// holding a report at its tool's default location).
    pub fn measure_coverage(&mut self, path: &Path, format: Option<Format>) -> Result<Format> {
        let (format, coverage) = detect::sniff_path(path, format)?;
        debug!(%format, total = coverage.total, covered = coverage.covered, "measured coverage");
        self.coverage = Some(coverage);
        Ok(format)
    }

    pub fn measure_code_to_test_ratio(&mut self, root: &Path, config: &RatioConfig) -> Result<()> {
        self.code_to_test_ratio = Some(ratio::measure(root, config)?);
        Ok(())
    }

    pub fn set_test_execution_time(&mut self, time: Duration) {
        self.test_execution_time = Some(time);
    }

    #[must_use]
    pub fn coverage_percent(&self) -> Option<f64> {
        self.coverage.as_ref().and_then(Coverage::percent)
    }

    #[must_use]
    pub fn code_to_test_ratio(&self) -> Option<f64> {
        self.code_to_test_ratio.as_ref().and_then(CodeToTestRatio::ratio)
    }

    /// Number of metrics present in the report.
    #[must_use]
    pub fn count_measured(&self) -> usize {
        usize::from(self.coverage.is_some())
            + usize::from(self.code_to_test_ratio.is_some())
            + usize::from(self.test_execution_time.is_some())
    }

    /// Drop per-line, per-block and per-file ratio detail, keeping totals.
    pub fn compact(&mut self) {
        if let Some(coverage) = self.coverage.as_mut() {
            coverage.compact();
        }
        if let Some(ratio) = self.code_to_test_ratio.as_mut() {
            ratio.files = Vec::new();
        }
    }

    pub fn compare(&self, baseline: &Report, reconciler: &PathReconciler) -> ReportDiff {
        let coverage = match (&self.coverage, &baseline.coverage) {
            (Some(current), Some(base)) => Some(diff::diff(current, base, reconciler)),
            _ => None,
        };
        let secs = |r: &Report| r.test_execution_time.map(|t| t.as_secs_f64());
        ReportDiff {
            coverage,
            code_to_test_ratio: diff::delta(self.code_to_test_ratio(), baseline.code_to_test_ratio()),
            test_execution_time: diff::delta(secs(self), secs(baseline)),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

/// `Option<Duration>` as integer nanoseconds.
mod nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => {
                let nanos = u64::try_from(d.as_nanos()).map_err(serde::ser::Error::custom)?;
                serializer.serialize_some(&nanos)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_nanos))
    }
}
