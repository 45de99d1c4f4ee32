// Copyright (c) The riskshard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::CoverageReport;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The outcome of a single test case.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaseStatus {
    /// The test case passed.
    Passed,

    /// The test case failed.
    Failed,

    /// The test case was skipped.
    Skipped,

    /// The test case could not be run to completion, for example because its setup errored out.
    Error,
}

impl CaseStatus {
    /// Returns the string used for this status in serialized output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of executing a single test case.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct CaseResult {
    /// The name of the test case, as reported by the test framework.
    pub name: String,

    /// The outcome of the test case.
    pub status: CaseStatus,

    /// How long the test case took, in milliseconds.
    #[serde(default)]
    pub duration_ms: f64,

    /// The failure message, if any. Empty for passing test cases.
    #[serde(default)]
    pub failure_message: String,

    /// The test file the case was defined in, if known.
    #[serde(default)]
    pub file_path: Option<Utf8PathBuf>,
}

impl CaseResult {
    /// Creates a new `CaseResult` with no duration, message or file path.
    pub fn new(name: impl Into<String>, status: CaseStatus) -> Self {
        Self {
            name: name.into(),
            status,
            duration_ms: 0.0,
            failure_message: String::new(),
            file_path: None,
        }
    }
}

/// The aggregated result of one test run: either a single shard, or several shards merged
/// together.
///
/// The default value is the zero-valued result: no tests, no duration and `success == false`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct RunResult {
    /// The number of test cases that passed.
    pub passed: usize,

    /// The number of test cases that failed.
    pub failed: usize,

    /// The number of test cases that were skipped.
    pub skipped: usize,

    /// The number of test cases that errored out.
    pub errors: usize,

    /// Wall-clock duration of the run, in milliseconds.
    pub duration_ms: f64,

    /// Individual test case records, in the order they were reported.
    #[serde(default)]
    pub test_cases: Vec<CaseResult>,

    /// Whether the run is considered successful.
    pub success: bool,

    /// Coverage collected during the run, if any.
    #[serde(default)]
    pub coverage: Option<CoverageReport>,
}

impl RunResult {
    /// Returns the total number of test cases: passed, failed, skipped and errored.
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.errors
    }

    /// Returns true if no test case failed or errored out.
    pub fn has_no_failures(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }
}
