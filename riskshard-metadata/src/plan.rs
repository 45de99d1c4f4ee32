// Copyright (c) The riskshard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a test-to-source mapping was established.
///
/// This is a provenance tag rather than a calibrated probability. [`score`](Self::score) exposes
/// the numeric value for callers that sort or threshold on it.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MappingConfidence {
    /// At least one source file was found by a naming convention, e.g. `test_foo.py` -> `foo.py`.
    ExactNameMatch,

    /// Source files were only found by resolving the test's imports.
    ImportMatch,

    /// No source file could be found.
    Unmapped,
}

impl MappingConfidence {
    /// The numeric confidence for a naming-convention match.
    pub const EXACT_NAME_MATCH_SCORE: f64 = 0.9;

    /// The numeric confidence for an import match.
    pub const IMPORT_MATCH_SCORE: f64 = 0.7;

    /// Returns the numeric confidence in `[0, 1]`.
    pub fn score(self) -> f64 {
        match self {
            Self::ExactNameMatch => Self::EXACT_NAME_MATCH_SCORE,
            Self::ImportMatch => Self::IMPORT_MATCH_SCORE,
            Self::Unmapped => 0.0,
        }
    }

    /// Returns the string used for this tag in serialized output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExactNameMatch => "exact-name-match",
            Self::ImportMatch => "import-match",
            Self::Unmapped => "unmapped",
        }
    }
}

impl fmt::Display for MappingConfidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializable form of a single test-to-source mapping.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TestMappingSummary {
    /// The test file, as given to the mapper.
    pub test_file: Utf8PathBuf,

    /// The source files the test exercises: naming matches first, then import matches.
    pub source_files: Vec<Utf8PathBuf>,

    /// How the mapping was established.
    pub confidence: MappingConfidence,

    /// The numeric value of `confidence`.
    pub confidence_score: f64,
}

/// The propagated risk score of a single test file.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RiskScore {
    /// The test file.
    pub file_path: Utf8PathBuf,

    /// The risk score, in `[0, 1]`.
    pub score: f64,

    /// Human-readable explanations for the score. Never empty.
    pub reasons: Vec<String>,
}

/// Serializable form of a prioritized test plan, handed from a coordinator job to each shard job.
///
/// `test_files` and `risk_scores` are index-aligned and sorted by descending score.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PrioritizedTestPlanSummary {
    /// Test files, highest risk first.
    pub test_files: Vec<Utf8PathBuf>,

    /// The score for each entry in `test_files`.
    pub risk_scores: Vec<RiskScore>,
}
