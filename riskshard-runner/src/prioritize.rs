// Copyright (c) The riskshard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Risk-based ordering of test files.
//!
//! Risk is assigned to source files by an external analysis and handed to riskshard as a
//! [`RiskReport`]. Each test file inherits the highest risk among the source files it exercises,
//! and the tests are then sorted so that the riskiest run first.

use crate::{
    errors::{PlanValidationError, RiskReportError},
    helpers::{normalize_lexically, plural, to_slash_path},
    mapper::{TestMapping, TestSourceMapper},
};
use camino::{Utf8Path, Utf8PathBuf};
pub use riskshard_metadata::RiskScore;
use riskshard_metadata::PrioritizedTestPlanSummary;
use std::collections::BTreeMap;

/// The score given to a test file whose risk can't be derived from the report.
pub const DEFAULT_RISK_SCORE: f64 = 0.5;

/// Maps a test file to the source files it exercises.
///
/// [`TestSourceMapper`] is the standard implementation.
pub trait SourceMapper {
    /// Maps a single test file.
    fn map_test(&self, test_file: &Utf8Path) -> TestMapping;
}

impl SourceMapper for TestSourceMapper {
    fn map_test(&self, test_file: &Utf8Path) -> TestMapping {
        self.map_one(test_file)
    }
}

/// Per-source-file risk scores, keyed by path relative to the project root.
///
/// Keys are normalized on insertion, so `./src/auth.py` and `src/auth.py` name the same file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RiskReport {
    scores: BTreeMap<Utf8PathBuf, f64>,
}

impl RiskReport {
    /// Creates an empty risk report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a risk report from a JSON file of the form `{"src/auth.py": 0.95, ...}`.
    pub fn from_json_file(path: impl AsRef<Utf8Path>) -> Result<Self, RiskReportError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|error| RiskReportError::Read {
            path: path.to_owned(),
            error,
        })?;
        let report = Self::from_json_str(path, &contents)?;
        tracing::debug!(
            path = %path,
            sources = report.len(),
            "loaded risk report",
        );
        Ok(report)
    }

    /// Parses a risk report from JSON. `path` is only used for error messages.
    pub fn from_json_str(path: impl AsRef<Utf8Path>, contents: &str) -> Result<Self, RiskReportError> {
        let raw: BTreeMap<Utf8PathBuf, f64> =
            serde_json::from_str(contents).map_err(|error| RiskReportError::Parse {
                path: path.as_ref().to_owned(),
                error,
            })?;
        Self::from_scores(raw)
    }

    /// Builds a risk report from `(source file, score)` pairs.
    pub fn from_scores<I, P>(scores: I) -> Result<Self, RiskReportError>
    where
        I: IntoIterator<Item = (P, f64)>,
        P: AsRef<Utf8Path>,
    {
        let mut report = Self::new();
        for (source_file, score) in scores {
            report.insert(source_file, score)?;
        }
        Ok(report)
    }

    /// Sets the score for a source file, returning the previous score if there was one.
    ///
    /// Scores must be finite and within `[0, 1]`.
    pub fn insert(
        &mut self,
        source_file: impl AsRef<Utf8Path>,
        score: f64,
    ) -> Result<Option<f64>, RiskReportError> {
        let source_file = Self::key(source_file.as_ref());
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(RiskReportError::ScoreOutOfRange { source_file, score });
        }
        Ok(self.scores.insert(source_file, score))
    }

    /// Returns the score for a source file, if the report has one.
    pub fn get(&self, source_file: impl AsRef<Utf8Path>) -> Option<f64> {
        self.scores.get(&Self::key(source_file.as_ref())).copied()
    }

    /// Returns the number of source files in the report.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Returns true if the report has no scores.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Iterates over `(source file, score)` pairs in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&Utf8Path, f64)> + '_ {
        self.scores.iter().map(|(path, score)| (path.as_path(), *score))
    }

    fn key(source_file: &Utf8Path) -> Utf8PathBuf {
        to_slash_path(&normalize_lexically(source_file))
    }
}

/// Test files sorted by descending risk.
///
/// `test_files` and `risk_scores` always have the same length and are index-aligned. Tests with
/// equal scores keep the order they were given in.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PrioritizedTestPlan {
    test_files: Vec<Utf8PathBuf>,
    risk_scores: Vec<RiskScore>,
}

impl PrioritizedTestPlan {
    /// Creates a plan by sorting already-computed scores, highest first.
    ///
    /// The sort is stable.
    pub fn from_scores(mut risk_scores: Vec<RiskScore>) -> Self {
        risk_scores.sort_by(|a, b| b.score.total_cmp(&a.score));
        let test_files = risk_scores
            .iter()
            .map(|score| score.file_path.clone())
            .collect();
        Self {
            test_files,
            risk_scores,
        }
    }

    /// Reconstructs a plan from its serialized form, checking that it's consistent.
    pub fn from_summary(summary: PrioritizedTestPlanSummary) -> Result<Self, PlanValidationError> {
        let PrioritizedTestPlanSummary {
            test_files,
            risk_scores,
        } = summary;

        if test_files.len() != risk_scores.len() {
            return Err(PlanValidationError::LengthMismatch {
                test_files: test_files.len(),
                risk_scores: risk_scores.len(),
            });
        }

        for (index, (test_file, score)) in test_files.iter().zip(&risk_scores).enumerate() {
            if *test_file != score.file_path {
                return Err(PlanValidationError::Misaligned {
                    index,
                    test_file: test_file.clone(),
                    scored_file: score.file_path.clone(),
                });
            }
            if score.reasons.is_empty() {
                return Err(PlanValidationError::MissingReasons {
                    test_file: test_file.clone(),
                });
            }
        }

        if let Some(index) = risk_scores
            .windows(2)
            .position(|pair| pair[1].score > pair[0].score)
        {
            return Err(PlanValidationError::NotSorted { index: index + 1 });
        }

        Ok(Self {
            test_files,
            risk_scores,
        })
    }

    /// Returns the test files, highest risk first.
    pub fn test_files(&self) -> &[Utf8PathBuf] {
        &self.test_files
    }

    /// Returns the score for each entry in [`test_files`](Self::test_files).
    pub fn risk_scores(&self) -> &[RiskScore] {
        &self.risk_scores
    }

    /// Returns the number of test files in the plan.
    pub fn len(&self) -> usize {
        self.test_files.len()
    }

    /// Returns true if the plan has no test files.
    pub fn is_empty(&self) -> bool {
        self.test_files.is_empty()
    }

    /// Returns the serializable form of this plan.
    pub fn to_summary(&self) -> PrioritizedTestPlanSummary {
        PrioritizedTestPlanSummary {
            test_files: self.test_files.clone(),
            risk_scores: self.risk_scores.clone(),
        }
    }
}

/// Scores each test file by the risk of the source files it exercises, and sorts highest first.
///
/// A test's score is the maximum score, among its mapped source files, that appears in
/// `risk_report`. Tests that can't be scored that way get [`DEFAULT_RISK_SCORE`], with a reason
/// saying why. Every input test file appears in the plan exactly once.
pub fn prioritize<I>(
    test_files: I,
    risk_report: Option<&RiskReport>,
    mapper: Option<&dyn SourceMapper>,
) -> PrioritizedTestPlan
where
    I: IntoIterator,
    I::Item: AsRef<Utf8Path>,
{
    let mut defaulted = 0;
    let scores: Vec<_> = test_files
        .into_iter()
        .map(|test_file| {
            let test_file = test_file.as_ref();
            score_test_file(test_file, risk_report, mapper).unwrap_or_else(|why| {
                defaulted += 1;
                RiskScore {
                    file_path: test_file.to_owned(),
                    score: DEFAULT_RISK_SCORE,
                    reasons: vec![format!("{why}, using default score {DEFAULT_RISK_SCORE:.2}")],
                }
            })
        })
        .collect();

    let plan = PrioritizedTestPlan::from_scores(scores);
    tracing::info!(
        "prioritized {} {} ({} with default score)",
        plan.len(),
        plural::test_files_str(plan.len()),
        defaulted,
    );
    plan
}

/// Returns the propagated score for a test, or why it couldn't be computed.
fn score_test_file(
    test_file: &Utf8Path,
    risk_report: Option<&RiskReport>,
    mapper: Option<&dyn SourceMapper>,
) -> Result<RiskScore, &'static str> {
    let mapper = mapper.ok_or("no source mapper")?;
    let risk_report = risk_report.ok_or("no risk report")?;

    let mapping = mapper.map_test(test_file);
    if mapping.source_files().is_empty() {
        return Err("no source mapping");
    }

    let mut max_score: Option<f64> = None;
    let mut reasons = Vec::new();
    for source_file in mapping.source_files() {
        if let Some(score) = risk_report.get(source_file) {
            max_score = Some(max_score.map_or(score, |max| max.max(score)));
            reasons.push(format!("propagated from {source_file} ({score:.2})"));
        }
    }

    let score = max_score.ok_or("no mapped source file is in the risk report")?;
    Ok(RiskScore {
        file_path: test_file.to_owned(),
        score,
        reasons,
    })
}
