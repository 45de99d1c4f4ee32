// Copyright (c) The riskshard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by riskshard.

use camino::Utf8PathBuf;
use config::ConfigError;
use std::{borrow::Cow, fmt};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse riskshard config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),

    /// A source root is absolute or escapes the project root.
    #[error("source root `{root}` must be a relative path inside the project root")]
    InvalidSourceRoot {
        /// The offending source root.
        root: Utf8PathBuf,
    },
}

/// An error that occurs while constructing a [`ShardSpec`](crate::partition::ShardSpec).
///
/// Invalid shard parameters are never clamped into range: a malformed partition request must
/// abort scheduling before any shard is dispatched.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub struct ShardSpecError {
    expected_format: Option<&'static str>,
    message: Cow<'static, str>,
}

impl ShardSpecError {
    pub(crate) fn new(
        expected_format: Option<&'static str>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            expected_format,
            message: message.into(),
        }
    }

    /// Returns the message for this error, without the expected format.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ShardSpecError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.expected_format {
            Some(format) => {
                write!(
                    f,
                    "shard must be in the format \"{}\":\n{}",
                    format, self.message
                )
            }
            None => write!(f, "{}", self.message),
        }
    }
}

/// An error that occurred while loading a risk report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RiskReportError {
    /// The risk report file couldn't be read.
    #[error("failed to read risk report at `{path}`")]
    Read {
        /// The path to the risk report.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The risk report isn't a JSON object of numbers.
    #[error("failed to parse risk report at `{path}`")]
    Parse {
        /// The path to the risk report.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },

    /// A score was not a finite number in `[0, 1]`.
    #[error("risk score {score} for `{source_file}` is outside [0, 1]")]
    ScoreOutOfRange {
        /// The source file the score was given for.
        source_file: Utf8PathBuf,

        /// The offending score.
        score: f64,
    },
}

/// An error that occurred while discovering test files.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiscoverTestsError {
    /// A test file pattern isn't a valid glob.
    #[error("invalid test file pattern `{pattern}`")]
    InvalidPattern {
        /// The pattern.
        pattern: String,

        /// The underlying error.
        #[source]
        error: globset::Error,
    },

    /// The project directory couldn't be walked.
    #[error("failed to walk project directory `{root}`")]
    Walk {
        /// The project root.
        root: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: walkdir::Error,
    },

    /// A discovered path isn't valid UTF-8.
    #[error("discovered path is not valid UTF-8: {}", .path.display())]
    NonUtf8Path {
        /// The path.
        path: std::path::PathBuf,
    },
}

/// An error that occurred while reading a shard result file.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ShardResultReadError {
    /// The file couldn't be read.
    #[error("failed to read shard result at `{path}`")]
    Read {
        /// The path to the shard result.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The file isn't a valid shard result.
    #[error("failed to parse shard result at `{path}`")]
    Parse {
        /// The path to the shard result.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },
}

/// An error that occurred while writing a shard result or plan file.
#[derive(Debug, Error)]
#[error("failed to write `{path}`")]
pub struct WriteOutputError {
    path: Utf8PathBuf,
    #[source]
    error: std::io::Error,
}

impl WriteOutputError {
    pub(crate) fn new(path: impl Into<Utf8PathBuf>, error: std::io::Error) -> Self {
        Self {
            path: path.into(),
            error,
        }
    }

    pub(crate) fn from_atomic(
        path: impl Into<Utf8PathBuf>,
        error: atomicwrites::Error<std::io::Error>,
    ) -> Self {
        let error = match error {
            atomicwrites::Error::Internal(error) | atomicwrites::Error::User(error) => error,
        };
        Self::new(path, error)
    }

    /// Returns the path that couldn't be written.
    pub fn path(&self) -> &Utf8PathBuf {
        &self.path
    }
}

/// An error that occurred while reading a plan file.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlanReadError {
    /// The file couldn't be read.
    #[error("failed to read plan at `{path}`")]
    Read {
        /// The path to the plan.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The file isn't valid JSON for a plan.
    #[error("failed to parse plan at `{path}`")]
    Parse {
        /// The path to the plan.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },

    /// The plan parsed, but its contents are inconsistent.
    #[error("plan at `{path}` is invalid")]
    Invalid {
        /// The path to the plan.
        path: Utf8PathBuf,

        /// The reason the plan is invalid.
        #[source]
        error: PlanValidationError,
    },
}

/// A deserialized plan doesn't satisfy the plan invariants.
#[derive(Clone, Debug, PartialEq, Error)]
#[non_exhaustive]
pub enum PlanValidationError {
    /// `test-files` and `risk-scores` have different lengths.
    #[error("plan has {test_files} test files but {risk_scores} risk scores")]
    LengthMismatch {
        /// The number of test files.
        test_files: usize,

        /// The number of risk scores.
        risk_scores: usize,
    },

    /// A test file doesn't match the risk score at the same index.
    #[error("test file `{test_file}` at index {index} doesn't match risk score for `{scored_file}`")]
    Misaligned {
        /// The index.
        index: usize,

        /// The test file at that index.
        test_file: Utf8PathBuf,

        /// The file named by the risk score at that index.
        scored_file: Utf8PathBuf,
    },

    /// Scores aren't sorted in descending order.
    #[error("risk scores are not in descending order at index {index}")]
    NotSorted {
        /// The first index whose score is greater than the previous one.
        index: usize,
    },

    /// A risk score has no reasons.
    #[error("risk score for `{test_file}` has no reasons")]
    MissingReasons {
        /// The test file.
        test_file: Utf8PathBuf,
    },
}
