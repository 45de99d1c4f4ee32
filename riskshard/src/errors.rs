// Copyright (c) The riskshard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use riskshard_metadata::RiskshardExitCode;
use riskshard_runner::errors::{
    ConfigParseError, DiscoverTestsError, PlanReadError, RiskReportError, ShardResultReadError,
    ShardSpecError, WriteOutputError,
};
use std::error::Error;
use thiserror::Error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

/// An error that riskshard expects to see, with a documented exit code.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine the current directory")]
    CurrentDirFailed {
        #[source]
        err: std::io::Error,
    },
    #[error("current directory is not valid UTF-8")]
    CurrentDirInvalidUtf8 { path: std::path::PathBuf },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("risk report error")]
    RiskReportError {
        #[from]
        err: RiskReportError,
    },
    #[error("test discovery error")]
    DiscoverTestsError {
        #[from]
        err: DiscoverTestsError,
    },
    #[error("invalid shard")]
    ShardSpecError {
        #[from]
        err: ShardSpecError,
    },
    #[error("plan read error")]
    PlanReadError {
        #[from]
        err: PlanReadError,
    },
    #[error("shard result read error")]
    ShardResultReadError {
        #[from]
        err: ShardResultReadError,
    },
    #[error("output write error")]
    WriteOutputError {
        #[from]
        err: WriteOutputError,
    },
    #[error("error writing to stdout")]
    StdoutWriteError {
        #[source]
        err: std::io::Error,
    },
    #[error("error serializing output")]
    SerializeError {
        #[source]
        err: serde_json::Error,
    },
    #[error("no test files found")]
    NoTestFiles { project_root: Utf8PathBuf },
}

impl ExpectedError {
    pub(crate) fn stdout_write_error(err: std::io::Error) -> Self {
        Self::StdoutWriteError { err }
    }

    pub(crate) fn serialize_error(err: serde_json::Error) -> Self {
        Self::SerializeError { err }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirFailed { .. }
            | Self::CurrentDirInvalidUtf8 { .. }
            | Self::ConfigParseError { .. }
            | Self::RiskReportError { .. }
            | Self::DiscoverTestsError { .. }
            | Self::PlanReadError { .. }
            | Self::ShardResultReadError { .. } => RiskshardExitCode::SETUP_ERROR,
            Self::ShardSpecError { .. } => RiskshardExitCode::INVALID_SHARD,
            Self::NoTestFiles { .. } => RiskshardExitCode::NO_TESTS,
            Self::WriteOutputError { .. }
            | Self::StdoutWriteError { .. }
            | Self::SerializeError { .. } => RiskshardExitCode::WRITE_OUTPUT_ERROR,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::CurrentDirFailed { err } => {
                tracing::error!("could not determine the current directory");
                Some(err as &dyn Error)
            }
            Self::CurrentDirInvalidUtf8 { path } => {
                tracing::error!(
                    "current directory `{}` is not valid UTF-8, pass --project-root instead",
                    path.display().style(styles.bold),
                );
                None
            }
            Self::ConfigParseError { err } => {
                tracing::error!(
                    "failed to parse config at `{}`",
                    err.config_file().style(styles.bold)
                );
                Some(err.kind() as &dyn Error)
            }
            Self::RiskReportError { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::DiscoverTestsError { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::ShardSpecError { err } => {
                tracing::error!("{err}");
                None
            }
            Self::PlanReadError { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::ShardResultReadError { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::WriteOutputError { err } => {
                tracing::error!("failed to write `{}`", err.path().style(styles.bold));
                err.source()
            }
            Self::StdoutWriteError { err } => {
                tracing::error!("error writing to stdout");
                Some(err as &dyn Error)
            }
            Self::SerializeError { err } => {
                tracing::error!("error serializing output");
                Some(err as &dyn Error)
            }
            Self::NoTestFiles { project_root } => {
                tracing::error!(
                    "no test files found under `{}`",
                    project_root.style(styles.bold)
                );
                None
            }
        };

        while let Some(err) = next_error {
            tracing::error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
