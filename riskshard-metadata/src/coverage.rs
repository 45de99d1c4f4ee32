// Copyright (c) The riskshard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Coverage data for a single line of code.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct LineCoverage {
    /// The 1-based line number.
    pub line_number: u32,

    /// How many times the line was executed.
    pub execution_count: u64,
}

impl LineCoverage {
    /// Returns true if this line was executed at least once.
    pub fn is_covered(&self) -> bool {
        self.execution_count > 0
    }
}

/// Coverage data for a single function.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct FunctionCoverage {
    /// The function name, as reported by the coverage tool.
    pub name: String,

    /// The line the function is defined on.
    pub line_number: u32,

    /// How many times the function was entered.
    pub execution_count: u64,
}

impl FunctionCoverage {
    /// Returns true if this function was executed at least once.
    pub fn is_covered(&self) -> bool {
        self.execution_count > 0
    }
}

/// Coverage data for a single branch site (`if`/`else`, `match`, ternaries, and so on).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct BranchCoverage {
    /// The line the branch site is on.
    pub line_number: u32,

    /// Identifies the branch site within the line.
    pub branch_id: u32,

    /// The number of branch outcomes that were taken.
    pub taken_count: u64,

    /// The number of possible branch outcomes at this site.
    pub total_count: u64,
}

impl BranchCoverage {
    /// Returns branch coverage as a percentage (0.0-100.0).
    ///
    /// A site with no possible outcomes counts as fully covered.
    pub fn coverage_percentage(&self) -> f64 {
        percentage(self.taken_count, self.total_count)
    }
}

/// Coverage data for a single source file.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct FileCoverage {
    /// The path of the source file.
    pub file_path: Utf8PathBuf,

    /// Line-level coverage entries.
    #[serde(default)]
    pub lines: Vec<LineCoverage>,

    /// Function-level coverage entries.
    #[serde(default)]
    pub functions: Vec<FunctionCoverage>,

    /// Branch-level coverage entries.
    #[serde(default)]
    pub branches: Vec<BranchCoverage>,
}

impl FileCoverage {
    /// Creates an empty `FileCoverage` for the given path.
    pub fn new(file_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            ..Default::default()
        }
    }

    /// Returns the percentage of lines executed at least once.
    pub fn line_coverage_percentage(&self) -> f64 {
        let covered = self.lines.iter().filter(|line| line.is_covered()).count();
        percentage(covered as u64, self.lines.len() as u64)
    }

    /// Returns the percentage of functions executed at least once.
    pub fn function_coverage_percentage(&self) -> f64 {
        let covered = self.functions.iter().filter(|f| f.is_covered()).count();
        percentage(covered as u64, self.functions.len() as u64)
    }

    /// Returns the ratio of taken branch outcomes to possible branch outcomes, as a percentage.
    pub fn branch_coverage_percentage(&self) -> f64 {
        let taken = self.branches.iter().map(|b| b.taken_count).sum();
        let total = self.branches.iter().map(|b| b.total_count).sum();
        percentage(taken, total)
    }
}

/// A coverage report across all files in a project.
///
/// This is the unified format that coverage adapters translate their native reports into.
/// Files are keyed by path, so iteration order is deterministic.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct CoverageReport {
    /// Per-file coverage, keyed by file path.
    #[serde(default)]
    pub files: BTreeMap<Utf8PathBuf, FileCoverage>,
}

impl CoverageReport {
    /// Creates a report out of per-file coverage, keyed by each file's path.
    pub fn from_files(files: impl IntoIterator<Item = FileCoverage>) -> Self {
        Self {
            files: files
                .into_iter()
                .map(|file| (file.file_path.clone(), file))
                .collect(),
        }
    }

    /// Returns coverage for a single file, if present.
    pub fn file(&self, path: impl AsRef<Utf8Path>) -> Option<&FileCoverage> {
        self.files.get(path.as_ref())
    }

    /// Returns the overall line coverage percentage across all files.
    pub fn overall_line_coverage(&self) -> f64 {
        let (covered, total) = self.files.values().fold((0, 0), |(covered, total), file| {
            let file_covered = file.lines.iter().filter(|l| l.is_covered()).count() as u64;
            (covered + file_covered, total + file.lines.len() as u64)
        });
        percentage(covered, total)
    }

    /// Returns the overall function coverage percentage across all files.
    pub fn overall_function_coverage(&self) -> f64 {
        let (covered, total) = self.files.values().fold((0, 0), |(covered, total), file| {
            let file_covered = file.functions.iter().filter(|f| f.is_covered()).count() as u64;
            (covered + file_covered, total + file.functions.len() as u64)
        });
        percentage(covered, total)
    }

    /// Returns the overall branch coverage percentage across all files.
    pub fn overall_branch_coverage(&self) -> f64 {
        let (taken, total) = self
            .files
            .values()
            .flat_map(|file| &file.branches)
            .fold((0, 0), |(taken, total), b| {
                (taken + b.taken_count, total + b.total_count)
            });
        percentage(taken, total)
    }

    /// Returns the files with no line executed.
    pub fn uncovered_files(&self) -> Vec<&Utf8Path> {
        self.files
            .iter()
            .filter(|(_, file)| file.line_coverage_percentage() == 0.0)
            .map(|(path, _)| path.as_path())
            .collect()
    }

    /// Returns the files whose line coverage is above zero but below `threshold`, along with
    /// their line coverage percentage.
    pub fn partially_covered_files(&self, threshold: f64) -> Vec<(&Utf8Path, f64)> {
        self.files
            .iter()
            .filter_map(|(path, file)| {
                let pct = file.line_coverage_percentage();
                (pct > 0.0 && pct < threshold).then_some((path.as_path(), pct))
            })
            .collect()
    }
}

// Nothing to measure counts as fully covered.
fn percentage(covered: u64, total: u64) -> f64 {
    if total == 0 {
        100.0
    } else {
        covered as f64 / total as f64 * 100.0
    }
}
