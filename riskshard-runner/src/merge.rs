// Copyright (c) The riskshard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Combining independently produced shard results into one report.
//!
//! Each metric has its own combination rule:
//!
//! | metric                  | rule                                   |
//! |-------------------------|----------------------------------------|
//! | test counts             | sum                                    |
//! | duration                | max (shards run in parallel)           |
//! | test case records       | concatenation, in input order          |
//! | line/function execution | max per line or function               |
//! | branch outcomes taken   | sum per branch site                    |
//! | branch outcomes total   | max per branch site                    |
//! | success                 | all inputs successful, none failed     |
//!
//! Taking the max for execution counts means that a line covered by any shard counts as covered,
//! so merged coverage percentages remain meaningful.

use crate::helpers::plural;
use camino::Utf8PathBuf;
use riskshard_metadata::{
    BranchCoverage, CoverageReport, FileCoverage, FunctionCoverage, LineCoverage, RunResult,
};
use std::collections::BTreeMap;

/// Merges per-shard run results into one.
///
/// The merged run is successful if and only if every input was successful and nothing failed or
/// errored. A shard that crashed or timed out before reporting any test case is recorded as
/// unsuccessful with zero counts, and it keeps the merged run unsuccessful.
/// Coverage is merged across the results that have it; if none do, the merged result has none.
///
/// An empty input produces the zero-valued [`RunResult`], whose `success` is false.
pub fn merge_run_results(results: impl IntoIterator<Item = RunResult>) -> RunResult {
    let mut merged = RunResult::default();
    let mut coverages = Vec::new();
    let mut count = 0;
    let mut all_succeeded = true;

    for result in results {
        count += 1;
        all_succeeded &= result.success;
        merged.passed += result.passed;
        merged.failed += result.failed;
        merged.skipped += result.skipped;
        merged.errors += result.errors;
        merged.duration_ms = merged.duration_ms.max(result.duration_ms);
        merged.test_cases.extend(result.test_cases);
        coverages.extend(result.coverage);
    }

    if count == 0 {
        return merged;
    }

    merged.success = all_succeeded && merged.has_no_failures();
    merged.coverage = merge_coverage_reports(&coverages);

    tracing::info!(
        "merged {count} shard {}: {} passed, {} failed, {} skipped, {} errors",
        if count == 1 { "result" } else { "results" },
        merged.passed,
        merged.failed,
        merged.skipped,
        merged.errors,
    );
    tracing::debug!(
        "merged result has {} {}",
        merged.test_cases.len(),
        plural::tests_str(merged.test_cases.len()),
    );

    merged
}

/// Merges coverage reports file by file.
///
/// Returns `None` if `reports` is empty.
pub fn merge_coverage_reports<'a>(
    reports: impl IntoIterator<Item = &'a CoverageReport>,
) -> Option<CoverageReport> {
    let mut files: BTreeMap<Utf8PathBuf, FileAccumulator> = BTreeMap::new();
    let mut any = false;

    for report in reports {
        any = true;
        for (path, file) in &report.files {
            files.entry(path.clone()).or_default().add(file);
        }
    }

    any.then(|| {
        CoverageReport::from_files(
            files
                .into_iter()
                .map(|(path, accumulator)| accumulator.finish(path)),
        )
    })
}

#[derive(Debug, Default)]
struct FileAccumulator {
    lines: BTreeMap<u32, u64>,
    functions: BTreeMap<(String, u32), u64>,
    // (taken, total)
    branches: BTreeMap<(u32, u32), (u64, u64)>,
}

impl FileAccumulator {
    fn add(&mut self, file: &FileCoverage) {
        for line in &file.lines {
            let count = self.lines.entry(line.line_number).or_default();
            *count = (*count).max(line.execution_count);
        }
        for function in &file.functions {
            let count = self
                .functions
                .entry((function.name.clone(), function.line_number))
                .or_default();
            *count = (*count).max(function.execution_count);
        }
        for branch in &file.branches {
            let (taken, total) = self
                .branches
                .entry((branch.line_number, branch.branch_id))
                .or_default();
            *taken += branch.taken_count;
            *total = (*total).max(branch.total_count);
        }
    }

    fn finish(self, file_path: Utf8PathBuf) -> FileCoverage {
        FileCoverage {
            file_path,
            lines: self
                .lines
                .into_iter()
                .map(|(line_number, execution_count)| LineCoverage {
                    line_number,
                    execution_count,
                })
                .collect(),
            functions: self
                .functions
                .into_iter()
                .map(|((name, line_number), execution_count)| FunctionCoverage {
                    name,
                    line_number,
                    execution_count,
                })
                .collect(),
            branches: self
                .branches
                .into_iter()
                .map(
                    |((line_number, branch_id), (taken_count, total_count))| BranchCoverage {
                        line_number,
                        branch_id,
                        taken_count,
                        total_count,
                    },
                )
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::{collection::vec, prelude::*};
    use riskshard_metadata::{CaseResult, CaseStatus};
    use test_strategy::proptest;

    fn run_result(passed: usize, failed: usize, duration_ms: f64) -> RunResult {
        RunResult {
            passed,
            failed,
            duration_ms,
            success: failed == 0,
            ..RunResult::default()
        }
    }

    fn lines(file_path: &str, lines: &[(u32, u64)]) -> CoverageReport {
        CoverageReport::from_files([FileCoverage {
            lines: lines
                .iter()
                .map(|&(line_number, execution_count)| LineCoverage {
                    line_number,
                    execution_count,
                })
                .collect(),
            ..FileCoverage::new(file_path)
        }])
    }

    fn branches(file_path: &str, branches: &[(u32, u32, u64, u64)]) -> CoverageReport {
        CoverageReport::from_files([FileCoverage {
            branches: branches
                .iter()
                .map(
                    |&(line_number, branch_id, taken_count, total_count)| BranchCoverage {
                        line_number,
                        branch_id,
                        taken_count,
                        total_count,
                    },
                )
                .collect(),
            ..FileCoverage::new(file_path)
        }])
    }

    #[test]
    fn two_shards() {
        let mut first = run_result(2, 0, 500.0);
        first.test_cases = vec![
            CaseResult::new("test_login", CaseStatus::Passed),
            CaseResult::new("test_logout", CaseStatus::Passed),
        ];
        let mut second = run_result(1, 1, 800.0);
        second.test_cases = vec![
            CaseResult::new("test_refund", CaseStatus::Passed),
            CaseResult::new("test_charge", CaseStatus::Failed),
        ];

        let merged = merge_run_results([first, second]);
        assert_eq!(merged.passed, 3);
        assert_eq!(merged.failed, 1);
        assert_eq!(merged.total(), 4);
        assert_eq!(merged.duration_ms, 800.0);
        assert!(!merged.success);
        let names: Vec<_> = merged.test_cases.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            ["test_login", "test_logout", "test_refund", "test_charge"]
        );
        assert_eq!(merged.coverage, None);
    }

    #[test]
    fn errors_fail_the_merged_run() {
        let mut errored = run_result(0, 0, 10.0);
        errored.errors = 1;
        errored.success = false;
        let merged = merge_run_results([run_result(4, 0, 20.0), errored]);
        assert!(!merged.success);
        assert_eq!(merged.errors, 1);
    }

    #[test]
    fn crashed_shard_fails_the_merged_run() {
        let crashed = RunResult {
            success: false,
            ..RunResult::default()
        };

        let merged = merge_run_results([crashed.clone()]);
        assert_eq!(merged, crashed);

        let merged = merge_run_results([run_result(3, 0, 40.0), crashed.clone()]);
        assert_eq!(merged.passed, 3);
        assert_eq!(merged.total(), 3);
        assert!(!merged.success);

        let merged = merge_run_results([crashed.clone(), crashed]);
        assert!(!merged.success);
    }

    #[test]
    fn empty_inputs() {
        let merged = merge_run_results(Vec::new());
        assert_eq!(merged, RunResult::default());
        assert_eq!(merged.total(), 0);
        assert!(!merged.success);

        assert_eq!(merge_coverage_reports(&Vec::<CoverageReport>::new()), None);
    }

    #[test]
    fn coverage_only_from_shards_that_have_it() {
        let mut with_coverage = run_result(1, 0, 1.0);
        with_coverage.coverage = Some(lines("src/auth.py", &[(1, 3)]));
        let merged = merge_run_results([run_result(1, 0, 1.0), with_coverage]);
        assert_eq!(merged.coverage, Some(lines("src/auth.py", &[(1, 3)])));
    }

    #[test]
    fn line_counts_take_the_max() {
        let merged = merge_coverage_reports(&[
            lines("src/auth.py", &[(10, 2), (12, 0)]),
            lines("src/auth.py", &[(11, 1), (10, 5)]),
            lines("src/db.py", &[(1, 1)]),
        ])
        .unwrap();

        assert_eq!(
            merged.file("src/auth.py").unwrap().lines,
            [
                LineCoverage {
                    line_number: 10,
                    execution_count: 5
                },
                LineCoverage {
                    line_number: 11,
                    execution_count: 1
                },
                LineCoverage {
                    line_number: 12,
                    execution_count: 0
                },
            ]
        );
        assert!(merged.file("src/db.py").is_some());
    }

    #[test]
    fn function_counts_take_the_max_per_name_and_line() {
        let function = |name: &str, line_number, execution_count| FunctionCoverage {
            name: name.to_owned(),
            line_number,
            execution_count,
        };
        let report = |functions: Vec<FunctionCoverage>| {
            CoverageReport::from_files([FileCoverage {
                functions,
                ..FileCoverage::new("src/auth.py")
            }])
        };

        let merged = merge_coverage_reports(&[
            report(vec![function("login", 3, 0), function("logout", 9, 4)]),
            report(vec![function("login", 3, 2), function("login", 30, 1)]),
        ])
        .unwrap();
        assert_eq!(
            merged.file("src/auth.py").unwrap().functions,
            [
                function("login", 3, 2),
                function("login", 30, 1),
                function("logout", 9, 4),
            ]
        );
    }

    #[test]
    fn branch_taken_is_summed_and_total_is_max() {
        let merged = merge_coverage_reports(&[
            branches("src/auth.py", &[(4, 0, 1, 2)]),
            branches("src/auth.py", &[(4, 0, 2, 2), (4, 1, 0, 3)]),
        ])
        .unwrap();
        assert_eq!(
            merged.file("src/auth.py").unwrap().branches,
            [
                BranchCoverage {
                    line_number: 4,
                    branch_id: 0,
                    taken_count: 3,
                    total_count: 2
                },
                BranchCoverage {
                    line_number: 4,
                    branch_id: 1,
                    taken_count: 0,
                    total_count: 3
                },
            ]
        );
    }

    fn arb_run_result() -> impl Strategy<Value = RunResult> {
        (
            0usize..50,
            0usize..5,
            0usize..5,
            0usize..3,
            0u32..100_000,
            vec("[a-z]{1,8}", 0..4),
            any::<bool>(),
        )
            .prop_map(|(passed, failed, skipped, errors, duration, names, crashed)| RunResult {
                passed,
                failed,
                skipped,
                errors,
                duration_ms: f64::from(duration),
                test_cases: names
                    .into_iter()
                    .map(|name| CaseResult::new(name, CaseStatus::Passed))
                    .collect(),
                success: !crashed && failed == 0 && errors == 0,
                coverage: None,
            })
    }

    fn arb_line_report() -> impl Strategy<Value = CoverageReport> {
        vec((0u32..20, 0u64..10), 0..10).prop_map(|entries| lines("src/a.py", &entries))
    }

    #[proptest(cases = 64)]
    fn singleton_merge_is_identity(#[strategy(arb_run_result())] result: RunResult) {
        let merged = merge_run_results([result.clone()]);
        prop_assert_eq!(merged, result);
    }

    #[proptest(cases = 64)]
    fn counts_are_associative(
        #[strategy(arb_run_result())] a: RunResult,
        #[strategy(arb_run_result())] b: RunResult,
        #[strategy(arb_run_result())] c: RunResult,
    ) {
        let left = merge_run_results([merge_run_results([a.clone(), b.clone()]), c.clone()]);
        let right = merge_run_results([a.clone(), merge_run_results([b.clone(), c.clone()])]);
        let flat = merge_run_results([a, b, c]);

        prop_assert_eq!(&left, &right);
        prop_assert_eq!(&left, &flat);
    }

    #[proptest(cases = 64)]
    fn merged_lines_dominate_inputs(
        #[strategy(vec(arb_line_report(), 1..5))] reports: Vec<CoverageReport>,
    ) {
        let merged = merge_coverage_reports(&reports).unwrap();
        let merged_lines = merged
            .file("src/a.py")
            .map(|file| file.lines.clone())
            .unwrap_or_default();

        prop_assert!(merged_lines.windows(2).all(|w| w[0].line_number < w[1].line_number));
        for report in &reports {
            for file in report.files.values() {
                for line in &file.lines {
                    let merged_line = merged_lines
                        .iter()
                        .find(|l| l.line_number == line.line_number);
                    prop_assert!(
                        merged_line.is_some_and(|l| l.execution_count >= line.execution_count)
                    );
                }
            }
        }
    }
}
