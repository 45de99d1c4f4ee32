// Copyright (c) The riskshard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reading and writing the files exchanged between the coordinator, shard and combine jobs.
//!
//! Two kinds of file are exchanged, both JSON:
//!
//! * the plan, written once by the coordinator and read by each shard job;
//! * the shard result, written by each shard job and read by the combine job.
//!
//! Writes are atomic, so a job that reads a file while another is writing it never sees a
//! partially written file.

use crate::{
    errors::{PlanReadError, ShardResultReadError, WriteOutputError},
    helpers::plural,
    merge::merge_run_results,
    prioritize::PrioritizedTestPlan,
};
use camino::Utf8Path;
use riskshard_metadata::{PrioritizedTestPlanSummary, RunResult, ShardResultSummary};
use serde::Serialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    io::{self, Write},
};

/// Writes a shard result to `path`, creating parent directories as needed.
pub fn write_shard_result(
    path: impl AsRef<Utf8Path>,
    summary: &ShardResultSummary,
) -> Result<(), WriteOutputError> {
    let path = path.as_ref();
    write_json(path, summary)?;
    tracing::debug!(
        path = %path,
        shard_index = summary.shard_index,
        shard_count = summary.shard_count,
        "wrote shard result",
    );
    Ok(())
}

/// Reads a shard result written by [`write_shard_result`].
pub fn read_shard_result(
    path: impl AsRef<Utf8Path>,
) -> Result<ShardResultSummary, ShardResultReadError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|error| ShardResultReadError::Read {
        path: path.to_owned(),
        error,
    })?;
    serde_json::from_str(&contents).map_err(|error| ShardResultReadError::Parse {
        path: path.to_owned(),
        error,
    })
}

/// Writes a plan to `path`, creating parent directories as needed.
pub fn write_plan(
    path: impl AsRef<Utf8Path>,
    plan: &PrioritizedTestPlan,
) -> Result<(), WriteOutputError> {
    write_json(path.as_ref(), &plan.to_summary())
}

/// Reads a plan written by [`write_plan`], checking that it's still consistent.
pub fn read_plan(path: impl AsRef<Utf8Path>) -> Result<PrioritizedTestPlan, PlanReadError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|error| PlanReadError::Read {
        path: path.to_owned(),
        error,
    })?;
    let summary: PrioritizedTestPlanSummary =
        serde_json::from_str(&contents).map_err(|error| PlanReadError::Parse {
            path: path.to_owned(),
            error,
        })?;
    PrioritizedTestPlan::from_summary(summary).map_err(|error| PlanReadError::Invalid {
        path: path.to_owned(),
        error,
    })
}

/// Merges shard results in shard index order.
///
/// Inconsistent metadata doesn't stop the merge, but is logged as a warning: results from more
/// than one adapter, disagreeing shard counts, a shard index reported twice, or fewer results than
/// the shard count.
pub fn combine_shard_results(mut summaries: Vec<ShardResultSummary>) -> RunResult {
    summaries.sort_by_key(|summary| summary.shard_index);
    warn_on_inconsistencies(&summaries);
    merge_run_results(summaries.into_iter().map(|summary| summary.result))
}

fn warn_on_inconsistencies(summaries: &[ShardResultSummary]) {
    let adapters: BTreeSet<&str> = summaries
        .iter()
        .map(|summary| summary.adapter_name.as_str())
        .collect();
    if adapters.len() > 1 {
        tracing::warn!(
            "combining results from more than one adapter: {}",
            adapters.into_iter().collect::<Vec<_>>().join(", "),
        );
    }

    let counts: BTreeSet<usize> = summaries.iter().map(|summary| summary.shard_count).collect();
    if counts.len() > 1 {
        tracing::warn!(
            "shard results disagree on the shard count: {}",
            counts
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        );
    }

    let mut seen: BTreeMap<usize, usize> = BTreeMap::new();
    for summary in summaries {
        *seen.entry(summary.shard_index).or_default() += 1;
    }
    for (index, times) in &seen {
        if *times > 1 {
            tracing::warn!("shard index {index} was reported {times} times");
        }
    }

    if let Some(&expected) = counts.iter().max() {
        if seen.len() < expected {
            let missing = expected - seen.len();
            tracing::warn!(
                "{missing} of {expected} {} did not report a result",
                plural::shards_str(expected),
            );
        }
    }
}

fn write_json(path: &Utf8Path, value: &impl Serialize) -> Result<(), WriteOutputError> {
    if let Some(parent) = path.parent() {
        if !parent.as_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|error| WriteOutputError::new(path, error))?;
        }
    }

    atomicwrites::AtomicFile::new(path, atomicwrites::AllowOverwrite)
        .write(|file| {
            serde_json::to_writer_pretty(&mut *file, value).map_err(io::Error::from)?;
            file.write_all(b"\n")
        })
        .map_err(|error| WriteOutputError::from_atomic(path, error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prioritize::RiskScore;
    use camino_tempfile::tempdir;
    use pretty_assertions::assert_eq;
    use riskshard_metadata::{CaseResult, CaseStatus, CoverageReport, FileCoverage};

    fn summary(shard_index: usize, passed: usize, failed: usize) -> ShardResultSummary {
        ShardResultSummary {
            shard_index,
            shard_count: 2,
            adapter_name: "pytest".to_owned(),
            result: RunResult {
                passed,
                failed,
                duration_ms: 100.0 * (shard_index + 1) as f64,
                test_cases: vec![CaseResult::new(
                    format!("case_{shard_index}"),
                    if failed == 0 {
                        CaseStatus::Passed
                    } else {
                        CaseStatus::Failed
                    },
                )],
                success: failed == 0,
                ..RunResult::default()
            },
        }
    }

    #[test]
    fn shard_result_is_written_and_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results/shard-1.json");

        let mut expected = summary(1, 3, 0);
        expected.result.coverage = Some(CoverageReport::from_files([FileCoverage::new(
            "src/auth.py",
        )]));
        write_shard_result(&path, &expected).expect("parent directory is created");

        assert_eq!(read_shard_result(&path).unwrap(), expected);
    }

    #[test]
    fn overwrite_existing_shard_result() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shard-0.json");
        write_shard_result(&path, &summary(0, 1, 0)).unwrap();
        write_shard_result(&path, &summary(0, 2, 0)).unwrap();
        assert_eq!(read_shard_result(&path).unwrap().result.passed, 2);
    }

    #[test]
    fn read_errors() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            read_shard_result(&missing),
            Err(ShardResultReadError::Read { .. })
        ));

        let garbage = dir.path().join("garbage.json");
        std::fs::write(&garbage, "{\"shard_index\": 0}").unwrap();
        assert!(matches!(
            read_shard_result(&garbage),
            Err(ShardResultReadError::Parse { .. })
        ));
    }

    #[test]
    fn plan_round_trip_and_validation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plan.json");
        let plan = PrioritizedTestPlan::from_scores(vec![
            RiskScore {
                file_path: "tests/test_b.py".into(),
                score: 0.4,
                reasons: vec!["propagated from src/b.py (0.40)".to_owned()],
            },
            RiskScore {
                file_path: "tests/test_a.py".into(),
                score: 0.8,
                reasons: vec!["propagated from src/a.py (0.80)".to_owned()],
            },
        ]);
        write_plan(&path, &plan).unwrap();
        assert_eq!(read_plan(&path).unwrap(), plan);

        // Hand-edited plans are checked.
        let mut summary = plan.to_summary();
        summary.test_files.reverse();
        std::fs::write(&path, serde_json::to_string(&summary).unwrap()).unwrap();
        assert!(matches!(
            read_plan(&path),
            Err(PlanReadError::Invalid { .. })
        ));
    }

    #[test]
    fn combine_in_shard_index_order() {
        let combined = combine_shard_results(vec![summary(1, 1, 1), summary(0, 2, 0)]);
        assert_eq!(combined.passed, 3);
        assert_eq!(combined.failed, 1);
        assert_eq!(combined.duration_ms, 200.0);
        assert!(!combined.success);
        let names: Vec<_> = combined.test_cases.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["case_0", "case_1"]);
    }

    #[test]
    fn combine_tolerates_inconsistent_metadata() {
        let mut other = summary(0, 1, 0);
        other.adapter_name = "vitest".to_owned();
        other.shard_count = 3;
        let combined = combine_shard_results(vec![summary(0, 1, 0), other]);
        assert_eq!(combined.passed, 2);
        assert!(combined.success);
    }
}
