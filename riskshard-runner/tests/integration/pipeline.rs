// Copyright (c) The riskshard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use camino::Utf8PathBuf;
use color_eyre::eyre::{Result, ensure};
use pretty_assertions::assert_eq;
use riskshard_metadata::{MappingConfidence, ShardResultSummary};
use riskshard_runner::{
    config::RiskshardConfig,
    discovery::discover_with_config,
    mapper::TestSourceMapper,
    partition::{distribute, distribute_all},
    prioritize::{DEFAULT_RISK_SCORE, RiskReport, prioritize},
    shard_result::{
        combine_shard_results, read_plan, read_shard_result, write_plan, write_shard_result,
    },
};

#[test]
fn discover_and_map() -> Result<()> {
    test_init();
    let project = FixtureProject::new()?;
    let config = RiskshardConfig::from_sources(project.root(), None)?;

    let test_files = discover_with_config(project.root(), config.discovery())?;
    assert_eq!(
        test_files,
        [
            "server/handler_test.go",
            "tests/test_auth.py",
            "tests/test_checkout.py",
            "tests/test_misc.py",
            "web/cart.test.ts",
        ]
    );

    let mapper = TestSourceMapper::new(project.root(), config.mapper());
    let mappings = mapper.map_all(&test_files);
    let summary: Vec<_> = mappings
        .iter()
        .map(|m| {
            (
                m.test_file().as_str(),
                m.confidence(),
                m.source_files()
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>(),
            )
        })
        .collect();

    assert_eq!(
        summary,
        [
            (
                "server/handler_test.go",
                MappingConfidence::ExactNameMatch,
                vec!["server/handler.go"],
            ),
            (
                "tests/test_auth.py",
                MappingConfidence::ExactNameMatch,
                vec!["src/app/auth.py", "src/app/util.py"],
            ),
            (
                "tests/test_checkout.py",
                MappingConfidence::ImportMatch,
                vec!["tests/helpers.py", "src/app/billing.py"],
            ),
            ("tests/test_misc.py", MappingConfidence::Unmapped, vec![]),
            (
                "web/cart.test.ts",
                MappingConfidence::ExactNameMatch,
                vec!["src/web/cart.ts"],
            ),
        ]
    );
    Ok(())
}

#[test]
fn plan_shard_and_combine() -> Result<()> {
    test_init();
    let project = FixtureProject::new()?;
    let config = RiskshardConfig::from_sources(project.root(), None)?;
    project.write(
        "risk.json",
        r#"{"src/app/billing.py": 0.95, "src/app/auth.py": 0.6, "src/app/util.py": 0.9, "server/handler.go": 0.2}"#,
    )?;

    // Coordinator: discover, prioritize, write the plan.
    let test_files = discover_with_config(project.root(), config.discovery())?;
    let report = RiskReport::from_json_file(project.root().join("risk.json"))?;
    let mapper = TestSourceMapper::new(project.root(), config.mapper());
    let plan = prioritize(&test_files, Some(&report), Some(&mapper));

    assert_eq!(
        plan.test_files(),
        [
            "tests/test_checkout.py",
            "tests/test_auth.py",
            "tests/test_misc.py",
            "web/cart.test.ts",
            "server/handler_test.go",
        ]
    );
    let scores: Vec<f64> = plan.risk_scores().iter().map(|s| s.score).collect();
    assert_eq!(scores, [0.95, 0.9, DEFAULT_RISK_SCORE, DEFAULT_RISK_SCORE, 0.2]);

    let plan_path = project.root().join("target/riskshard/plan.json");
    write_plan(&plan_path, &plan)?;

    // Shard jobs: read the plan, take a slice, run it and report.
    let shard_count = 2;
    let mut result_paths = Vec::new();
    for shard_index in 0..shard_count {
        let plan = read_plan(&plan_path)?;
        let files = distribute(&plan, shard_index, shard_count)?;
        let result = simulate_shard(&files, &["tests/test_auth.py"]);

        let path = project
            .root()
            .join(format!("target/riskshard/shard-{shard_index}.json"));
        write_shard_result(
            &path,
            &ShardResultSummary {
                shard_index,
                shard_count,
                adapter_name: "pytest".to_owned(),
                result,
            },
        )?;
        result_paths.push(path);
    }

    let assignments = distribute_all(&plan, shard_count)?;
    assert_eq!(
        assignments[0].test_files(),
        [
            "tests/test_checkout.py",
            "tests/test_misc.py",
            "server/handler_test.go",
        ]
    );
    assert_eq!(
        assignments[1].test_files(),
        ["tests/test_auth.py", "web/cart.test.ts"]
    );

    // Combine job: read results in reverse to check that order doesn't matter.
    let summaries = result_paths
        .iter()
        .rev()
        .map(read_shard_result)
        .collect::<Result<Vec<_>, _>>()?;
    let combined = combine_shard_results(summaries);

    ensure!(!combined.success, "test_auth.py failed, so the run failed");
    assert_eq!(combined.passed, 4);
    assert_eq!(combined.failed, 1);
    assert_eq!(combined.duration_ms, 30.0);

    let case_files: Vec<Utf8PathBuf> = combined
        .test_cases
        .iter()
        .filter_map(|case| case.file_path.clone())
        .collect();
    let mut expected = assignments[0].test_files().to_vec();
    expected.extend_from_slice(assignments[1].test_files());
    assert_eq!(case_files, expected);

    // Shard 0 ran three files and shard 1 two, so the max execution count is 3.
    let coverage = combined.coverage.expect("both shards reported coverage");
    let auth = coverage.file("src/app/auth.py").expect("auth.py covered");
    assert_eq!(auth.lines.len(), 1);
    assert_eq!(auth.lines[0].execution_count, 3);
    Ok(())
}
