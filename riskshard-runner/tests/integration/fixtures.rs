// Copyright (c) The riskshard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8Path;
use camino_tempfile::Utf8TempDir;
use color_eyre::eyre::Result;
use indoc::indoc;
use riskshard_metadata::{
    CaseResult, CaseStatus, CoverageReport, FileCoverage, LineCoverage, RunResult,
};
use std::sync::Once;

pub(crate) fn test_init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        // Ignore errors: another test binary harness may have installed a hook already.
        _ = color_eyre::install();
        _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// A small polyglot project: Python, TypeScript and Go tests with their sources.
pub(crate) struct FixtureProject {
    dir: Utf8TempDir,
}

impl FixtureProject {
    pub(crate) fn new() -> Result<Self> {
        let dir = camino_tempfile::Builder::new()
            .prefix("riskshard-fixture-")
            .tempdir()?;
        let project = Self { dir };

        project.write("src/app/__init__.py", "")?;
        project.write("src/app/auth.py", "def login(): ...\n")?;
        project.write("src/app/billing.py", "def charge(): ...\n")?;
        project.write("src/app/util.py", "def slug(): ...\n")?;
        project.write(
            "tests/test_auth.py",
            indoc! {"
                from app.auth import login
                from app.util import slug
            "},
        )?;
        project.write(
            "tests/test_checkout.py",
            indoc! {"
                import app.billing
                from .helpers import make_cart
            "},
        )?;
        project.write("tests/helpers.py", "def make_cart(): ...\n")?;
        project.write("tests/test_misc.py", "import os\n")?;

        project.write("src/web/cart.ts", "export const cart = 1;\n")?;
        project.write(
            "web/cart.test.ts",
            "import { cart } from '../src/web/cart';\n",
        )?;

        project.write("server/handler.go", "package server\n")?;
        project.write("server/handler_test.go", "package server\n")?;

        project.write("node_modules/dep/dep.test.js", "")?;
        Ok(project)
    }

    pub(crate) fn root(&self) -> &Utf8Path {
        self.dir.path()
    }

    pub(crate) fn write(&self, rel: &str, contents: &str) -> Result<()> {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// What a shard job would report after running its files, one passing case per file except for
/// files listed in `failing`.
pub(crate) fn simulate_shard(files: &[impl AsRef<Utf8Path>], failing: &[&str]) -> RunResult {
    let mut result = RunResult::default();
    let mut coverage = FileCoverage::new("src/app/auth.py");

    for (i, file) in files.iter().enumerate() {
        let file = file.as_ref();
        let status = if failing.contains(&file.as_str()) {
            result.failed += 1;
            CaseStatus::Failed
        } else {
            result.passed += 1;
            CaseStatus::Passed
        };
        let mut case = CaseResult::new(format!("{file}::case"), status);
        case.file_path = Some(file.to_owned());
        case.duration_ms = 10.0;
        result.test_cases.push(case);
        coverage.lines.push(LineCoverage {
            line_number: 1,
            execution_count: i as u64 + 1,
        });
    }

    result.duration_ms = 10.0 * files.len() as f64;
    result.success = result.has_no_failures();
    result.coverage = Some(CoverageReport::from_files([coverage]));
    result
}
