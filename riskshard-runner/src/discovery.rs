// Copyright (c) The riskshard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discovering test files in a project.

use crate::{
    config::DiscoveryConfig,
    errors::DiscoverTestsError,
    helpers::{plural, to_slash_path},
};
use camino::{Utf8Path, Utf8PathBuf};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;
use walkdir::WalkDir;

/// Finds test files under `project_root` using the given discovery settings.
pub fn discover_with_config(
    project_root: &Utf8Path,
    config: &DiscoveryConfig,
) -> Result<Vec<Utf8PathBuf>, DiscoverTestsError> {
    discover_test_files(project_root, &config.test_patterns, &config.ignore_dirs)
}

/// Finds test files under `project_root` that match any of `patterns`.
///
/// Patterns are globs matched against paths relative to the project root, with `/` separators;
/// `*` doesn't cross directory boundaries but `**` does. Directories whose name is in
/// `ignore_dirs` are not descended into.
///
/// Returns a sorted list of unique paths, relative to the project root.
pub fn discover_test_files(
    project_root: &Utf8Path,
    patterns: &[impl AsRef<str>],
    ignore_dirs: &[impl AsRef<str>],
) -> Result<Vec<Utf8PathBuf>, DiscoverTestsError> {
    let glob_set = build_glob_set(patterns)?;
    let ignore_dirs: BTreeSet<&str> = ignore_dirs.iter().map(|dir| dir.as_ref()).collect();

    let walker = WalkDir::new(project_root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || entry
                    .file_name()
                    .to_str()
                    .is_none_or(|name| !ignore_dirs.contains(name))
        });

    let mut found = BTreeSet::new();
    for entry in walker {
        let entry = entry.map_err(|error| DiscoverTestsError::Walk {
            root: project_root.to_owned(),
            error,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = Utf8PathBuf::from_path_buf(entry.into_path())
            .map_err(|path| DiscoverTestsError::NonUtf8Path { path })?;
        let Ok(rel) = path.strip_prefix(project_root) else {
            continue;
        };
        let rel = to_slash_path(rel);
        if glob_set.is_match(rel.as_str()) {
            found.insert(rel);
        }
    }

    tracing::debug!(
        project_root = %project_root,
        "discovered {} {}",
        found.len(),
        plural::test_files_str(found.len()),
    );
    Ok(found.into_iter().collect())
}

fn build_glob_set(patterns: &[impl AsRef<str>]) -> Result<GlobSet, DiscoverTestsError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|error| DiscoverTestsError::InvalidPattern {
                pattern: pattern.to_owned(),
                error,
            })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|error| DiscoverTestsError::InvalidPattern {
            pattern: patterns
                .iter()
                .map(|p| p.as_ref())
                .collect::<Vec<_>>()
                .join(", "),
            error,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RiskshardConfig;
    use camino_tempfile::tempdir;
    use pretty_assertions::assert_eq;

    #[test]
    fn discovers_with_default_config() {
        let dir = tempdir().unwrap();
        for file in [
            "test_root.py",
            "tests/test_auth.py",
            "tests/conftest.py",
            "pkg/db_test.py",
            "web/app.test.ts",
            "web/Button.spec.tsx",
            "web/app.ts",
            "node_modules/lib/index.test.js",
            "server/handler_test.go",
            "src/auth.py",
        ] {
            let path = dir.path().join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, "").unwrap();
        }

        let config = RiskshardConfig::default_config(dir.path());
        let found = discover_with_config(dir.path(), config.discovery()).unwrap();
        assert_eq!(
            found,
            [
                "pkg/db_test.py",
                "server/handler_test.go",
                "test_root.py",
                "tests/test_auth.py",
                "web/Button.spec.tsx",
                "web/app.test.ts",
            ]
        );
    }

    #[test]
    fn overlapping_patterns_are_deduplicated() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("tests")).unwrap();
        std::fs::write(dir.path().join("tests/test_a.py"), "").unwrap();

        let found = discover_test_files(
            dir.path(),
            &["**/test_*.py", "tests/*.py"],
            &[] as &[&str],
        )
        .unwrap();
        assert_eq!(found, ["tests/test_a.py"]);
    }

    #[test]
    fn star_does_not_cross_directories() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("tests/unit")).unwrap();
        std::fs::write(dir.path().join("tests/unit/test_a.py"), "").unwrap();

        let found = discover_test_files(dir.path(), &["tests/*.py"], &[] as &[&str]).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn invalid_pattern() {
        let dir = tempdir().unwrap();
        let err = discover_test_files(dir.path(), &["tests/[.py"], &[] as &[&str]).unwrap_err();
        assert!(
            matches!(&err, DiscoverTestsError::InvalidPattern { pattern, .. } if pattern == "tests/[.py"),
            "unexpected error: {err}"
        );
    }
}
