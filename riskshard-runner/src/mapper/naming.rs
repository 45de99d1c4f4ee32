// Copyright (c) The riskshard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Naming-convention matching.

use super::TestSourceMapper;
use camino::{Utf8Path, Utf8PathBuf};
use walkdir::WalkDir;

const JS_EXTENSIONS: &[&str] = &["ts", "js", "tsx", "jsx"];
const JS_TEST_MARKERS: &[&str] = &[".test", ".spec"];

/// Where to look for the source file named by a convention.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum SearchScope {
    /// The configured source roots, then the project root.
    SourceRoots,

    /// The directory containing the test file.
    TestDirectory,
}

/// Returns the source file name a test file's name points to, if any convention applies.
///
/// Supported conventions:
///
/// * `test_foo.py` and `foo_test.py` -> `foo.py`
/// * `foo.test.ts` and `foo.spec.js` -> `foo.ts` and `foo.js` (also `.tsx` and `.jsx`)
/// * `foo_test.go` -> `foo.go`, next to the test
fn source_name(test_file: &Utf8Path) -> Option<(String, SearchScope)> {
    let name = test_file.file_name()?;
    let extension = test_file.extension()?;

    match extension {
        "py" => {
            let candidate = name
                .strip_prefix("test_")
                .map(str::to_owned)
                .or_else(|| name.strip_suffix("_test.py").map(|stem| format!("{stem}.py")))?;
            // A file named just `test_.py` has nothing to point at.
            (candidate != ".py").then_some((candidate, SearchScope::SourceRoots))
        }
        ext if JS_EXTENSIONS.contains(&ext) => {
            let stem = test_file.file_stem()?;
            let base = JS_TEST_MARKERS
                .iter()
                .find_map(|marker| stem.strip_suffix(marker))?;
            (!base.is_empty()).then(|| (format!("{base}.{ext}"), SearchScope::SourceRoots))
        }
        "go" => {
            let stem = name.strip_suffix("_test.go")?;
            (!stem.is_empty()).then(|| (format!("{stem}.go"), SearchScope::TestDirectory))
        }
        _ => None,
    }
}

/// Finds source files for `test_path` (absolute and normalized) by naming convention.
///
/// At most one file is returned: the first match wins.
pub(super) fn find_sources(mapper: &TestSourceMapper, test_path: &Utf8Path) -> Vec<Utf8PathBuf> {
    let Some((name, scope)) = source_name(test_path) else {
        return Vec::new();
    };

    let found = match scope {
        SearchScope::SourceRoots => find_by_name(&name, mapper.search_roots()),
        SearchScope::TestDirectory => find_by_name(&name, test_path.parent()),
    };

    found
        .and_then(|path| mapper.report_path(&path))
        .into_iter()
        .collect()
}

/// Searches each directory recursively for a regular file called `name`, returning the first
/// match.
///
/// Entries are visited in file name order so that the result doesn't depend on the order the
/// filesystem returns them in.
fn find_by_name<'a>(
    name: &str,
    search_dirs: impl IntoIterator<Item = &'a Utf8Path>,
) -> Option<Utf8PathBuf> {
    search_dirs.into_iter().find_map(|dir| {
        if !dir.is_dir() {
            return None;
        }
        WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file() && entry.file_name() == name)
            .find_map(|entry| Utf8PathBuf::from_path_buf(entry.into_path()).ok())
    })
}
