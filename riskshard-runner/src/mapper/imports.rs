// Copyright (c) The riskshard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Import-statement resolution.
//!
//! Imports are found with regular expressions rather than a real parser, and each one is turned
//! into a list of candidate paths that are probed on disk. There's no module system here: a
//! candidate counts if and only if it's an existing regular file.

use super::TestSourceMapper;
use crate::helpers::normalize_lexically;
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::{collections::HashSet, sync::LazyLock};

static PYTHON_FROM_IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*from\s+([\w.]+)\s+import\b").unwrap());
static PYTHON_IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*import\s+([\w.]+)").unwrap());
static JS_IMPORT_FROM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"import\s+.*?\s+from\s+['"]([^'"]+)['"]"#).unwrap());
static JS_REQUIRE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"require\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap());

/// Suffixes tried, in order, after a relative JS/TS specifier.
const JS_PROBE_SUFFIXES: &[&str] = &[
    "",
    ".ts",
    ".js",
    ".tsx",
    ".jsx",
    "/index.ts",
    "/index.js",
    "/index.tsx",
    "/index.jsx",
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Language {
    Python,
    JavaScript,
}

impl Language {
    fn from_path(path: &Utf8Path) -> Option<Self> {
        match path.extension()? {
            "py" => Some(Self::Python),
            "ts" | "js" | "tsx" | "jsx" => Some(Self::JavaScript),
            _ => None,
        }
    }
}

/// Finds source files for `test_path` (absolute and normalized) by resolving its imports.
///
/// Results are in statement order (for Python, all `from` imports before plain `import`s) and
/// deduplicated.
pub(super) fn find_sources(mapper: &TestSourceMapper, test_path: &Utf8Path) -> Vec<Utf8PathBuf> {
    let Some(language) = Language::from_path(test_path) else {
        return Vec::new();
    };

    let contents = match std::fs::read(test_path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(error) => {
            tracing::debug!(
                test_file = %test_path,
                %error,
                "unable to read test file, skipping import analysis",
            );
            return Vec::new();
        }
    };

    let resolved = match language {
        Language::Python => python_imports(&contents)
            .filter_map(|module| resolve_python_module(mapper, test_path, module))
            .collect::<Vec<_>>(),
        Language::JavaScript => js_imports(&contents)
            .filter_map(|specifier| resolve_js_specifier(test_path, specifier))
            .collect(),
    };

    let mut seen = HashSet::new();
    resolved
        .into_iter()
        .filter_map(|path| mapper.report_path(&path))
        .filter(|path| seen.insert(path.clone()))
        .collect()
}

fn python_imports(contents: &str) -> impl Iterator<Item = &str> {
    [&*PYTHON_FROM_IMPORT_RE, &*PYTHON_IMPORT_RE]
        .into_iter()
        .flat_map(move |re| captures(re, contents))
}

fn js_imports(contents: &str) -> impl Iterator<Item = &str> {
    [&*JS_IMPORT_FROM_RE, &*JS_REQUIRE_RE]
        .into_iter()
        .flat_map(move |re| captures(re, contents))
}

fn captures<'a>(re: &'a Regex, contents: &'a str) -> impl Iterator<Item = &'a str> {
    re.captures_iter(contents)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Resolves a dotted Python module name to a file.
///
/// `a.b` is probed as `a/b.py`, then `a/b/__init__.py`, under each search root in turn. A module
/// with leading dots is relative: one dot is the test file's own directory, and each extra dot
/// goes up one level.
fn resolve_python_module(
    mapper: &TestSourceMapper,
    test_path: &Utf8Path,
    module: &str,
) -> Option<Utf8PathBuf> {
    let rest = module.trim_start_matches('.');
    let level = module.len() - rest.len();
    let module_path: Utf8PathBuf = rest.split('.').filter(|part| !part.is_empty()).collect();

    if level > 0 {
        let mut base = test_path.parent()?.to_owned();
        for _ in 1..level {
            base.push("..");
        }
        let base = normalize_lexically(&base);
        return python_candidates(&base, &module_path).find(|path| path.is_file());
    }

    if module_path.as_str().is_empty() {
        return None;
    }
    mapper
        .search_roots()
        .flat_map(|root| python_candidates(root, &module_path))
        .find(|path| path.is_file())
}

fn python_candidates(
    base: &Utf8Path,
    module_path: &Utf8Path,
) -> impl Iterator<Item = Utf8PathBuf> + use<> {
    let module_base = base.join(module_path);
    let as_file = if module_path.as_str().is_empty() {
        // `from . import x` only names the package itself.
        None
    } else {
        Some(module_base.with_extension("py"))
    };
    as_file
        .into_iter()
        .chain(std::iter::once(module_base.join("__init__.py")))
}

/// Resolves a relative JS/TS specifier such as `../lib/auth` to a file.
///
/// Bare specifiers (package names) are ignored.
fn resolve_js_specifier(test_path: &Utf8Path, specifier: &str) -> Option<Utf8PathBuf> {
    if !specifier.starts_with('.') {
        return None;
    }
    let target = normalize_lexically(&test_path.parent()?.join(specifier));
    JS_PROBE_SUFFIXES
        .iter()
        .map(|suffix| Utf8PathBuf::from(format!("{target}{suffix}")))
        .find(|candidate| candidate.is_file())
}
