// Copyright (c) The riskshard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! General support code for riskshard-runner.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};

/// Utilities for pluralizing various words based on count or plurality.
pub mod plural {
    /// Returns "test file" if `count` is 1, otherwise "test files".
    pub fn test_files_str(count: usize) -> &'static str {
        if count == 1 { "test file" } else { "test files" }
    }

    /// Returns "shard" if `count` is 1, otherwise "shards".
    pub fn shards_str(count: usize) -> &'static str {
        if count == 1 { "shard" } else { "shards" }
    }

    /// Returns "test" if `count` is 1, otherwise "tests".
    pub fn tests_str(count: usize) -> &'static str {
        if count == 1 { "test" } else { "tests" }
    }
}

/// Resolves `.` and `..` components without touching the filesystem.
///
/// `..` at the root of an absolute path is dropped, matching how the OS treats `/..`. Leading
/// `..` components of a relative path are kept.
pub(crate) fn normalize_lexically(path: &Utf8Path) -> Utf8PathBuf {
    let mut out = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                match out.components().next_back() {
                    Some(Utf8Component::Normal(_)) => {
                        out.pop();
                    }
                    Some(Utf8Component::RootDir | Utf8Component::Prefix(_)) => {}
                    Some(Utf8Component::ParentDir | Utf8Component::CurDir) | None => {
                        out.push("..");
                    }
                }
            }
            other => out.push(other.as_str()),
        }
    }
    out
}

/// Makes `path` absolute against the current directory, then normalizes it lexically.
///
/// A relative path like `.` or `..` would otherwise normalize to an empty or parent-relative
/// path, which can't be searched or used as a containment boundary.
pub(crate) fn absolute_normalized(path: &Utf8Path) -> Utf8PathBuf {
    if path.is_relative() {
        match std::env::current_dir()
            .ok()
            .and_then(|dir| Utf8PathBuf::from_path_buf(dir).ok())
        {
            Some(cwd) => return normalize_lexically(&cwd.join(path)),
            None => {
                tracing::warn!(
                    path = %path,
                    "current directory is unavailable or not UTF-8, using relative path as is",
                );
            }
        }
    }
    normalize_lexically(path)
}

/// Returns `path` relative to `root` with `/` separators, or `None` if `path` is not under
/// `root`. Both paths must already be normalized.
pub(crate) fn relative_to_root(root: &Utf8Path, path: &Utf8Path) -> Option<Utf8PathBuf> {
    let rel = path.strip_prefix(root).ok()?;
    Some(to_slash_path(rel))
}

/// Joins the components of `path` with `/`, regardless of platform.
pub(crate) fn to_slash_path(path: &Utf8Path) -> Utf8PathBuf {
    let mut out = String::with_capacity(path.as_str().len());
    for component in path.components() {
        match component {
            Utf8Component::RootDir => out.push('/'),
            Utf8Component::Prefix(prefix) => out.push_str(prefix.as_str()),
            other => {
                if !out.is_empty() && !out.ends_with('/') {
                    out.push('/');
                }
                out.push_str(other.as_str());
            }
        }
    }
    Utf8PathBuf::from(out)
}
