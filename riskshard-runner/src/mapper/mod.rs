// Copyright (c) The riskshard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping test files to the source files they exercise.
//!
//! Two independent heuristics are used:
//!
//! 1. **Naming conventions**, such as `test_foo.py` -> `foo.py` or `foo.spec.ts` -> `foo.ts`. A
//!    match here is reported as [`MappingConfidence::ExactNameMatch`].
//! 2. **Import resolution**: the test's `import`/`require` statements are resolved to files on
//!    disk. Matches found only this way are reported as [`MappingConfidence::ImportMatch`].
//!
//! Both heuristics are best-effort. A test file that can't be read, or whose imports don't
//! resolve, simply produces fewer matches.

mod imports;
mod naming;

use crate::{
    config::MapperConfig,
    helpers::{absolute_normalized, normalize_lexically, relative_to_root},
};
use camino::{Utf8Path, Utf8PathBuf};
pub use riskshard_metadata::MappingConfidence;
use riskshard_metadata::TestMappingSummary;
use std::collections::HashSet;

/// The result of mapping a single test file to its source files.
#[derive(Clone, Debug, PartialEq)]
pub struct TestMapping {
    test_file: Utf8PathBuf,
    source_files: Vec<Utf8PathBuf>,
    confidence: MappingConfidence,
}

impl TestMapping {
    /// Creates a mapping with no source files.
    pub fn unmapped(test_file: impl Into<Utf8PathBuf>) -> Self {
        Self {
            test_file: test_file.into(),
            source_files: Vec::new(),
            confidence: MappingConfidence::Unmapped,
        }
    }

    /// Combines naming-convention and import matches.
    ///
    /// Naming matches come first, duplicates are dropped, and the confidence is that of the
    /// strongest method that produced a match.
    pub fn from_matches(
        test_file: impl Into<Utf8PathBuf>,
        naming_matches: impl IntoIterator<Item = Utf8PathBuf>,
        import_matches: impl IntoIterator<Item = Utf8PathBuf>,
    ) -> Self {
        let mut mapping = Self::unmapped(test_file);
        let mut seen = HashSet::new();

        for source in naming_matches {
            mapping.confidence = MappingConfidence::ExactNameMatch;
            if seen.insert(source.clone()) {
                mapping.source_files.push(source);
            }
        }
        for source in import_matches {
            if mapping.confidence == MappingConfidence::Unmapped {
                mapping.confidence = MappingConfidence::ImportMatch;
            }
            if seen.insert(source.clone()) {
                mapping.source_files.push(source);
            }
        }

        mapping
    }

    /// Returns the test file, as given to the mapper.
    pub fn test_file(&self) -> &Utf8Path {
        &self.test_file
    }

    /// Returns the source files the test exercises, naming matches first.
    pub fn source_files(&self) -> &[Utf8PathBuf] {
        &self.source_files
    }

    /// Returns how the mapping was established.
    pub fn confidence(&self) -> MappingConfidence {
        self.confidence
    }

    /// Returns the serializable form of this mapping.
    pub fn to_summary(&self) -> TestMappingSummary {
        TestMappingSummary {
            test_file: self.test_file.clone(),
            source_files: self.source_files.clone(),
            confidence: self.confidence,
            confidence_score: self.confidence.score(),
        }
    }
}

/// Maps test files to the source files they cover, using naming conventions and import
/// resolution.
///
/// The mapper holds no mutable state, so each [`map_one`](Self::map_one) call is independent.
#[derive(Clone, Debug)]
pub struct TestSourceMapper {
    project_root: Utf8PathBuf,
    source_roots: Vec<Utf8PathBuf>,
    contain_imports: bool,
}

impl TestSourceMapper {
    /// Creates a new mapper rooted at `project_root`.
    ///
    /// A relative `project_root` is resolved against the current directory.
    pub fn new(project_root: impl AsRef<Utf8Path>, config: &MapperConfig) -> Self {
        let project_root = absolute_normalized(project_root.as_ref());
        let source_roots = config
            .source_roots
            .iter()
            .map(|root| normalize_lexically(&project_root.join(root)))
            .collect();
        Self {
            project_root,
            source_roots,
            contain_imports: config.contain_imports,
        }
    }

    /// Returns the project root.
    pub fn project_root(&self) -> &Utf8Path {
        &self.project_root
    }

    /// Maps a single test file to its source files.
    ///
    /// Relative paths are resolved against the project root. This never fails: an unmappable or
    /// unreadable test file produces a mapping with [`MappingConfidence::Unmapped`].
    pub fn map_one(&self, test_file: &Utf8Path) -> TestMapping {
        let test_path = self.absolute(test_file);

        let naming_matches = naming::find_sources(self, &test_path);
        let import_matches = imports::find_sources(self, &test_path);

        let mapping = TestMapping::from_matches(test_file, naming_matches, import_matches);
        tracing::debug!(
            test_file = %test_file,
            confidence = %mapping.confidence(),
            sources = ?mapping.source_files(),
            "mapped test file",
        );
        mapping
    }

    /// Maps each test file independently.
    pub fn map_all<I>(&self, test_files: I) -> Vec<TestMapping>
    where
        I: IntoIterator,
        I::Item: AsRef<Utf8Path>,
    {
        test_files
            .into_iter()
            .map(|test_file| self.map_one(test_file.as_ref()))
            .collect()
    }

    // ---
    // Helper methods
    // ---

    fn absolute(&self, path: &Utf8Path) -> Utf8PathBuf {
        normalize_lexically(&self.project_root.join(path))
    }

    /// Directories searched for source files by name or dotted module path: the configured
    /// source roots, then the project root.
    fn search_roots(&self) -> impl Iterator<Item = &Utf8Path> {
        self.source_roots
            .iter()
            .map(|root| root.as_path())
            .chain(std::iter::once(self.project_root.as_path()))
    }

    /// Converts an absolute, normalized path to the form reported in mappings.
    ///
    /// Paths under the project root are made relative to it. Paths outside it are kept absolute,
    /// or dropped if `contain_imports` is set.
    fn report_path(&self, path: &Utf8Path) -> Option<Utf8PathBuf> {
        match relative_to_root(&self.project_root, path) {
            Some(rel) => Some(rel),
            None if self.contain_imports => {
                tracing::debug!(path = %path, "dropping source outside the project root");
                None
            }
            None => Some(path.to_owned()),
        }
    }
}
