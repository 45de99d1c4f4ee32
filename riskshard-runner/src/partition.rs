// Copyright (c) The riskshard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Support for partitioning test files across several machines.
//!
//! Files are dealt out round-robin. Applied to a [`PrioritizedTestPlan`], which is sorted by
//! descending risk, this gives every shard a mix of high, medium and low risk tests rather than
//! concentrating the riskiest tests in the first shard.

use crate::{errors::ShardSpecError, helpers::plural, prioritize::PrioritizedTestPlan};
use camino::{Utf8Path, Utf8PathBuf};
use std::{fmt, str::FromStr};

/// A validated shard selector: shard `index` out of `count`, counting from 0.
///
/// Parsed from strings of the form `I/N`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ShardSpec {
    index: usize,
    count: usize,
}

impl ShardSpec {
    /// Creates a new shard selector.
    ///
    /// Returns an error if `count` is 0 or `index` is not less than `count`. Out-of-range values
    /// are never clamped.
    pub fn new(index: usize, count: usize) -> Result<Self, ShardSpecError> {
        if count == 0 {
            return Err(ShardSpecError::new(
                None,
                "shard count must be at least 1, got 0",
            ));
        }
        if index >= count {
            return Err(ShardSpecError::new(
                None,
                format!("shard index {index} must be less than shard count {count}"),
            ));
        }
        Ok(Self { index, count })
    }

    /// Returns the zero-based index of this shard.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the total number of shards.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Creates a new [`Partitioner`] for this shard.
    pub fn build(&self) -> Box<dyn Partitioner> {
        Box::new(RoundRobinPartitioner::new(self.index, self.count))
    }
}

impl fmt::Display for ShardSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index, self.count)
    }
}

impl FromStr for ShardSpec {
    type Err = ShardSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const EXPECTED_FORMAT: &str = "I/N";

        let (index_str, count_str) = s.split_once('/').ok_or_else(|| {
            ShardSpecError::new(
                Some(EXPECTED_FORMAT),
                format!("expected input '{s}' to be in the format I/N"),
            )
        })?;

        let index: usize = index_str.parse().map_err(|err| {
            ShardSpecError::new(
                Some(EXPECTED_FORMAT),
                format!("failed to parse shard index '{index_str}': {err}"),
            )
        })?;
        let count: usize = count_str.parse().map_err(|err| {
            ShardSpecError::new(
                Some(EXPECTED_FORMAT),
                format!("failed to parse shard count '{count_str}': {err}"),
            )
        })?;

        Self::new(index, count)
            .map_err(|err| ShardSpecError::new(Some(EXPECTED_FORMAT), err.message().to_owned()))
    }
}

/// Decides, file by file, whether a file belongs to a shard.
///
/// Partitioners may be stateful: files must be presented in plan order, each exactly once.
pub trait Partitioner: fmt::Debug {
    /// Returns true if the given test file matches the partition.
    fn file_matches(&mut self, test_file: &Utf8Path) -> bool;
}

#[derive(Clone, Debug)]
struct RoundRobinPartitioner {
    index: usize,
    count: usize,
    curr: usize,
}

impl RoundRobinPartitioner {
    fn new(index: usize, count: usize) -> Self {
        Self {
            index,
            count,
            curr: 0,
        }
    }
}

impl Partitioner for RoundRobinPartitioner {
    fn file_matches(&mut self, _test_file: &Utf8Path) -> bool {
        let matches = self.curr == self.index;
        self.curr = (self.curr + 1) % self.count;
        matches
    }
}

/// The test files assigned to one shard.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ShardAssignment {
    spec: ShardSpec,
    test_files: Vec<Utf8PathBuf>,
}

impl ShardAssignment {
    /// Returns the shard these files are assigned to.
    pub fn spec(&self) -> ShardSpec {
        self.spec
    }

    /// Returns the assigned test files, in plan order.
    pub fn test_files(&self) -> &[Utf8PathBuf] {
        &self.test_files
    }

    /// Consumes the assignment, returning the test files.
    pub fn into_test_files(self) -> Vec<Utf8PathBuf> {
        self.test_files
    }
}

/// Returns the files from `files` that belong to the shard described by `spec`.
///
/// The file at position `i` goes to shard `i % count`. Order is preserved.
pub fn split_into_shards<P: AsRef<Utf8Path>>(files: &[P], spec: ShardSpec) -> Vec<Utf8PathBuf> {
    let mut partitioner = spec.build();
    files
        .iter()
        .map(|file| file.as_ref())
        .filter(|file| partitioner.file_matches(file))
        .map(ToOwned::to_owned)
        .collect()
}

/// Returns the test files in `plan` that belong to shard `shard_index` of `shard_count`.
pub fn distribute(
    plan: &PrioritizedTestPlan,
    shard_index: usize,
    shard_count: usize,
) -> Result<Vec<Utf8PathBuf>, ShardSpecError> {
    let spec = ShardSpec::new(shard_index, shard_count)?;
    let files = split_into_shards(plan.test_files(), spec);
    tracing::debug!(
        shard = %spec,
        "assigned {} of {} {}",
        files.len(),
        plan.len(),
        plural::test_files_str(plan.len()),
    );
    Ok(files)
}

/// Returns the assignment for every shard at once, in shard index order.
pub fn distribute_all(
    plan: &PrioritizedTestPlan,
    shard_count: usize,
) -> Result<Vec<ShardAssignment>, ShardSpecError> {
    // Validates the count.
    ShardSpec::new(0, shard_count)?;

    let mut shards: Vec<Vec<Utf8PathBuf>> = vec![Vec::new(); shard_count];
    for (position, test_file) in plan.test_files().iter().enumerate() {
        shards[position % shard_count].push(test_file.clone());
    }

    tracing::info!(
        "distributed {} {} across {} {}",
        plan.len(),
        plural::test_files_str(plan.len()),
        shard_count,
        plural::shards_str(shard_count),
    );

    Ok(shards
        .into_iter()
        .enumerate()
        .map(|(index, test_files)| ShardAssignment {
            spec: ShardSpec {
                index,
                count: shard_count,
            },
            test_files,
        })
        .collect())
}
