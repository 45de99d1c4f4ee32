// Copyright (c) The riskshard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::RunResult;
use serde::{Deserialize, Serialize};

/// The result of one shard, as exchanged between a shard job and the job that combines results.
///
/// On the wire this is a flat JSON object: the [`RunResult`] fields sit next to the shard
/// metadata.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ShardResultSummary {
    /// The zero-based index of the shard that produced this result.
    pub shard_index: usize,

    /// The total number of shards in the run.
    pub shard_count: usize,

    /// The name of the test framework adapter that ran the shard, e.g. `pytest`.
    pub adapter_name: String,

    /// The shard's run result.
    #[serde(flatten)]
    pub result: RunResult,
}
