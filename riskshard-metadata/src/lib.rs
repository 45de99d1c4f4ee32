// Copyright (c) The riskshard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Machine-readable data contracts for riskshard.
//!
//! riskshard plans a test suite on a coordinator job, runs each shard on its own job, and combines
//! the shard results afterwards. The types in this crate are what travels between those jobs:
//!
//! * [`PrioritizedTestPlanSummary`]: the risk-ordered plan produced by the coordinator.
//! * [`ShardResultSummary`]: one shard's [`RunResult`], with optional [`CoverageReport`].
//! * [`RiskshardExitCode`]: documented exit codes for the `riskshard` binary.

mod coverage;
mod exit_codes;
mod plan;
mod run_result;
mod shard_result;

pub use coverage::*;
pub use exit_codes::*;
pub use plan::*;
pub use run_result::*;
pub use shard_result::*;
