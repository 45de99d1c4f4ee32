// Copyright (c) The riskshard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for riskshard: risk-ordered test sharding and shard result merging.
//!
//! The basic flow is:
//!
//! 1. On a coordinator job, [`mapper::TestSourceMapper`] maps each test file to the source files
//!    it exercises, and [`prioritize::prioritize`] turns a per-source-file risk report into a
//!    [`prioritize::PrioritizedTestPlan`].
//! 2. Each shard job takes its slice of the plan with [`partition::distribute`], and runs it.
//! 3. A final job combines the shard results with [`merge::merge_run_results`].
//!
//! The plan and the shard results travel between jobs as files; see [`shard_result`].

pub mod config;
pub mod discovery;
pub mod errors;
mod helpers;
pub mod mapper;
pub mod merge;
pub mod partition;
pub mod prioritize;
pub mod shard_result;

pub use helpers::plural;
