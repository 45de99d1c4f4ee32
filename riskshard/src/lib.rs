// Copyright (c) The riskshard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Risk-ordered test sharding for CI.
//!
//! `riskshard` runs in three places in a CI pipeline:
//!
//! 1. a coordinator job runs `riskshard plan` to order test files by risk and write a plan file;
//! 2. each shard job runs `riskshard shard` to pick its slice of the plan, runs those tests, and
//!    writes a shard result file;
//! 3. a final job runs `riskshard combine` to merge the shard results into one verdict.
//!
//! The logic lives in `riskshard-runner`; this crate is the command-line front end.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::OutputWriter;
