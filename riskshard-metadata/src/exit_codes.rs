// Copyright (c) The riskshard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `riskshard` failures.
///
/// `riskshard` invocations may fail for a variety of reasons. This structure documents the exit
/// codes that may occur in case of expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum RiskshardExitCode {}

impl RiskshardExitCode {
    /// No errors occurred and riskshard exited normally.
    pub const OK: i32 = 0;

    /// No test files were found to schedule, but no other errors occurred.
    pub const NO_TESTS: i32 = 4;

    /// The requested shard index or shard count was invalid.
    pub const INVALID_SHARD: i32 = 91;

    /// A user issue happened while setting up a riskshard invocation: a config file, risk
    /// report, plan file or shard result file couldn't be read.
    pub const SETUP_ERROR: i32 = 96;

    /// The combined result of all shards was not successful.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// Writing data to stdout, stderr or an output file produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
