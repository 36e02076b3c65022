// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `conform` failures.
///
/// `conform` runs may fail for a variety of reasons. This structure documents the exit codes that
/// may occur in case of expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum ConformExitCode {}

impl ConformExitCode {
    /// No errors occurred and conform exited normally.
    pub const OK: i32 = 0;

    /// No tests were selected to run, but no other errors occurred.
    pub const NO_TESTS_RUN: i32 = 4;

    /// One or more tests did not pass.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// The fixture root could not be scanned.
    pub const SCAN_FAILED: i32 = 104;

    /// Writing data to stdout, stderr or a report file produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;

    /// A user issue happened while setting up a conform invocation.
    pub const SETUP_ERROR: i32 = 96;
}
