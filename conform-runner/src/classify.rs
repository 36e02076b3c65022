// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Comparing actual output against golden files.
//!
//! Classification runs an ordered list of checks over the two streams. Each check either has no
//! opinion (it returns [`TestStatus::NotStarted`]) or fixes a terminal status, and the first
//! terminal status wins. Later checks never run once an earlier one has decided, so a stdout
//! failure is never downgraded by what stderr looks like.
//!
//! Comparison is always exact, byte for byte. Diffs (see [`crate::diff`]) are for display only.

use crate::errors::MalformedFixtureError;
use bstr::ByteSlice;
use regex::bytes::Regex;
use serde::Serialize;
use std::{fmt, sync::LazyLock};

/// The status of a single test within a generation.
///
/// A test starts out as [`NotStarted`](Self::NotStarted) and moves to exactly one of the other
/// states, where it stays until the next generation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestStatus {
    /// The test has not finished yet.
    NotStarted,

    /// Both streams matched.
    Passed,

    /// stdout mismatched, or a stream without a golden file produced output.
    Failed,

    /// stderr mismatched and the expected error code is missing from actual stderr.
    DiffError,

    /// stderr mismatched but carries the expected error code.
    Almost,

    /// The test could not be executed or its output could not be read.
    ExecFailed,
}

impl TestStatus {
    /// Returns the status as a static string, e.g. `DIFF_ERROR`.
    pub fn to_static_str(self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::DiffError => "DIFF_ERROR",
            Self::Almost => "ALMOST",
            Self::ExecFailed => "EXEC_FAILED",
        }
    }

    /// Returns true if the test has left [`NotStarted`](Self::NotStarted).
    pub fn is_finished(self) -> bool {
        !matches!(self, Self::NotStarted)
    }

    /// Returns true if the test passed.
    pub fn is_success(self) -> bool {
        matches!(self, Self::Passed)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_static_str())
    }
}

/// The bytes compared by [`classify`].
///
/// `None` for an expected stream means the golden file does not exist, which requires the actual
/// stream to be empty.
#[derive(Clone, Copy, Debug)]
pub struct ClassifyInput<'a> {
    /// Actual stdout.
    pub actual_stdout: &'a [u8],

    /// Actual stderr.
    pub actual_stderr: &'a [u8],

    /// Golden stdout, if present.
    pub expected_stdout: Option<&'a [u8]>,

    /// Golden stderr, if present.
    pub expected_stderr: Option<&'a [u8]>,
}

/// The outcome of classifying a test.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Verdict {
    /// The final status. Never [`TestStatus::NotStarted`] when returned from [`classify`].
    pub status: TestStatus,

    /// A harness warning about the fixture itself.
    pub warning: Option<MalformedFixtureError>,
}

impl Verdict {
    const NO_OPINION: Self = Self::new(TestStatus::NotStarted);

    const fn new(status: TestStatus) -> Self {
        Self {
            status,
            warning: None,
        }
    }
}

type Check = fn(&ClassifyInput<'_>) -> Verdict;

/// Checks in decreasing order of precedence.
static CHECKS: [Check; 2] = [check_stdout, check_stderr];

/// Classifies a test's output.
///
/// This is a pure function of its input.
pub fn classify(input: &ClassifyInput<'_>) -> Verdict {
    CHECKS
        .iter()
        .map(|check| check(input))
        .find(|verdict| verdict.status.is_finished())
        .unwrap_or(Verdict::new(TestStatus::Passed))
}

fn check_stdout(input: &ClassifyInput<'_>) -> Verdict {
    if matches_or_empty(input.actual_stdout, input.expected_stdout) {
        Verdict::NO_OPINION
    } else {
        Verdict::new(TestStatus::Failed)
    }
}

fn check_stderr(input: &ClassifyInput<'_>) -> Verdict {
    let actual = input.actual_stderr;
    match input.expected_stderr {
        Some(expected) if expected == actual => Verdict::NO_OPINION,
        Some(expected) => match error_code(expected) {
            Some(code) if actual.find(code).is_some() => Verdict::new(TestStatus::Almost),
            Some(_) => Verdict::new(TestStatus::DiffError),
            None => Verdict {
                status: TestStatus::DiffError,
                warning: Some(MalformedFixtureError::new(expected)),
            },
        },
        None if actual.is_empty() => Verdict::NO_OPINION,
        None => Verdict::new(TestStatus::Failed),
    }
}

fn matches_or_empty(actual: &[u8], expected: Option<&[u8]>) -> bool {
    match expected {
        Some(expected) => actual == expected,
        None => actual.is_empty(),
    }
}

/// Returns the first error code in `expected`: `E` and four digits, followed by `:`.
///
/// The returned code excludes the trailing `:`.
pub fn error_code(expected: &[u8]) -> Option<&[u8]> {
    static ERROR_CODE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(E[0-9]{4}):").expect("error code regex is valid"));

    ERROR_CODE
        .captures(expected)
        .and_then(|captures| captures.get(1))
        .map(|code| code.as_bytes())
}

/// Controls which finished tests a display shows.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DisplayFilter {
    /// Hide tests that passed or almost passed.
    pub hide_passed: bool,
}

impl DisplayFilter {
    /// Returns true if a test with this status should be shown.
    pub fn shows(self, status: TestStatus) -> bool {
        !(self.hide_passed && matches!(status, TestStatus::Passed | TestStatus::Almost))
    }
}
