// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events emitted by the runner.
//!
//! These events are handed to the callback passed to
//! [`TestRunner::try_execute`](crate::runner::TestRunner::try_execute), and consumed by
//! [`TestReporter`](crate::reporter::TestReporter) or by any other display.

use crate::{
    list::{TestCase, TestList},
    reporter::RunStats,
    runner::TestResult,
};
use chrono::{DateTime, Local};
use std::time::Duration;

/// A test event.
///
/// Every event carries the generation it was produced in.
#[derive(Clone, Debug)]
pub struct RunEvent<'a> {
    /// The time at which the event was generated, including the offset from UTC.
    pub timestamp: DateTime<Local>,

    /// The generation this event belongs to. Generations start at 1.
    pub generation: u32,

    /// The amount of time elapsed since the start of the current call into the runner.
    pub elapsed: Duration,

    /// The kind of event this is.
    pub kind: RunEventKind<'a>,
}

/// The kind of test event this is.
#[derive(Clone, Debug)]
pub enum RunEventKind<'a> {
    /// A generation started: the tests directory was scanned and counters were reset.
    RunStarted {
        /// The list of tests discovered for this generation.
        test_list: &'a TestList,

        /// Zeroed counters, with `total` set to the number of tests that will be run.
        stats: RunStats,
    },

    /// A test left `NOT_STARTED`.
    ///
    /// This is emitted exactly once per test and generation, so a display only needs to update
    /// the affected row and the summary.
    TestFinished {
        /// The test.
        test_case: &'a TestCase,

        /// The result of the test.
        result: &'a TestResult,

        /// The counters after this test was accounted for.
        stats: RunStats,
    },

    /// In-flight tests of the current generation are being cancelled.
    RunBeginCancel {
        /// The number of tests that were still running.
        running: usize,

        /// The reason this run was cancelled.
        reason: CancelReason,

        /// The counters at the time of cancellation.
        stats: RunStats,
    },

    /// The call into the runner has finished.
    RunFinished {
        /// The time at which the call started.
        start_time: DateTime<Local>,

        /// The amount of time it took.
        elapsed: Duration,

        /// The counters of the last generation.
        stats: RunStats,
    },
}

/// The reason why in-flight tests are being cancelled.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum CancelReason {
    /// A rerun was requested: a new generation starts once the current one is torn down.
    RerunRequested,

    /// Cancellation was requested. Unfinished tests stay `NOT_STARTED`.
    CancelRequested,
}

impl CancelReason {
    pub(crate) fn to_static_str(self) -> &'static str {
        match self {
            CancelReason::RerunRequested => "rerun request",
            CancelReason::CancelRequested => "cancel request",
        }
    }
}
