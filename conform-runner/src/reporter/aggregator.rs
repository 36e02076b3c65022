// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run-wide counters.
//!
//! [`RunAggregator`] is pushed one transition per test and generation by the runner. It never
//! polls the status map, so a test can't be counted twice.

use crate::{classify::TestStatus, list::TestId};
use std::collections::HashSet;
use tracing::debug;

/// Statistics for a generation.
///
/// At every point, `done == passed + almost + diff_error + failed_count()` and `done <= total`.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
pub struct RunStats {
    /// The number of tests in the generation.
    pub total: usize,

    /// The number of tests that have left `NOT_STARTED`.
    pub done: usize,

    /// The number of tests that passed.
    pub passed: usize,

    /// The number of tests with the right error code but different stderr.
    pub almost: usize,

    /// The number of tests with a mismatched error.
    pub diff_error: usize,

    /// The number of tests whose output mismatched otherwise.
    pub failed: usize,

    /// The number of tests that could not be executed or read.
    pub exec_failed: usize,
}

impl RunStats {
    /// Returns the number of failed tests, counting execution failures.
    #[inline]
    pub fn failed_count(&self) -> usize {
        self.failed + self.exec_failed
    }

    /// Returns true if every test finished and passed.
    pub fn is_success(&self) -> bool {
        self.done == self.total && self.passed == self.total
    }

    /// Returns true if any tests did not pass.
    pub fn any_failed(&self) -> bool {
        self.almost > 0 || self.diff_error > 0 || self.failed_count() > 0
    }

    /// Returns the number of tests that haven't finished.
    pub fn remaining(&self) -> usize {
        self.total - self.done
    }

    fn on_test_finished(&mut self, status: TestStatus) {
        self.done += 1;
        match status {
            TestStatus::Passed => self.passed += 1,
            TestStatus::Almost => self.almost += 1,
            TestStatus::DiffError => self.diff_error += 1,
            TestStatus::Failed => self.failed += 1,
            TestStatus::ExecFailed => self.exec_failed += 1,
            TestStatus::NotStarted => unreachable!("callers only pass finished statuses"),
        }
    }
}

/// Maintains [`RunStats`] from per-test transitions.
#[derive(Clone, Debug, Default)]
pub struct RunAggregator {
    stats: RunStats,
    counted: HashSet<TestId>,
}

impl RunAggregator {
    /// Creates a new aggregator for a generation of `total` tests.
    pub fn new(total: usize) -> Self {
        Self {
            stats: RunStats {
                total,
                ..RunStats::default()
            },
            counted: HashSet::new(),
        }
    }

    /// Starts a new generation: zeroes the counters and forgets which tests were counted.
    pub fn reset(&mut self, total: usize) {
        *self = Self::new(total);
    }

    /// Records that `id` moved to `status`.
    ///
    /// Returns true if the transition was counted. A transition to `NOT_STARTED`, or a second
    /// transition for the same test in one generation, is ignored.
    pub fn on_transition(&mut self, id: &TestId, status: TestStatus) -> bool {
        if !status.is_finished() {
            debug!(test = %id, "ignoring transition to NOT_STARTED");
            return false;
        }
        if self.stats.done >= self.stats.total {
            debug!(test = %id, %status, "ignoring transition beyond the generation's total");
            return false;
        }
        if !self.counted.insert(id.clone()) {
            debug!(test = %id, %status, "ignoring duplicate transition");
            return false;
        }

        self.stats.on_test_finished(status);
        true
    }

    /// Returns the current counters.
    pub fn stats(&self) -> RunStats {
        self.stats
    }
}
