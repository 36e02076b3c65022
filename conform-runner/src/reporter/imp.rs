// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{displayer::DisplayReporter, junit::JunitAggregator};
use crate::{classify::DisplayFilter, errors::WriteEventError, reporter::RunEvent};
use camino::Utf8PathBuf;

/// Standard error destination for the reporter.
///
/// This is usually a terminal, but can be an in-memory buffer for tests.
pub enum ReporterStderr<'a> {
    /// Produce output on the (possibly piped) terminal.
    Terminal,

    /// Write output to a buffer.
    Buffer(&'a mut Vec<u8>),
}

/// Test reporter builder.
#[derive(Debug, Default)]
pub struct TestReporterBuilder {
    should_colorize: bool,
    hide_passed: bool,
    no_diff: bool,
    verbose: bool,
    junit_path: Option<Utf8PathBuf>,
}

impl TestReporterBuilder {
    /// Set to true if the reporter should colorize output.
    pub fn set_colorize(&mut self, should_colorize: bool) -> &mut Self {
        self.should_colorize = should_colorize;
        self
    }

    /// Hides tests that passed or almost passed. The summary still counts them.
    pub fn set_hide_passed(&mut self, hide_passed: bool) -> &mut Self {
        self.hide_passed = hide_passed;
        self
    }

    /// Set to true to not print diffs for tests that didn't pass.
    pub fn set_no_diff(&mut self, no_diff: bool) -> &mut Self {
        self.no_diff = no_diff;
        self
    }

    /// Sets verbose output.
    pub fn set_verbose(&mut self, verbose: bool) -> &mut Self {
        self.verbose = verbose;
        self
    }

    /// Writes a JUnit report to this path when the run finishes.
    pub fn set_junit_path(&mut self, path: impl Into<Utf8PathBuf>) -> &mut Self {
        self.junit_path = Some(path.into());
        self
    }

    /// Creates a new test reporter.
    pub fn build<'a>(&self, output: ReporterStderr<'a>) -> TestReporter<'a> {
        let display_reporter = DisplayReporter::new(
            DisplayFilter {
                hide_passed: self.hide_passed,
            },
            self.no_diff,
            self.verbose,
            self.should_colorize,
            output,
        );

        TestReporter {
            display_reporter,
            junit: self.junit_path.clone().map(JunitAggregator::new),
        }
    }
}

/// Functionality to report test results to stderr, and optionally to a JUnit file.
pub struct TestReporter<'a> {
    display_reporter: DisplayReporter<'a>,
    junit: Option<JunitAggregator>,
}

impl TestReporter<'_> {
    /// Report a test event.
    pub fn report_event(&mut self, event: &RunEvent<'_>) -> Result<(), WriteEventError> {
        self.display_reporter.write_event(event)?;
        if let Some(junit) = &mut self.junit {
            junit.write_event(event)?;
        }
        Ok(())
    }
}
