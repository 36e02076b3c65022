// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JUnit report output.

use crate::{
    classify::TestStatus,
    errors::{DisplayErrorChain, JunitWriteError},
    reporter::{RunEvent, RunEventKind},
    runner::TestResult,
};
use camino::Utf8PathBuf;
use debug_ignore::DebugIgnore;
use quick_junit::{NonSuccessKind, Report, TestCase, TestCaseStatus, TestSuite};
use std::fs::File;

/// Collects finished tests into a single test suite and writes the report when the run finishes.
///
/// A new generation replaces the suite, so the report always describes the last generation.
#[derive(Clone, Debug)]
pub(super) struct JunitAggregator {
    path: Utf8PathBuf,
    test_suite: DebugIgnore<Option<TestSuite>>,
}

impl JunitAggregator {
    pub(super) fn new(path: Utf8PathBuf) -> Self {
        Self {
            path,
            test_suite: DebugIgnore(None),
        }
    }

    pub(super) fn write_event(&mut self, event: &RunEvent<'_>) -> Result<(), JunitWriteError> {
        match &event.kind {
            RunEventKind::RunStarted { test_list, .. } => {
                let name = test_list
                    .tests_dir()
                    .file_name()
                    .unwrap_or(test_list.tests_dir().as_str());
                let mut test_suite = TestSuite::new(name);
                test_suite.set_timestamp(event.timestamp);
                *self.test_suite = Some(test_suite);
            }
            RunEventKind::TestFinished { result, .. } => {
                if let Some(test_suite) = self.test_suite.as_mut() {
                    test_suite.add_test_case(junit_test_case(result));
                }
            }
            RunEventKind::RunBeginCancel { .. } => {}
            RunEventKind::RunFinished {
                start_time,
                elapsed,
                ..
            } => {
                let mut report = Report::new("conform-run");
                report
                    .set_timestamp(*start_time)
                    .set_time(*elapsed)
                    .add_test_suites(self.test_suite.take());
                self.write_report(&report)?;
            }
        }

        Ok(())
    }

    fn write_report(&self, report: &Report) -> Result<(), JunitWriteError> {
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|err| JunitWriteError::Fs {
                file: dir.to_owned(),
                err,
            })?;
        }

        let f = File::create(&self.path).map_err(|err| JunitWriteError::Fs {
            file: self.path.clone(),
            err,
        })?;
        report.serialize(f).map_err(|err| JunitWriteError::Serialize {
            file: self.path.clone(),
            err,
        })
    }
}

fn junit_test_case(result: &TestResult) -> TestCase {
    let status = match result.status {
        TestStatus::Passed => TestCaseStatus::success(),
        TestStatus::ExecFailed => {
            let mut status = TestCaseStatus::non_success(NonSuccessKind::Error);
            status.set_type(result.status.to_static_str());
            if let Some(error) = &result.error {
                status
                    .set_message(error.to_string())
                    .set_description(DisplayErrorChain::new(error).to_string());
            }
            status
        }
        TestStatus::Failed
        | TestStatus::DiffError
        | TestStatus::Almost
        | TestStatus::NotStarted => {
            let mut status = TestCaseStatus::non_success(NonSuccessKind::Failure);
            status.set_type(result.status.to_static_str());
            if let Some(warning) = &result.warning {
                status.set_message(warning.to_string());
            }
            status
        }
    };

    let mut test_case = TestCase::new(result.id.as_str(), status);
    test_case
        .set_timestamp(result.start_time)
        .set_time(result.elapsed);
    if result.status != TestStatus::Passed {
        test_case
            .set_system_out(result.actual_stdout.as_str())
            .set_system_err(result.actual_stderr.as_str());
    }
    test_case
}
