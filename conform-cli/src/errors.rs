// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::Utf8PathBuf;
use conform_metadata::ConformExitCode;
use conform_runner::errors::*;
use owo_colors::OwoColorize;
use std::{error::Error, path::PathBuf};
use thiserror::Error;
use tracing::{error, warn};

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// The #[error()] strings are placeholders: errors are meant to be printed with
// display_to_stderr, which colorizes them.

/// An error that ends a `conform` invocation with a known exit code.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine current directory")]
    CurrentDirFailed {
        #[source]
        err: std::io::Error,
    },
    #[error("workspace root is not valid UTF-8")]
    WorkspaceRootInvalidUtf8 { path: PathBuf },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("test filter build error")]
    TestFilterBuildError {
        #[from]
        err: TestFilterBuildError,
    },
    #[error("test runner build error")]
    TestRunnerBuildError {
        #[from]
        err: TestRunnerBuildError,
    },
    #[error("failed to discover tests")]
    ScanFailed {
        #[from]
        err: ScanError,
    },
    #[error("error writing test list")]
    WriteTestListError {
        #[from]
        err: WriteTestListError,
    },
    #[error("error writing test output")]
    WriteEventError {
        #[from]
        err: WriteEventError,
    },
    #[error("no tests to run")]
    NoTestsRun { tests_dir: Utf8PathBuf },
    #[error("test run failed")]
    TestRunFailed,
}

impl ExpectedError {
    pub(crate) fn current_dir_failed(err: std::io::Error) -> Self {
        Self::CurrentDirFailed { err }
    }

    pub(crate) fn workspace_root_invalid_utf8(path: PathBuf) -> Self {
        Self::WorkspaceRootInvalidUtf8 { path }
    }

    pub(crate) fn no_tests_run(tests_dir: impl Into<Utf8PathBuf>) -> Self {
        Self::NoTestsRun {
            tests_dir: tests_dir.into(),
        }
    }

    pub(crate) fn test_run_failed() -> Self {
        Self::TestRunFailed
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirFailed { .. }
            | Self::WorkspaceRootInvalidUtf8 { .. }
            | Self::ConfigParseError { .. }
            | Self::TestFilterBuildError { .. }
            | Self::TestRunnerBuildError { .. } => ConformExitCode::SETUP_ERROR,
            Self::ScanFailed { .. } => ConformExitCode::SCAN_FAILED,
            Self::WriteTestListError { .. } | Self::WriteEventError { .. } => {
                ConformExitCode::WRITE_OUTPUT_ERROR
            }
            Self::NoTestsRun { .. } => ConformExitCode::NO_TESTS_RUN,
            Self::TestRunFailed => ConformExitCode::TEST_RUN_FAILED,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::CurrentDirFailed { err } => {
                error!("could not determine current directory");
                Some(err as &dyn Error)
            }
            Self::WorkspaceRootInvalidUtf8 { path } => {
                error!(
                    "workspace root `{}` is not valid UTF-8",
                    path.display().style(styles.bold)
                );
                None
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse conform config at `{}`",
                    err.config_file().style(styles.bold)
                );
                Some(err.kind() as &dyn Error)
            }
            Self::TestFilterBuildError { err } => {
                error!("{err}");
                err.source()
            }
            Self::TestRunnerBuildError { err } => {
                error!("{err}");
                err.source()
            }
            Self::ScanFailed { err } => {
                error!("{err}");
                err.source()
            }
            Self::WriteTestListError { err } => {
                error!("{err}");
                err.source()
            }
            Self::WriteEventError { err } => {
                error!("{err}");
                err.source()
            }
            Self::NoTestsRun { tests_dir } => {
                warn!("no tests to run in `{}`", tests_dir.style(styles.bold));
                None
            }
            Self::TestRunFailed => {
                error!("test run failed");
                None
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
