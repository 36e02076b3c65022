// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by conform.
//!
//! Only [`ScanError`] aborts a whole run. The per-test errors collected under [`TestExecError`]
//! mark a single test as [`TestStatus::ExecFailed`](crate::classify::TestStatus::ExecFailed) and
//! the run continues.

use crate::expectation::OutputStream;
use camino::Utf8PathBuf;
use config::ConfigError;
use std::{error::Error, ffi::OsString, fmt, io, str::Utf8Error, time::Duration};
use thiserror::Error;

/// An error that occurred while scanning the fixture root for tests.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScanError {
    /// The fixture root does not exist.
    #[error("tests directory `{root}` does not exist")]
    RootNotFound {
        /// The fixture root.
        root: Utf8PathBuf,
    },

    /// The fixture root exists but is not a directory.
    #[error("tests directory `{root}` is not a directory")]
    NotADirectory {
        /// The fixture root.
        root: Utf8PathBuf,
    },

    /// Reading the fixture root failed.
    #[error("failed to read tests directory `{root}`")]
    ReadDir {
        /// The fixture root.
        root: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// A fixture directory name is not valid UTF-8.
    #[error("fixture directory name {name:?} under `{root}` is not valid UTF-8")]
    NonUtf8Name {
        /// The fixture root.
        root: Utf8PathBuf,

        /// The offending directory name.
        name: OsString,
    },
}

/// The interpreter could not be started.
#[derive(Debug, Error)]
#[error("failed to spawn interpreter `{program}`")]
pub struct ProcessSpawnError {
    program: Utf8PathBuf,
    #[source]
    err: io::Error,
}

impl ProcessSpawnError {
    pub(crate) fn new(program: impl Into<Utf8PathBuf>, err: io::Error) -> Self {
        Self {
            program: program.into(),
            err,
        }
    }

    /// Returns the program that failed to spawn.
    pub fn program(&self) -> &Utf8PathBuf {
        &self.program
    }
}

/// A golden stderr file mismatched but did not contain an error-code token.
///
/// This is a harness warning: the test is classified as
/// [`TestStatus::DiffError`](crate::classify::TestStatus::DiffError) and the run continues.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("expected stderr has no error code (`E` followed by 4 digits and `:`): {first_line:?}")]
pub struct MalformedFixtureError {
    first_line: String,
}

impl MalformedFixtureError {
    pub(crate) fn new(expected: &[u8]) -> Self {
        let first_line = expected
            .split(|&b| b == b'\n')
            .next()
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .unwrap_or_default();
        Self { first_line }
    }

    /// The first line of the expected stderr, for display.
    pub fn first_line(&self) -> &str {
        &self.first_line
    }
}

/// Which side of a comparison an [`EncodingError`] was found on.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutputSide {
    /// Output produced by the interpreter.
    Actual,

    /// A golden file.
    Expected,
}

impl fmt::Display for OutputSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Actual => write!(f, "actual"),
            Self::Expected => write!(f, "expected"),
        }
    }
}

/// Captured output or a golden file is not valid UTF-8.
#[derive(Clone, Debug, Error)]
#[error("{side} {stream} is not valid UTF-8")]
pub struct EncodingError {
    stream: OutputStream,
    side: OutputSide,
    #[source]
    err: Utf8Error,
}

impl EncodingError {
    pub(crate) fn new(stream: OutputStream, side: OutputSide, err: Utf8Error) -> Self {
        Self { stream, side, err }
    }

    /// The stream that failed to decode.
    pub fn stream(&self) -> OutputStream {
        self.stream
    }

    /// Whether the actual output or the golden file failed to decode.
    pub fn side(&self) -> OutputSide {
        self.side
    }
}

/// A golden file exists but could not be read.
#[derive(Debug, Error)]
#[error("failed to read golden file `{path}`")]
pub struct ExpectationLoadError {
    path: Utf8PathBuf,
    #[source]
    err: io::Error,
}

impl ExpectationLoadError {
    pub(crate) fn new(path: impl Into<Utf8PathBuf>, err: io::Error) -> Self {
        Self {
            path: path.into(),
            err,
        }
    }

    /// The golden file that failed to load.
    pub fn path(&self) -> &Utf8PathBuf {
        &self.path
    }
}

/// A per-test fatal condition.
///
/// Tests that hit one of these are reported as exec failures, distinct from tests whose output
/// didn't match.
#[derive(Debug, Error)]
pub enum TestExecError {
    /// The interpreter could not be started.
    #[error(transparent)]
    Spawn(#[from] ProcessSpawnError),

    /// Output could not be decoded as UTF-8.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// A golden file could not be read.
    #[error(transparent)]
    ExpectationLoad(#[from] ExpectationLoadError),

    /// The interpreter did not finish within the timeout and was killed.
    #[error("interpreter timed out after {timeout:?}")]
    Timeout {
        /// The configured timeout.
        timeout: Duration,
    },

    /// Reading the interpreter's output or waiting on it failed.
    #[error("error while collecting interpreter output")]
    Io(#[source] io::Error),
}

impl TestExecError {
    /// A short machine-friendly name for this kind of error.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Spawn(_) => "spawn",
            Self::Encoding(_) => "encoding",
            Self::ExpectationLoad(_) => "golden-io",
            Self::Timeout { .. } => "timeout",
            Self::Io(_) => "io",
        }
    }
}

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse conform config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),
}

/// An error which occurs while parsing a [`TestThreads`](crate::config::TestThreads) value.
#[derive(Clone, Debug, Error)]
#[error("unrecognized value for test-threads: {input}\n(hint: expected an integer or \"num-cpus\")")]
pub struct TestThreadsParseError {
    input: String,
}

impl TestThreadsParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// An error that occurred while building a test filter.
#[derive(Clone, Debug, Error)]
#[error("error building test filter")]
pub struct TestFilterBuildError {
    #[from]
    error: aho_corasick::BuildError,
}

/// An error that occurred while building the test runner.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TestRunnerBuildError {
    /// An error occurred while creating the Tokio runtime.
    #[error("error creating Tokio runtime")]
    TokioRuntimeCreate(#[source] io::Error),
}

/// An error that aborted a test run.
#[derive(Debug, Error)]
pub enum TestRunnerExecuteError<E> {
    /// The fixture root could not be scanned, so no tests were run.
    #[error("failed to discover tests")]
    Scan(#[from] ScanError),

    /// The event callback returned an error.
    #[error("event callback failed")]
    Callback(#[source] E),
}

/// An error that occurred while writing a JUnit report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum JunitWriteError {
    /// Creating the report file or its parent directory failed.
    #[error("error writing JUnit output to `{file}`")]
    Fs {
        /// The file or directory.
        file: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// Serializing the report failed.
    #[error("error serializing JUnit report to `{file}`")]
    Serialize {
        /// The report file.
        file: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: quick_junit::SerializeError,
    },
}

/// An error that occurred while writing a test list.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteTestListError {
    /// An error occurred while writing the list to the output stream.
    #[error("error writing to output")]
    Io(#[source] io::Error),

    /// An error occurred while serializing the list to JSON.
    #[error("error serializing to JSON")]
    Json(#[source] serde_json::Error),
}

/// An error writing reporter output.
#[derive(Debug, Error)]
pub enum WriteEventError {
    /// An error writing to the terminal or buffer.
    #[error("error writing to output")]
    Io(#[from] io::Error),

    /// An error writing the JUnit report.
    #[error(transparent)]
    Junit(#[from] JunitWriteError),
}

/// Displays an error along with its chain of sources.
///
/// The first line is the error itself; each source follows on its own line, prefixed with
/// `caused by:`.
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut source = self.error.source();
        while let Some(err) = source {
            write!(f, "\n  caused by: {err}")?;
            source = err.source();
        }

        Ok(())
    }
}
