// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, io};

/// Root element for a serializable list of golden-file tests generated by `conform`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct TestListSummary {
    /// The directory containing one fixture directory per test.
    pub tests_dir: Utf8PathBuf,

    /// The interpreter that will be invoked on each test's source file.
    pub interpreter: Utf8PathBuf,

    /// Number of tests that match the filters, and would be run.
    pub test_count: usize,

    /// Every discovered test, keyed by test id and sorted.
    pub tests: BTreeMap<String, TestCaseSummary>,
}

impl TestListSummary {
    /// Creates a new `TestListSummary` with no tests.
    pub fn new(tests_dir: impl Into<Utf8PathBuf>, interpreter: impl Into<Utf8PathBuf>) -> Self {
        Self {
            tests_dir: tests_dir.into(),
            interpreter: interpreter.into(),
            test_count: 0,
            tests: BTreeMap::new(),
        }
    }

    /// Parse JSON output from `conform list --message-format json`.
    pub fn parse_json(json: impl AsRef<str>) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json.as_ref())
    }

    /// Writes the summary as JSON to the given writer.
    pub fn write_json(&self, pretty: bool, writer: impl io::Write) -> Result<(), serde_json::Error> {
        if pretty {
            serde_json::to_writer_pretty(writer, self)
        } else {
            serde_json::to_writer(writer, self)
        }
    }
}

/// Serializable information about a single fixture.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct TestCaseSummary {
    /// The source file passed to the interpreter.
    pub source: Utf8PathBuf,

    /// The golden stdout file, if one exists.
    #[serde(default)]
    pub expected_stdout: Option<Utf8PathBuf>,

    /// The golden stderr file, if one exists.
    #[serde(default)]
    pub expected_stderr: Option<Utf8PathBuf>,

    /// Whether the test matches the provided filters.
    pub filter_match: bool,
}

impl TestCaseSummary {
    /// Creates a new `TestCaseSummary`.
    pub fn new(
        source: impl Into<Utf8PathBuf>,
        expected_stdout: Option<Utf8PathBuf>,
        expected_stderr: Option<Utf8PathBuf>,
        filter_match: bool,
    ) -> Self {
        Self {
            source: source.into(),
            expected_stdout,
            expected_stderr,
            filter_match,
        }
    }
}
