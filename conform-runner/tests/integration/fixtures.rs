// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use color_eyre::eyre::Result;
use conform_runner::{
    classify::TestStatus,
    config::TestThreads,
    reporter::{RunEventKind, RunStats},
    runner::{TestRunner, TestRunnerBuilder},
};
use std::{collections::BTreeMap, sync::LazyLock, time::Duration};

pub(crate) static EXPECTED_STATUSES: LazyLock<BTreeMap<&'static str, TestStatus>> =
    LazyLock::new(|| {
        BTreeMap::from([
            ("almost", TestStatus::Almost),
            ("bad-utf8", TestStatus::ExecFailed),
            ("diff-error", TestStatus::DiffError),
            ("empty-golden", TestStatus::Passed),
            ("malformed-fixture", TestStatus::DiffError),
            ("no-golden-stdout", TestStatus::Failed),
            ("ok1", TestStatus::Passed),
            ("stdout-mismatch", TestStatus::Failed),
        ])
    });

pub(crate) const EXPECTED_STATS: RunStats = RunStats {
    total: 8,
    done: 8,
    passed: 2,
    almost: 1,
    diff_error: 2,
    failed: 2,
    exec_failed: 1,
};

pub(crate) fn golden_suite_dir() -> Utf8PathBuf {
    Utf8Path::new(env!("CARGO_MANIFEST_DIR")).join("../fixtures/golden-suite")
}

/// Copies the golden suite into a scratch directory, for tests that modify fixtures.
pub(crate) fn copy_golden_suite() -> Result<Utf8TempDir> {
    let dir = camino_tempfile::tempdir()?;
    for entry in golden_suite_dir().read_dir_utf8()? {
        let entry = entry?;
        let dest = dir.path().join(entry.file_name());
        std::fs::create_dir(&dest)?;
        for file in entry.path().read_dir_utf8()? {
            let file = file?;
            std::fs::copy(file.path(), dest.join(file.file_name()))?;
        }
    }
    Ok(dir)
}

pub(crate) fn write_fixture(root: &Utf8Path, id: &str, script: &str) -> Result<()> {
    let dir = root.join(id);
    std::fs::create_dir_all(&dir)?;
    std::fs::write(dir.join("main.sh"), script)?;
    Ok(())
}

pub(crate) fn sh_runner_builder(tests_dir: &Utf8Path, test_threads: usize) -> TestRunnerBuilder {
    let mut builder = TestRunnerBuilder::new(tests_dir, "/bin/sh");
    builder
        .set_source_extension("sh")
        .set_test_threads(TestThreads::Count(test_threads))
        .set_timeout(Duration::from_secs(30));
    builder
}

pub(crate) fn sh_runner(tests_dir: &Utf8Path, test_threads: usize) -> Result<TestRunner> {
    Ok(sh_runner_builder(tests_dir, test_threads).build()?)
}

/// Returns the counters carried by an event.
pub(crate) fn event_stats(kind: &RunEventKind<'_>) -> RunStats {
    match kind {
        RunEventKind::RunStarted { stats, .. }
        | RunEventKind::TestFinished { stats, .. }
        | RunEventKind::RunBeginCancel { stats, .. }
        | RunEventKind::RunFinished { stats, .. } => *stats,
    }
}

/// Asserts the counter invariant holds for `stats`.
pub(crate) fn check_invariant(stats: &RunStats) {
    assert_eq!(
        stats.done,
        stats.passed + stats.almost + stats.diff_error + stats.failed_count(),
        "counters are consistent: {stats:?}"
    );
    assert!(stats.done <= stats.total, "done <= total: {stats:?}");
}

pub(crate) fn statuses(runner: &TestRunner) -> BTreeMap<String, TestStatus> {
    runner
        .iter_statuses()
        .map(|(id, status)| (id.to_string(), status))
        .collect()
}
