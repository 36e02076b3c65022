// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use camino::Utf8Path;
use color_eyre::eyre::Result;
use conform_runner::{
    classify::TestStatus,
    errors::{ScanError, TestExecError},
    list::{OutputFormat, TestList},
    reporter::{ReporterStderr, RunEventKind, RunStats, TestReporterBuilder},
    runner::TestRunnerBuilder,
    test_filter::{TestFilter, TestFilterPatterns},
};
use pretty_assertions::assert_eq;
use std::{collections::BTreeMap, time::Duration};

#[test]
fn test_list_golden_suite() -> Result<()> {
    let test_list = TestList::scan(golden_suite_dir(), "sh", &TestFilter::all())?;
    let ids: Vec<_> = test_list.iter().map(|test_case| test_case.id.as_str()).collect();
    let expected: Vec<_> = EXPECTED_STATUSES.keys().copied().collect();
    assert_eq!(ids, expected);
    assert_eq!(test_list.run_count(), EXPECTED_STATUSES.len());

    let ok1 = test_list.get("ok1").expect("ok1 exists");
    assert!(ok1.expected_stdout.is_some());
    assert!(ok1.expected_stderr.is_none());
    assert_eq!(ok1.source.file_name(), Some("main.sh"));

    let mut human = Vec::new();
    test_list.write(
        OutputFormat::Human { verbose: false },
        Utf8Path::new("/bin/sh"),
        &mut human,
        false,
    )?;
    assert_eq!(String::from_utf8(human)?.lines().count(), EXPECTED_STATUSES.len());
    Ok(())
}

#[test]
fn test_run_golden_suite() -> Result<()> {
    let mut runner = sh_runner(&golden_suite_dir(), 4)?;

    let mut started = 0;
    let mut finished = BTreeMap::new();
    let mut last_stats = None;
    let stats = runner.execute(|event| {
        assert_eq!(event.generation, 1);
        check_invariant(&event_stats(&event.kind));
        match event.kind {
            RunEventKind::RunStarted { stats, .. } => {
                started += 1;
                assert_eq!(
                    stats,
                    RunStats {
                        total: 8,
                        ..RunStats::default()
                    }
                );
            }
            RunEventKind::TestFinished {
                test_case,
                result,
                stats,
            } => {
                let previous = finished.insert(test_case.id.to_string(), result.status);
                assert_eq!(previous, None, "each test finishes once");
                assert_eq!(stats.done, finished.len());
            }
            RunEventKind::RunBeginCancel { .. } => panic!("nothing cancels this run"),
            RunEventKind::RunFinished { stats, .. } => last_stats = Some(stats),
        }
    })?;

    assert_eq!(started, 1);
    assert_eq!(stats, EXPECTED_STATS);
    assert_eq!(last_stats, Some(EXPECTED_STATS));
    assert!(!stats.is_success());

    let expected: BTreeMap<_, _> = EXPECTED_STATUSES
        .iter()
        .map(|(id, status)| (id.to_string(), *status))
        .collect();
    assert_eq!(finished, expected);
    assert_eq!(statuses(&runner), expected);

    // Scenario B: the error code is found in actual stderr.
    let almost = runner.result("almost").expect("almost finished");
    assert_eq!(almost.actual_stderr, "error E0012 at line 3\n");
    assert_eq!(almost.expected_stderr.as_deref(), Some("E0012: type mismatch\n"));

    let malformed = runner.result("malformed-fixture").expect("finished");
    let warning = malformed.warning.as_ref().expect("fixture has no error code");
    assert_eq!(warning.first_line(), "something went wrong");

    let bad_utf8 = runner.result("bad-utf8").expect("finished");
    assert!(
        matches!(bad_utf8.error, Some(TestExecError::Encoding(_))),
        "{:?}",
        bad_utf8.error
    );
    Ok(())
}

#[test]
fn test_filter_skips_tests() -> Result<()> {
    let mut patterns = TestFilterPatterns::new(vec!["o".to_owned()]);
    patterns.add_skip_pattern("golden");
    let filter = TestFilter::new(&patterns)?;

    let mut builder = sh_runner_builder(&golden_suite_dir(), 2);
    builder.set_filter(filter);
    let mut runner = builder.build()?;
    let stats = runner.execute(|_| {})?;

    // "o" matches every id but bad-utf8. Skipping "golden" then drops empty-golden and
    // no-golden-stdout.
    assert_eq!(stats.total, 5);
    assert_eq!(runner.status("no-golden-stdout"), None);
    assert_eq!(runner.status("ok1"), Some(TestStatus::Passed));
    assert_eq!(runner.test_list().map(|list| list.skip_count()), Some(3));
    Ok(())
}

#[test]
fn test_spawn_failure_is_isolated() -> Result<()> {
    let mut builder = TestRunnerBuilder::new(golden_suite_dir(), "/nonexistent/interpreter");
    builder.set_source_extension("sh");
    let mut runner = builder.build()?;
    let stats = runner.execute(|_| {})?;

    assert_eq!(stats.done, 8);
    assert_eq!(stats.exec_failed, 8);
    for (id, status) in statuses(&runner) {
        assert_eq!(status, TestStatus::ExecFailed, "{id}");
        let result = runner.result(&id).expect("finished");
        assert!(matches!(result.error, Some(TestExecError::Spawn(_))));
    }
    Ok(())
}

#[test]
fn test_timeout_is_exec_failure() -> Result<()> {
    let dir = camino_tempfile::tempdir()?;
    write_fixture(dir.path(), "fast", "printf 'done\\n'\n")?;
    std::fs::write(dir.path().join("fast/stdout.txt"), "done\n")?;
    write_fixture(dir.path(), "slow", "sleep 30\n")?;

    let mut builder = sh_runner_builder(dir.path(), 2);
    builder.set_timeout(Duration::from_millis(300));
    let mut runner = builder.build()?;
    let stats = runner.execute(|_| {})?;

    assert_eq!(stats.passed, 1);
    assert_eq!(stats.exec_failed, 1);
    let slow = runner.result("slow").expect("finished");
    assert!(
        matches!(slow.error, Some(TestExecError::Timeout { .. })),
        "{:?}",
        slow.error
    );
    Ok(())
}

#[test]
fn test_missing_tests_dir_aborts() -> Result<()> {
    let dir = camino_tempfile::tempdir()?;
    let missing = dir.path().join("missing");
    let mut runner = sh_runner(&missing, 1)?;

    let mut events = 0;
    let err = runner.execute(|_| events += 1).expect_err("scan fails");
    assert!(matches!(err, ScanError::RootNotFound { .. }), "{err:?}");
    assert_eq!(events, 0, "no events before the scan succeeds");
    assert_eq!(runner.generation(), 0);
    Ok(())
}

#[test]
fn test_reporter_output() -> Result<()> {
    let dir = camino_tempfile::tempdir()?;
    let junit_path = dir.path().join("junit.xml");

    let mut runner = sh_runner(&golden_suite_dir(), 1)?;
    let mut buf = Vec::new();
    let mut reporter_builder = TestReporterBuilder::default();
    reporter_builder
        .set_hide_passed(true)
        .set_junit_path(&junit_path);
    let mut reporter = reporter_builder.build(ReporterStderr::Buffer(&mut buf));
    runner.try_execute(|event| reporter.report_event(&event))?;
    drop(reporter);

    let output = String::from_utf8(buf)?;
    assert!(output.contains("Starting 8 tests in"), "{output}");
    assert!(!output.contains("ok1"), "passed tests are hidden: {output}");
    assert!(!output.contains("ALMOST"), "almost tests are hidden: {output}");
    assert!(output.contains("--- STDOUT DIFF: stdout-mismatch ---\n-42\n+41\n"), "{output}");
    assert!(output.contains("WARNING"), "{output}");
    assert!(
        output.contains(
            "8 tests run: 2 passed, 1 almost, 2 differ in error, 2 failed, 1 exec failed\n"
        ),
        "{output}"
    );

    let xml = std::fs::read_to_string(&junit_path)?;
    assert!(xml.contains(r#"name="golden-suite""#), "{xml}");
    assert!(xml.contains(r#"type="ALMOST""#), "{xml}");
    Ok(())
}
