// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::Result;
use conform_runner::{
    classify::TestStatus,
    reporter::{CancelReason, RunEventKind, RunStats},
};
use pretty_assertions::assert_eq;
use std::convert::Infallible;

#[derive(Clone, Debug, Eq, PartialEq)]
enum Seen {
    Started(u32),
    Finished(u32, String),
    Cancel(u32, CancelReason),
    RunFinished(u32),
}

#[test]
fn test_rerun_matches_fresh_run() -> Result<()> {
    let dir = copy_golden_suite()?;
    let mut runner = sh_runner(dir.path(), 4)?;
    let first = runner.execute(|_| {})?;
    assert_eq!(first, EXPECTED_STATS);

    // Fix one fixture and add another: the rerun must see both changes.
    std::fs::write(dir.path().join("stdout-mismatch/stdout.txt"), "41\n")?;
    write_fixture(dir.path(), "added", "printf 'new\\n'\n")?;

    let second = runner.rerun::<Infallible, _>(|event| {
        assert_eq!(event.generation, 2);
        check_invariant(&event_stats(&event.kind));
        Ok(())
    })?;
    assert_eq!(runner.generation(), 2);

    let mut fresh = sh_runner(dir.path(), 4)?;
    let fresh_stats = fresh.execute(|_| {})?;
    assert_eq!(second, fresh_stats);
    assert_eq!(statuses(&runner), statuses(&fresh));
    assert_eq!(
        second,
        RunStats {
            total: 9,
            done: 9,
            passed: 3,
            failed: 2,
            ..EXPECTED_STATS
        }
    );
    assert_eq!(runner.status("stdout-mismatch"), Some(TestStatus::Passed));
    assert_eq!(runner.status("added"), Some(TestStatus::Failed));
    Ok(())
}

#[test]
fn test_cancel_leaves_tests_not_started() -> Result<()> {
    let mut runner = sh_runner(&golden_suite_dir(), 1)?;
    let controller = runner.controller();

    let mut seen = Vec::new();
    let stats = runner.execute(|event| match event.kind {
        RunEventKind::RunStarted { .. } => seen.push(Seen::Started(event.generation)),
        RunEventKind::TestFinished { test_case, .. } => {
            seen.push(Seen::Finished(event.generation, test_case.id.to_string()));
            if seen.len() == 3 {
                assert!(controller.request_cancel());
            }
        }
        RunEventKind::RunBeginCancel { running, reason, .. } => {
            assert_eq!(running, 1);
            seen.push(Seen::Cancel(event.generation, reason));
        }
        RunEventKind::RunFinished { .. } => seen.push(Seen::RunFinished(event.generation)),
    })?;

    // With one test thread, tests run in id order.
    assert_eq!(
        seen,
        vec![
            Seen::Started(1),
            Seen::Finished(1, "almost".to_owned()),
            Seen::Finished(1, "bad-utf8".to_owned()),
            Seen::Cancel(1, CancelReason::CancelRequested),
            Seen::RunFinished(1),
        ]
    );
    assert_eq!(stats.done, 2);
    assert_eq!(stats.remaining(), 6);
    assert_eq!(runner.status("ok1"), Some(TestStatus::NotStarted));
    assert!(runner.result("ok1").is_none());

    // A later call picks up where the cancelled one left off, in the same generation.
    let mut finished = 0;
    let stats = runner.execute(|event| {
        assert_eq!(event.generation, 1);
        if let RunEventKind::RunStarted { .. } = event.kind {
            panic!("resuming doesn't start a new generation");
        }
        if let RunEventKind::TestFinished { .. } = event.kind {
            finished += 1;
        }
    })?;
    assert_eq!(finished, 6);
    assert_eq!(stats, EXPECTED_STATS);
    Ok(())
}

#[test]
fn test_rerun_requested_mid_run() -> Result<()> {
    let mut runner = sh_runner(&golden_suite_dir(), 1)?;
    let controller = runner.controller();

    let mut seen = Vec::new();
    let mut requested = false;
    let stats = runner.execute(|event| {
        check_invariant(&event_stats(&event.kind));
        match event.kind {
            RunEventKind::RunStarted { stats, .. } => {
                assert_eq!(stats.done, 0, "counters are reset for each generation");
                seen.push(Seen::Started(event.generation));
            }
            RunEventKind::TestFinished { test_case, .. } => {
                seen.push(Seen::Finished(event.generation, test_case.id.to_string()));
                if !requested {
                    requested = true;
                    assert!(controller.request_rerun());
                }
            }
            RunEventKind::RunBeginCancel { reason, .. } => {
                seen.push(Seen::Cancel(event.generation, reason));
            }
            RunEventKind::RunFinished { .. } => seen.push(Seen::RunFinished(event.generation)),
        }
    })?;

    assert_eq!(
        &seen[..4],
        &[
            Seen::Started(1),
            Seen::Finished(1, "almost".to_owned()),
            Seen::Cancel(1, CancelReason::RerunRequested),
            Seen::Started(2),
        ]
    );
    let second_generation: Vec<_> = seen[4..]
        .iter()
        .filter_map(|seen| match seen {
            Seen::Finished(2, id) => Some(id.as_str()),
            _ => None,
        })
        .collect();
    let expected: Vec<_> = EXPECTED_STATUSES.keys().copied().collect();
    assert_eq!(second_generation, expected);
    assert_eq!(seen.last(), Some(&Seen::RunFinished(2)));

    assert_eq!(runner.generation(), 2);
    assert_eq!(stats, EXPECTED_STATS);
    Ok(())
}

#[test]
fn test_stale_requests_are_dropped() -> Result<()> {
    let mut runner = sh_runner(&golden_suite_dir(), 2)?;
    let controller = runner.controller();

    // Requests made while nothing is running don't affect the next call.
    assert!(controller.request_cancel());
    assert!(controller.request_rerun());
    let stats = runner.execute(|event| {
        assert_eq!(event.generation, 1);
        assert!(!matches!(event.kind, RunEventKind::RunBeginCancel { .. }));
    })?;
    assert_eq!(stats, EXPECTED_STATS);
    Ok(())
}
