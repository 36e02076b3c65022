// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::executor::{ExecutorContext, ProcessRunner};
use crate::{
    classify::TestStatus,
    config::{ConformConfig, TestThreads},
    errors::{
        MalformedFixtureError, ScanError, TestExecError, TestRunnerBuildError,
        TestRunnerExecuteError,
    },
    expectation::ExpectationStore,
    list::{TestCase, TestId, TestList},
    reporter::{CancelReason, RunAggregator, RunEvent, RunEventKind, RunStats},
    test_filter::TestFilter,
    time::{StopwatchStart, stopwatch},
};
use camino::Utf8PathBuf;
use chrono::{DateTime, Local};
use futures::prelude::*;
use std::{
    collections::BTreeMap, convert::Infallible, pin::pin, process::ExitStatus, time::Duration,
};
use tokio::{
    runtime::Runtime,
    sync::mpsc::{UnboundedReceiver, UnboundedSender, error::TryRecvError, unbounded_channel},
};
use tracing::debug;

/// The outcome of a single test in a single generation.
#[derive(Debug)]
pub struct TestResult {
    /// The test.
    pub id: TestId,

    /// The generation this result belongs to.
    pub generation: u32,

    /// The verdict. `EXEC_FAILED` when `error` is set.
    pub status: TestStatus,

    /// A harness warning about the fixture, if any.
    pub warning: Option<MalformedFixtureError>,

    /// The fatal condition that prevented this test from being classified, if any.
    pub error: Option<TestExecError>,

    /// How the interpreter exited, if it ran to completion.
    pub exit_status: Option<ExitStatus>,

    /// The interpreter's stdout. Invalid UTF-8 is replaced for display.
    pub actual_stdout: String,

    /// The interpreter's stderr. Invalid UTF-8 is replaced for display.
    pub actual_stderr: String,

    /// The golden stdout, if the fixture has one.
    pub expected_stdout: Option<String>,

    /// The golden stderr, if the fixture has one.
    pub expected_stderr: Option<String>,

    /// When the test started.
    pub start_time: DateTime<Local>,

    /// How long the test took, including loading golden files.
    pub elapsed: Duration,
}

impl TestResult {
    pub(super) fn new(id: TestId, generation: u32, start_time: DateTime<Local>) -> Self {
        Self {
            id,
            generation,
            status: TestStatus::NotStarted,
            warning: None,
            error: None,
            exit_status: None,
            actual_stdout: String::new(),
            actual_stderr: String::new(),
            expected_stdout: None,
            expected_stderr: None,
            start_time,
            elapsed: Duration::ZERO,
        }
    }
}

/// Test runner options.
#[derive(Clone, Debug)]
pub struct TestRunnerBuilder {
    tests_dir: Utf8PathBuf,
    interpreter: Utf8PathBuf,
    source_extension: String,
    test_threads: TestThreads,
    timeout: Duration,
    filter: TestFilter,
}

impl TestRunnerBuilder {
    /// Creates a new builder that runs `interpreter` over the fixtures in `tests_dir`.
    ///
    /// Everything else starts out at the values of the default config.
    pub fn new(tests_dir: impl Into<Utf8PathBuf>, interpreter: impl Into<Utf8PathBuf>) -> Self {
        Self {
            tests_dir: tests_dir.into(),
            interpreter: interpreter.into(),
            source_extension: "cara".to_owned(),
            test_threads: TestThreads::NumCpus,
            timeout: Duration::from_secs(60),
            filter: TestFilter::all(),
        }
    }

    /// Creates a new builder from a loaded config.
    pub fn from_config(config: &ConformConfig) -> Self {
        let mut builder = Self::new(config.tests_dir(), config.interpreter());
        builder
            .set_source_extension(config.source_extension())
            .set_test_threads(config.test_threads())
            .set_timeout(config.timeout());
        builder
    }

    /// Sets the tests directory.
    pub fn set_tests_dir(&mut self, tests_dir: impl Into<Utf8PathBuf>) -> &mut Self {
        self.tests_dir = tests_dir.into();
        self
    }

    /// Sets the interpreter.
    pub fn set_interpreter(&mut self, interpreter: impl Into<Utf8PathBuf>) -> &mut Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Sets the extension of fixture source files, without the leading `.`.
    pub fn set_source_extension(&mut self, extension: impl Into<String>) -> &mut Self {
        self.source_extension = extension.into();
        self
    }

    /// Sets the number of tests to run simultaneously.
    pub fn set_test_threads(&mut self, test_threads: TestThreads) -> &mut Self {
        self.test_threads = test_threads;
        self
    }

    /// Sets the per-test timeout.
    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = timeout;
        self
    }

    /// Sets the filter deciding which scanned tests are run.
    pub fn set_filter(&mut self, filter: TestFilter) -> &mut Self {
        self.filter = filter;
        self
    }

    /// Creates a new test runner.
    pub fn build(self) -> Result<TestRunner, TestRunnerBuildError> {
        let test_threads = self.test_threads.compute().max(1);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("conform-runner-worker")
            .build()
            .map_err(TestRunnerBuildError::TokioRuntimeCreate)?;

        let context = ExecutorContext::new(
            ProcessRunner::new(self.interpreter, self.timeout),
            ExpectationStore::new(self.tests_dir),
        );
        debug!(
            interpreter = %context.program(),
            tests_dir = %context.expectations().tests_dir(),
            test_threads,
            timeout = ?self.timeout,
            "built test runner"
        );

        let (control_tx, control_rx) = unbounded_channel();
        Ok(TestRunner {
            context,
            source_extension: self.source_extension,
            filter: self.filter,
            test_threads,
            state: None,
            control_tx,
            control_rx,
            runtime,
        })
    }
}

/// A handle to request a rerun or a cancellation of the run in progress.
///
/// Obtained through [`TestRunner::controller`]. It can be cloned, sent to other threads, and
/// used from within the event callback.
#[derive(Clone, Debug)]
pub struct RunController {
    sender: UnboundedSender<ControlMessage>,
}

impl RunController {
    /// Requests that the current generation be torn down and a new one started.
    ///
    /// Returns false if the runner no longer exists.
    pub fn request_rerun(&self) -> bool {
        self.sender.send(ControlMessage::Rerun).is_ok()
    }

    /// Requests that the run stop. Tests that haven't finished stay `NOT_STARTED`.
    ///
    /// Returns false if the runner no longer exists.
    pub fn request_cancel(&self) -> bool {
        self.sender.send(ControlMessage::Cancel).is_ok()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ControlMessage {
    Rerun,
    Cancel,
}

/// Context for running tests.
///
/// Created using [`TestRunnerBuilder::build`].
#[derive(Debug)]
pub struct TestRunner {
    context: ExecutorContext,
    source_extension: String,
    filter: TestFilter,
    test_threads: usize,
    state: Option<RunState>,
    control_tx: UnboundedSender<ControlMessage>,
    control_rx: UnboundedReceiver<ControlMessage>,
    runtime: Runtime,
}

impl TestRunner {
    /// Returns a handle that can request a rerun or cancellation while a run is in progress.
    pub fn controller(&self) -> RunController {
        RunController {
            sender: self.control_tx.clone(),
        }
    }

    /// Returns the number of tests run simultaneously.
    pub fn test_threads(&self) -> usize {
        self.test_threads
    }

    /// Executes every test that hasn't finished yet, starting generation 1 on the first call.
    ///
    /// The callback is called with each event.
    pub fn execute<F>(&mut self, mut callback: F) -> Result<RunStats, ScanError>
    where
        F: FnMut(RunEvent<'_>),
    {
        self.try_execute::<Infallible, _>(|event| {
            callback(event);
            Ok(())
        })
        .map_err(|error| match error {
            TestRunnerExecuteError::Scan(error) => error,
            TestRunnerExecuteError::Callback(never) => match never {},
        })
    }

    /// Executes every test that hasn't finished yet, starting generation 1 on the first call.
    ///
    /// A later call resumes the current generation: tests that were cancelled earlier are
    /// launched, finished tests are left alone.
    ///
    /// The callback is called with each event. If it returns an error, in-flight tests are
    /// killed and the error is returned.
    pub fn try_execute<E, F>(
        &mut self,
        callback: F,
    ) -> Result<RunStats, TestRunnerExecuteError<E>>
    where
        F: FnMut(RunEvent<'_>) -> Result<(), E>,
    {
        self.run_impl(false, callback)
    }

    /// Starts a new generation and runs it.
    ///
    /// The tests directory is scanned again, cached golden files are dropped, and statuses,
    /// results and counters are reset before any test is launched. If the scan fails, the
    /// previous generation is left as it was.
    pub fn rerun<E, F>(&mut self, callback: F) -> Result<RunStats, TestRunnerExecuteError<E>>
    where
        F: FnMut(RunEvent<'_>) -> Result<(), E>,
    {
        self.run_impl(true, callback)
    }

    /// Returns the current generation, or 0 if nothing has run yet.
    pub fn generation(&self) -> u32 {
        self.state.as_ref().map_or(0, |state| state.generation)
    }

    /// Returns the test list of the current generation.
    pub fn test_list(&self) -> Option<&TestList> {
        self.state.as_ref().map(|state| &state.test_list)
    }

    /// Returns the status of a test in the current generation.
    ///
    /// Returns `None` for tests that aren't part of the generation, including skipped tests.
    pub fn status(&self, id: &str) -> Option<TestStatus> {
        self.state.as_ref()?.statuses.get(id).copied()
    }

    /// Returns the result of a finished test in the current generation.
    pub fn result(&self, id: &str) -> Option<&TestResult> {
        self.state.as_ref()?.results.get(id)
    }

    /// Iterates over the tests of the current generation in id order, with their statuses.
    pub fn iter_statuses(&self) -> impl Iterator<Item = (&TestId, TestStatus)> + '_ {
        self.state
            .iter()
            .flat_map(|state| state.statuses.iter().map(|(id, status)| (id, *status)))
    }

    /// Returns the counters of the current generation.
    pub fn stats(&self) -> RunStats {
        self.state
            .as_ref()
            .map_or_else(RunStats::default, |state| state.aggregator.stats())
    }

    // ---
    // Helper methods
    // ---

    fn run_impl<E, F>(
        &mut self,
        new_generation: bool,
        mut callback: F,
    ) -> Result<RunStats, TestRunnerExecuteError<E>>
    where
        F: FnMut(RunEvent<'_>) -> Result<(), E>,
    {
        let Self {
            context,
            source_extension,
            filter,
            test_threads,
            state,
            control_rx,
            runtime,
            ..
        } = self;
        let test_threads = *test_threads;

        // Requests made while nothing was running don't apply to this call.
        drain_control(control_rx);

        let stopwatch = stopwatch();
        runtime.block_on(async {
            let mut start_new = new_generation || state.is_none();
            loop {
                if start_new {
                    start_generation(state, context, source_extension, filter)?;
                    drain_control(control_rx);
                }
                let run_state = state.as_mut().expect("run state is initialized above");

                if start_new {
                    let event = run_event(
                        &stopwatch,
                        run_state.generation,
                        RunEventKind::RunStarted {
                            test_list: &run_state.test_list,
                            stats: run_state.aggregator.stats(),
                        },
                    );
                    callback(event).map_err(TestRunnerExecuteError::Callback)?;
                }

                let outcome = run_generation(
                    context,
                    test_threads,
                    control_rx,
                    run_state,
                    &stopwatch,
                    &mut callback,
                )
                .await
                .map_err(TestRunnerExecuteError::Callback)?;

                match outcome {
                    GenerationOutcome::Completed | GenerationOutcome::Cancelled => break,
                    GenerationOutcome::RerunRequested => start_new = true,
                }
            }

            let run_state = state.as_ref().expect("run state is initialized above");
            let snapshot = stopwatch.snapshot();
            let stats = run_state.aggregator.stats();
            let event = run_event(
                &stopwatch,
                run_state.generation,
                RunEventKind::RunFinished {
                    start_time: snapshot.start_time,
                    elapsed: snapshot.duration,
                    stats,
                },
            );
            callback(event).map_err(TestRunnerExecuteError::Callback)?;

            Ok(stats)
        })
    }
}

#[derive(Debug)]
struct RunState {
    generation: u32,
    test_list: TestList,
    statuses: BTreeMap<TestId, TestStatus>,
    results: BTreeMap<TestId, TestResult>,
    aggregator: RunAggregator,
}

impl RunState {
    fn new(test_list: TestList) -> Self {
        let mut state = Self {
            generation: 0,
            statuses: BTreeMap::new(),
            results: BTreeMap::new(),
            aggregator: RunAggregator::new(test_list.run_count()),
            test_list,
        };
        state.fill_statuses();
        state.generation = 1;
        state
    }

    fn reset(&mut self, test_list: TestList) {
        self.generation += 1;
        self.aggregator.reset(test_list.run_count());
        self.results.clear();
        self.test_list = test_list;
        self.fill_statuses();
    }

    fn fill_statuses(&mut self) {
        self.statuses = self
            .test_list
            .iter_run()
            .map(|test_case| (test_case.id.clone(), TestStatus::NotStarted))
            .collect();
    }

    fn pending(&self) -> Vec<TestCase> {
        self.test_list
            .iter_run()
            .filter(|test_case| self.statuses.get(&test_case.id) == Some(&TestStatus::NotStarted))
            .cloned()
            .collect()
    }

    /// Records a completion. Returns false if it was stale or a duplicate.
    fn record(&mut self, result: TestResult) -> bool {
        if result.generation != self.generation {
            debug!(
                test = %result.id,
                result_generation = result.generation,
                generation = self.generation,
                "discarding result from a previous generation"
            );
            return false;
        }
        if !self.aggregator.on_transition(&result.id, result.status) {
            return false;
        }
        self.statuses.insert(result.id.clone(), result.status);
        self.results.insert(result.id.clone(), result);
        true
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum GenerationOutcome {
    Completed,
    Cancelled,
    RerunRequested,
}

fn start_generation(
    state: &mut Option<RunState>,
    context: &ExecutorContext,
    source_extension: &str,
    filter: &TestFilter,
) -> Result<(), ScanError> {
    let test_list = TestList::scan(context.expectations().tests_dir(), source_extension, filter)?;
    context.expectations().clear();

    let generation = match state {
        Some(state) => {
            state.reset(test_list);
            state.generation
        }
        None => state.insert(RunState::new(test_list)).generation,
    };
    debug!(generation, "starting generation");
    Ok(())
}

async fn run_generation<E, F>(
    context: &ExecutorContext,
    test_threads: usize,
    control_rx: &mut UnboundedReceiver<ControlMessage>,
    state: &mut RunState,
    stopwatch: &StopwatchStart,
    callback: &mut F,
) -> Result<GenerationOutcome, E>
where
    F: FnMut(RunEvent<'_>) -> Result<(), E>,
{
    let generation = state.generation;
    let pending = state.pending();
    let mut unfinished = pending.len();
    debug!(generation, pending = unfinished, "launching tests");

    // Dropping this stream drops in-flight executions, which kills their children.
    let mut executions = pin!(
        stream::iter(pending)
            .map(move |test_case| {
                context
                    .execute(test_case.clone(), generation)
                    .map(move |result| (test_case, result))
            })
            .buffer_unordered(test_threads)
    );

    loop {
        tokio::select! {
            biased;

            Some(message) = control_rx.recv() => {
                let (reason, outcome) = match message {
                    ControlMessage::Rerun => {
                        (CancelReason::RerunRequested, GenerationOutcome::RerunRequested)
                    }
                    ControlMessage::Cancel => {
                        (CancelReason::CancelRequested, GenerationOutcome::Cancelled)
                    }
                };
                let running = unfinished.min(test_threads);
                debug!(generation, running, reason = reason.to_static_str(), "cancelling tests");
                let event = run_event(
                    stopwatch,
                    generation,
                    RunEventKind::RunBeginCancel {
                        running,
                        reason,
                        stats: state.aggregator.stats(),
                    },
                );
                callback(event)?;
                return Ok(outcome);
            }

            next = executions.next() => {
                let Some((test_case, result)) = next else {
                    break;
                };
                unfinished -= 1;

                let id = test_case.id.clone();
                if !state.record(result) {
                    continue;
                }
                let event = run_event(
                    stopwatch,
                    generation,
                    RunEventKind::TestFinished {
                        test_case: &test_case,
                        result: &state.results[&id],
                        stats: state.aggregator.stats(),
                    },
                );
                callback(event)?;
            }
        }
    }

    // A rerun requested while the last test was being reported still applies.
    match control_rx.try_recv() {
        Ok(ControlMessage::Rerun) => Ok(GenerationOutcome::RerunRequested),
        Ok(ControlMessage::Cancel) | Err(TryRecvError::Empty | TryRecvError::Disconnected) => {
            Ok(GenerationOutcome::Completed)
        }
    }
}

fn run_event<'a>(
    stopwatch: &StopwatchStart,
    generation: u32,
    kind: RunEventKind<'a>,
) -> RunEvent<'a> {
    RunEvent {
        timestamp: Local::now(),
        generation,
        elapsed: stopwatch.snapshot().duration,
        kind,
    }
}

fn drain_control(control_rx: &mut UnboundedReceiver<ControlMessage>) {
    while let Ok(message) = control_rx.try_recv() {
        debug!(?message, "dropping stale control message");
    }
}
