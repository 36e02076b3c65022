// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The executor for tests.
//!
//! This component runs the interpreter on a fixture, loads the fixture's golden files and
//! classifies the outcome. It never touches run-wide state: results are handed back to the
//! coordinating loop in [`super::imp`], which owns the status map and counters.

use crate::{
    classify::{ClassifyInput, TestStatus, Verdict, classify},
    errors::{EncodingError, OutputSide, ProcessSpawnError, TestExecError},
    expectation::{ExpectationStore, OutputStream},
    list::TestCase,
    runner::TestResult,
    time::stopwatch,
};
use bytes::{Bytes, BytesMut};
use camino::{Utf8Path, Utf8PathBuf};
use std::{
    ffi::OsStr,
    io,
    process::{ExitStatus, Stdio},
    time::Duration,
};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

/// Output captured from a single interpreter run.
#[derive(Clone, Debug)]
pub struct CapturedOutput {
    /// Everything the process wrote to stdout.
    pub stdout: Bytes,

    /// Everything the process wrote to stderr.
    pub stderr: Bytes,

    /// How the process exited. A non-zero exit is not an error.
    pub exit_status: ExitStatus,
}

/// Runs a program and captures both of its output streams in full.
#[derive(Clone, Debug)]
pub struct ProcessRunner {
    program: Utf8PathBuf,
    timeout: Duration,
}

impl ProcessRunner {
    /// Creates a new process runner.
    pub fn new(program: impl Into<Utf8PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Returns the program this runner executes.
    pub fn program(&self) -> &Utf8Path {
        &self.program
    }

    /// Runs the program with `args`, with stdin attached to null.
    ///
    /// If the returned future is dropped before it completes, the child process is killed.
    pub async fn run<I, S>(&self, args: I) -> Result<CapturedOutput, TestExecError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = tokio::process::Command::new(self.program.as_std_path());
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|err| ProcessSpawnError::new(&self.program, err))?;

        let child_stdout = child.stdout.take();
        let child_stderr = child.stderr.take();
        let mut stdout = BytesMut::with_capacity(4096);
        let mut stderr = BytesMut::with_capacity(4096);

        // The streams are drained while waiting, so a child that fills one pipe can't block.
        let collect = async {
            let (stdout_res, stderr_res, status) = tokio::join!(
                read_all(child_stdout, &mut stdout),
                read_all(child_stderr, &mut stderr),
                child.wait(),
            );
            stdout_res?;
            stderr_res?;
            let status = status?;
            Ok::<_, io::Error>(status)
        };
        let res = tokio::time::timeout(self.timeout, collect).await;

        match res {
            Ok(Ok(exit_status)) => Ok(CapturedOutput {
                stdout: stdout.freeze(),
                stderr: stderr.freeze(),
                exit_status,
            }),
            Ok(Err(err)) => Err(TestExecError::Io(err)),
            Err(_elapsed) => {
                // Kill errors mean the process already exited.
                let _ = child.start_kill();
                let _ = child.wait().await;
                Err(TestExecError::Timeout {
                    timeout: self.timeout,
                })
            }
        }
    }
}

async fn read_all<R>(reader: Option<R>, buf: &mut BytesMut) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    if let Some(mut reader) = reader {
        loop {
            buf.reserve(4096);
            let bytes_read = reader.read_buf(buf).await?;
            if bytes_read == 0 {
                break;
            }
        }
    }
    Ok(())
}

/// Everything needed to execute a test, shared by all in-flight executions of a run.
#[derive(Debug)]
pub(super) struct ExecutorContext {
    process_runner: ProcessRunner,
    expectations: ExpectationStore,
}

impl ExecutorContext {
    pub(super) fn new(process_runner: ProcessRunner, expectations: ExpectationStore) -> Self {
        Self {
            process_runner,
            expectations,
        }
    }

    pub(super) fn expectations(&self) -> &ExpectationStore {
        &self.expectations
    }

    pub(super) fn program(&self) -> &Utf8Path {
        self.process_runner.program()
    }

    /// Runs a single test. Per-test failures are folded into the result as `EXEC_FAILED`.
    pub(super) async fn execute(&self, test_case: TestCase, generation: u32) -> TestResult {
        let stopwatch = stopwatch();
        let mut result =
            TestResult::new(test_case.id.clone(), generation, stopwatch.start_time());

        match self.execute_inner(&test_case, &mut result).await {
            Ok(verdict) => {
                if let Some(warning) = &verdict.warning {
                    warn!(test = %test_case.id, "malformed fixture: {warning}");
                }
                result.status = verdict.status;
                result.warning = verdict.warning;
            }
            Err(error) => {
                debug!(
                    test = %test_case.id,
                    kind = error.kind_str(),
                    "test execution failed: {error}"
                );
                result.status = TestStatus::ExecFailed;
                result.error = Some(error);
            }
        }

        result.elapsed = stopwatch.snapshot().duration;
        result
    }

    async fn execute_inner(
        &self,
        test_case: &TestCase,
        result: &mut TestResult,
    ) -> Result<Verdict, TestExecError> {
        let output = self.process_runner.run([test_case.source.as_str()]).await?;
        result.exit_status = Some(output.exit_status);
        result.actual_stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        result.actual_stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        let expected_stdout = self
            .expectations
            .load(&test_case.id, OutputStream::Stdout)
            .await?;
        let expected_stderr = self
            .expectations
            .load(&test_case.id, OutputStream::Stderr)
            .await?;
        result.expected_stdout = expected_stdout
            .as_deref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned());
        result.expected_stderr = expected_stderr
            .as_deref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned());

        check_utf8(&output.stdout, OutputStream::Stdout, OutputSide::Actual)?;
        check_utf8(&output.stderr, OutputStream::Stderr, OutputSide::Actual)?;
        if let Some(expected) = &expected_stdout {
            check_utf8(expected, OutputStream::Stdout, OutputSide::Expected)?;
        }
        if let Some(expected) = &expected_stderr {
            check_utf8(expected, OutputStream::Stderr, OutputSide::Expected)?;
        }

        Ok(classify(&ClassifyInput {
            actual_stdout: &output.stdout,
            actual_stderr: &output.stderr,
            expected_stdout: expected_stdout.as_deref(),
            expected_stderr: expected_stderr.as_deref(),
        }))
    }
}

fn check_utf8(bytes: &[u8], stream: OutputStream, side: OutputSide) -> Result<(), EncodingError> {
    std::str::from_utf8(bytes)
        .map(|_| ())
        .map_err(|err| EncodingError::new(stream, side, err))
}
