// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prints out test statuses, diffs and the run summary.
//!
//! Each finished test produces one status line. Tests that didn't pass are followed by a diff of
//! every stream whose output differs from its golden file.

use crate::{
    classify::{DisplayFilter, TestStatus},
    diff::{DiffStyles, TextDiff},
    errors::DisplayErrorChain,
    expectation::OutputStream,
    list::TestCase,
    reporter::{ReporterStderr, RunEvent, RunEventKind, RunStats},
    runner::TestResult,
};
use owo_colors::{OwoColorize, Style};
use std::{
    fmt,
    io::{self, BufWriter, Write},
    time::Duration,
};
use swrite::{SWrite, swrite};

pub(super) struct DisplayReporter<'a> {
    inner: DisplayReporterImpl,
    stderr: ReporterStderr<'a>,
}

impl<'a> DisplayReporter<'a> {
    pub(super) fn new(
        filter: DisplayFilter,
        no_diff: bool,
        verbose: bool,
        should_colorize: bool,
        stderr: ReporterStderr<'a>,
    ) -> Self {
        let mut styles = Styles::default();
        if should_colorize {
            styles.colorize();
        }

        Self {
            inner: DisplayReporterImpl {
                filter,
                no_diff,
                verbose,
                styles,
            },
            stderr,
        }
    }

    pub(super) fn write_event(&mut self, event: &RunEvent<'_>) -> io::Result<()> {
        match &mut self.stderr {
            ReporterStderr::Terminal => {
                let mut writer = BufWriter::new(io::stderr());
                self.inner.write_event_impl(event, &mut writer)?;
                writer.flush()
            }
            ReporterStderr::Buffer(buf) => self.inner.write_event_impl(event, &mut **buf),
        }
    }
}

struct DisplayReporterImpl {
    filter: DisplayFilter,
    no_diff: bool,
    verbose: bool,
    styles: Styles,
}

impl DisplayReporterImpl {
    fn write_event_impl(&self, event: &RunEvent<'_>, writer: &mut dyn Write) -> io::Result<()> {
        match &event.kind {
            RunEventKind::RunStarted { test_list, stats } => {
                let label = if event.generation > 1 {
                    "Rerunning"
                } else {
                    "Starting"
                };
                write!(writer, "{:>12} ", label.style(self.styles.pass))?;
                write!(
                    writer,
                    "{} {}",
                    stats.total.style(self.styles.count),
                    tests_str(stats.total)
                )?;

                let skip_count = test_list.skip_count();
                if skip_count > 0 {
                    write!(
                        writer,
                        " ({} {})",
                        skip_count.style(self.styles.count),
                        "skipped".style(self.styles.skip)
                    )?;
                }
                write!(writer, " in {}", test_list.tests_dir())?;
                if self.verbose {
                    write!(writer, " (generation {})", event.generation)?;
                }
                writeln!(writer)?;
            }
            RunEventKind::TestFinished {
                test_case, result, ..
            } => {
                if !self.filter.shows(result.status) {
                    return Ok(());
                }
                self.write_status_line(test_case, result, writer)?;

                if let Some(warning) = &result.warning {
                    writeln!(
                        writer,
                        "{:>12} {}: {warning}",
                        "WARNING".style(self.styles.skip),
                        test_case.id.style(self.styles.test_id)
                    )?;
                }

                if let Some(error) = &result.error {
                    writeln!(writer, "{}", DisplayErrorChain::new(error))?;
                } else if !result.status.is_success() && !self.no_diff {
                    self.write_diffs(result, writer)?;
                }
            }
            RunEventKind::RunBeginCancel {
                running, reason, ..
            } => {
                write!(
                    writer,
                    "{:>12} due to {}",
                    "Cancelling".style(self.styles.fail),
                    reason.to_static_str().style(self.styles.fail)
                )?;
                writeln!(
                    writer,
                    ": {} {} still running",
                    running.style(self.styles.count),
                    tests_str(*running)
                )?;
            }
            RunEventKind::RunFinished { elapsed, stats, .. } => {
                let summary_style = if stats.total == 0 {
                    self.styles.skip
                } else if stats.is_success() {
                    self.styles.pass
                } else {
                    self.styles.fail
                };
                write!(
                    writer,
                    "{}\n{:>12} ",
                    "-".repeat(12),
                    "Summary".style(summary_style)
                )?;
                write!(writer, "{}", DisplayBracketedDuration(*elapsed))?;

                write!(writer, "{}", stats.done.style(self.styles.count))?;
                if stats.done != stats.total {
                    write!(writer, "/{}", stats.total.style(self.styles.count))?;
                }

                let mut summary_str = String::new();
                write_summary_str(stats, &self.styles, &mut summary_str);
                writeln!(writer, " {} run: {summary_str}", tests_str(stats.total))?;
            }
        }

        Ok(())
    }

    fn write_status_line(
        &self,
        test_case: &TestCase,
        result: &TestResult,
        writer: &mut dyn Write,
    ) -> io::Result<()> {
        let style = match result.status {
            TestStatus::Passed => self.styles.pass,
            TestStatus::Almost | TestStatus::NotStarted => self.styles.skip,
            TestStatus::DiffError | TestStatus::Failed | TestStatus::ExecFailed => {
                self.styles.fail
            }
        };
        write!(writer, "{:>12} ", status_str(result.status).style(style))?;
        write!(writer, "{}", DisplayBracketedDuration(result.elapsed))?;
        write!(writer, "{}", test_case.id.style(self.styles.test_id))?;

        if self.verbose {
            if let Some(exit_status) = result.exit_status {
                write!(writer, " ({exit_status})")?;
            }
        }
        writeln!(writer)
    }

    fn write_diffs(&self, result: &TestResult, writer: &mut dyn Write) -> io::Result<()> {
        for stream in OutputStream::ALL {
            let (expected, actual) = match stream {
                OutputStream::Stdout => (result.expected_stdout.as_deref(), &result.actual_stdout),
                OutputStream::Stderr => (result.expected_stderr.as_deref(), &result.actual_stderr),
            };
            // A missing golden file expects no output.
            let expected_text = expected.unwrap_or_default();
            if expected_text == actual.as_str() {
                continue;
            }

            let header = match expected {
                Some(_) => format!("--- {} DIFF: {} ---", stream_str(stream), result.id),
                None => format!(
                    "--- {} DIFF: {} (no golden file) ---",
                    stream_str(stream),
                    result.id
                ),
            };
            writeln!(writer, "\n{}", header.style(self.styles.fail_output))?;

            TextDiff::new(expected_text, actual).render(writer, &self.styles.diff)?;
            writeln!(writer)?;
        }

        Ok(())
    }
}

fn status_str(status: TestStatus) -> &'static str {
    match status {
        TestStatus::NotStarted => "NOT STARTED",
        TestStatus::Passed => "PASS",
        TestStatus::Failed => "FAIL",
        TestStatus::DiffError => "DIFF ERROR",
        TestStatus::Almost => "ALMOST",
        TestStatus::ExecFailed => "EXEC FAIL",
    }
}

fn stream_str(stream: OutputStream) -> &'static str {
    match stream {
        OutputStream::Stdout => "STDOUT",
        OutputStream::Stderr => "STDERR",
    }
}

fn tests_str(count: usize) -> &'static str {
    if count == 1 { "test" } else { "tests" }
}

fn write_summary_str(stats: &RunStats, styles: &Styles, out: &mut String) {
    // Written in this style to ensure new fields are accounted for.
    let &RunStats {
        total: _,
        done: _,
        passed,
        almost,
        diff_error,
        failed,
        exec_failed,
    } = stats;

    swrite!(
        out,
        "{} {}",
        passed.style(styles.count),
        "passed".style(styles.pass)
    );

    let others = [
        (almost, "almost", styles.skip),
        (diff_error, "differ in error", styles.fail),
        (failed, "failed", styles.fail),
        (exec_failed, "exec failed", styles.fail),
        (stats.remaining(), "not run", styles.skip),
    ];
    for (count, label, style) in others {
        if count > 0 {
            swrite!(out, ", {} {}", count.style(styles.count), label.style(style));
        }
    }
}

struct DisplayBracketedDuration(Duration);

impl fmt::Display for DisplayBracketedDuration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // * > means right-align.
        // * 8 is the number of characters to pad to.
        // * .3 means print three digits after the decimal point.
        write!(f, "[{:>8.3?}s] ", self.0.as_secs_f64())
    }
}

#[derive(Debug, Default)]
struct Styles {
    count: Style,
    pass: Style,
    fail: Style,
    skip: Style,
    test_id: Style,
    fail_output: Style,
    diff: DiffStyles,
}

impl Styles {
    fn colorize(&mut self) {
        self.count = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.skip = Style::new().yellow().bold();
        self.test_id = Style::new().blue().bold();
        self.fail_output = Style::new().magenta();
        self.diff = DiffStyles {
            delete: Style::new().red(),
            insert: Style::new().green(),
        };
    }
}
