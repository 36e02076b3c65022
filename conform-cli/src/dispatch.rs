// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError,
    errors::Result,
    output::{OutputContext, OutputOpts, OutputWriter, clap_styles},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand, ValueEnum};
use conform_metadata::ConformExitCode;
use conform_runner::{
    config::{ConformConfig, TestThreads},
    errors::{TestRunnerExecuteError, WriteTestListError},
    list::{OutputFormat, SerializableFormat, TestList},
    reporter::TestReporterBuilder,
    runner::TestRunnerBuilder,
    test_filter::{TestFilter, TestFilterPatterns},
};
use std::{io::Write, time::Duration};
use supports_color::Stream;
use tracing::debug;

/// A golden-file conformance harness.
///
/// Runs an interpreter on every fixture under the tests directory, and compares its output with
/// the fixture's golden files.
#[derive(Debug, Parser)]
#[command(version, name = "conform", styles = clap_styles::style())]
pub struct ConformApp {
    /// Workspace root; relative paths in the config are resolved against it [default: current
    /// directory]
    #[arg(long, global = true, value_name = "DIR", env = "CONFORM_WORKSPACE_ROOT")]
    workspace_root: Option<Utf8PathBuf>,

    #[command(flatten)]
    config_opts: ConfigOpts,

    #[command(flatten)]
    output: OutputOpts,

    #[command(subcommand)]
    command: Command,
}

impl ConformApp {
    /// Initializes the output context, including the logger.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the process exit code on success.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        let workspace_root = match self.workspace_root {
            Some(workspace_root) => workspace_root,
            None => current_dir()?,
        };
        let config = self.config_opts.make_config(&workspace_root)?;

        match self.command {
            Command::List {
                filter_opts,
                fixture_opts,
                message_format,
            } => {
                let filter = filter_opts.to_filter()?;
                let test_list = TestList::scan(
                    fixture_opts.tests_dir(&config),
                    config.source_extension(),
                    &filter,
                )?;

                let mut writer = output_writer.stdout_writer();
                test_list.write(
                    message_format.to_output_format(output.verbose),
                    fixture_opts.interpreter(&config),
                    &mut writer,
                    output.color.should_colorize(Stream::Stdout),
                )?;
                writer.flush().map_err(WriteTestListError::Io)?;
                Ok(ConformExitCode::OK)
            }
            Command::Run {
                filter_opts,
                fixture_opts,
                runner_opts,
                reporter_opts,
            } => {
                let mut runner_builder = TestRunnerBuilder::from_config(&config);
                runner_builder
                    .set_tests_dir(fixture_opts.tests_dir(&config))
                    .set_interpreter(fixture_opts.interpreter(&config))
                    .set_filter(filter_opts.to_filter()?);
                runner_opts.apply(&mut runner_builder);
                let mut runner = runner_builder.build()?;
                debug!(test_threads = runner.test_threads(), "built test runner");

                let mut reporter = reporter_opts
                    .to_builder()
                    .set_colorize(output.color.should_colorize(Stream::Stderr))
                    .set_verbose(output.verbose)
                    .build(output_writer.reporter_output());

                let run_stats = runner
                    .try_execute(|event| reporter.report_event(&event))
                    .map_err(|error| match error {
                        TestRunnerExecuteError::Scan(err) => ExpectedError::from(err),
                        TestRunnerExecuteError::Callback(err) => ExpectedError::from(err),
                    })?;

                if run_stats.total == 0 {
                    return Err(ExpectedError::no_tests_run(
                        fixture_opts.tests_dir(&config),
                    ));
                }
                if !run_stats.is_success() {
                    return Err(ExpectedError::test_run_failed());
                }
                Ok(ConformExitCode::OK)
            }
        }
    }
}

#[derive(Debug, Args)]
struct ConfigOpts {
    /// Config file [default: workspace-root/.config/conform.toml]
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,
}

impl ConfigOpts {
    fn make_config(&self, workspace_root: &Utf8Path) -> Result<ConformConfig> {
        Ok(ConformConfig::from_sources(
            workspace_root,
            self.config_file.as_deref(),
        )?)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List tests in the tests directory
    ///
    /// Use --message-format json to get machine-readable output.
    List {
        #[command(flatten)]
        filter_opts: TestFilterOpts,

        #[command(flatten)]
        fixture_opts: FixtureOpts,

        /// Output format
        #[arg(
            short = 'T',
            long,
            value_enum,
            default_value_t,
            help_heading = "Output options",
            value_name = "FMT"
        )]
        message_format: MessageFormatOpts,
    },

    /// Run tests and compare their output with golden files
    ///
    /// Exits with a non-zero code unless every test passed.
    Run {
        #[command(flatten)]
        filter_opts: TestFilterOpts,

        #[command(flatten)]
        fixture_opts: FixtureOpts,

        #[command(flatten)]
        runner_opts: TestRunnerOpts,

        #[command(flatten)]
        reporter_opts: TestReporterOpts,
    },
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum MessageFormatOpts {
    #[default]
    Human,
    Json,
    JsonPretty,
}

impl MessageFormatOpts {
    fn to_output_format(self, verbose: bool) -> OutputFormat {
        match self {
            Self::Human => OutputFormat::Human { verbose },
            Self::Json => OutputFormat::Serializable(SerializableFormat::Json),
            Self::JsonPretty => OutputFormat::Serializable(SerializableFormat::JsonPretty),
        }
    }
}

#[derive(Debug, Default, Args)]
#[command(next_help_heading = "Filter options")]
struct TestFilterOpts {
    /// Skip tests whose ids contain this pattern
    #[arg(long, value_name = "PATTERN")]
    skip: Vec<String>,

    /// Match test ids against filters and skip patterns exactly
    #[arg(long)]
    exact: bool,

    /// Test id filters: run tests whose ids contain any of these
    #[arg(value_name = "FILTERS", help_heading = None)]
    filters: Vec<String>,
}

impl TestFilterOpts {
    fn to_filter(&self) -> Result<TestFilter> {
        let mut patterns = TestFilterPatterns::new(self.filters.clone());
        for skip in &self.skip {
            patterns.add_skip_pattern(skip.clone());
        }
        patterns.set_exact(self.exact);
        Ok(TestFilter::new(&patterns)?)
    }
}

#[derive(Debug, Default, Args)]
#[command(next_help_heading = "Fixture options")]
struct FixtureOpts {
    /// Directory containing one fixture directory per test [default: from config]
    #[arg(long, value_name = "DIR")]
    tests_dir: Option<Utf8PathBuf>,

    /// Interpreter invoked on each fixture's source file [default: from config]
    #[arg(long, value_name = "PATH", env = "CONFORM_INTERPRETER")]
    interpreter: Option<Utf8PathBuf>,
}

impl FixtureOpts {
    fn tests_dir<'a>(&'a self, config: &'a ConformConfig) -> &'a Utf8Path {
        self.tests_dir
            .as_deref()
            .unwrap_or_else(|| config.tests_dir())
    }

    fn interpreter<'a>(&'a self, config: &'a ConformConfig) -> &'a Utf8Path {
        self.interpreter
            .as_deref()
            .unwrap_or_else(|| config.interpreter())
    }
}

#[derive(Debug, Default, Args)]
#[command(next_help_heading = "Runner options")]
struct TestRunnerOpts {
    /// Number of tests to run simultaneously [possible values: integer or "num-cpus"]
    /// [default: from config]
    #[arg(
        long,
        short = 'j',
        visible_alias = "jobs",
        value_name = "THREADS",
        env = "CONFORM_TEST_THREADS"
    )]
    test_threads: Option<TestThreads>,

    /// Time after which a test is killed, e.g. 30s or 2m [default: from config]
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,
}

impl TestRunnerOpts {
    fn apply(&self, builder: &mut TestRunnerBuilder) {
        if let Some(test_threads) = self.test_threads {
            builder.set_test_threads(test_threads);
        }
        if let Some(timeout) = self.timeout {
            builder.set_timeout(timeout);
        }
    }
}

#[derive(Debug, Default, Args)]
#[command(next_help_heading = "Reporter options")]
struct TestReporterOpts {
    /// Hide tests that passed or almost passed; the summary still counts them
    #[arg(long)]
    hide_passed: bool,

    /// Don't print diffs for tests that didn't pass
    #[arg(long)]
    no_diff: bool,

    /// Write a JUnit XML report to this path when the run finishes
    #[arg(long, value_name = "PATH")]
    junit: Option<Utf8PathBuf>,
}

impl TestReporterOpts {
    fn to_builder(&self) -> TestReporterBuilder {
        let mut builder = TestReporterBuilder::default();
        builder
            .set_hide_passed(self.hide_passed)
            .set_no_diff(self.no_diff);
        if let Some(junit) = &self.junit {
            builder.set_junit_path(junit);
        }
        builder
    }
}

fn current_dir() -> Result<Utf8PathBuf> {
    let dir = std::env::current_dir().map_err(ExpectedError::current_dir_failed)?;
    Utf8PathBuf::try_from(dir)
        .map_err(|err| ExpectedError::workspace_root_invalid_utf8(err.into_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use conform_metadata::TestListSummary;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_argument_parsing() {
        use clap::error::ErrorKind::{self, *};

        let valid: &[&'static str] = &[
            // ---
            // Basic commands
            // ---
            "conform list",
            "conform run",
            // ---
            // Commands with arguments
            // ---
            "conform list --message-format json-pretty",
            "conform list -T json",
            "conform list foo bar --skip baz",
            "conform list --exact ok1",
            "conform --workspace-root /tmp list",
            "conform list --workspace-root /tmp --config-file conform.toml",
            "conform run -j 4",
            "conform run --jobs num-cpus",
            "conform run --test-threads=2 --timeout 90s",
            "conform run --timeout 2m --hide-passed --no-diff",
            "conform run --junit target/junit.xml",
            "conform run --interpreter ./compiler.exe --tests-dir tests",
            "conform -v --color never run",
            "conform run --color=always -v ok1",
        ];

        let invalid: &[(&'static str, ErrorKind)] = &[
            ("conform -v", MissingSubcommand),
            ("conform list --message-format xml", InvalidValue),
            ("conform run -j many", ValueValidation),
            ("conform run --timeout soon", ValueValidation),
            ("conform run --color sometimes", InvalidValue),
            ("conform list --hide-passed", UnknownArgument),
            ("conform list --junit out.xml", UnknownArgument),
        ];

        for valid_args in valid {
            let cmd = shell_words::split(valid_args).expect("valid command line");
            if let Err(error) = ConformApp::try_parse_from(cmd) {
                panic!("{valid_args} should have successfully parsed, but didn't: {error}");
            }
        }

        for &(invalid_args, kind) in invalid {
            match ConformApp::try_parse_from(
                shell_words::split(invalid_args).expect("valid command"),
            ) {
                Ok(_) => panic!("{invalid_args} should have errored out but successfully parsed"),
                Err(error) => {
                    let actual_kind = error.kind();
                    assert_eq!(
                        actual_kind, kind,
                        "{invalid_args} should error with {kind:?}, but errored with {actual_kind:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_filter_opts() {
        let app = ConformApp::try_parse_from(["conform", "list", "--exact", "ok1", "--skip", "x"])
            .expect("valid command line");
        let Command::List { filter_opts, .. } = app.command else {
            panic!("expected list command");
        };
        assert_eq!(filter_opts.filters, vec!["ok1".to_owned()]);
        assert_eq!(filter_opts.skip, vec!["x".to_owned()]);
        assert!(filter_opts.exact);
    }

    /// A workspace with a config that runs `sh` fixtures under `tests/`.
    #[cfg(unix)]
    fn sh_workspace(fixtures: &[(&str, &str, &str)]) -> Utf8TempDir {
        let dir = camino_tempfile::tempdir().expect("created temp dir");
        let config_dir = dir.path().join(".config");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("conform.toml"),
            indoc! {r#"
                tests-dir = "tests"
                interpreter = "/bin/sh"
                source-extension = "sh"
                test-threads = 2
            "#},
        )
        .unwrap();

        let tests_dir = dir.path().join("tests");
        std::fs::create_dir_all(&tests_dir).unwrap();
        for (id, script, golden_stdout) in fixtures {
            let fixture = tests_dir.join(id);
            std::fs::create_dir_all(&fixture).unwrap();
            std::fs::write(fixture.join("main.sh"), script).unwrap();
            std::fs::write(fixture.join("stdout.txt"), golden_stdout).unwrap();
        }
        dir
    }

    #[cfg(unix)]
    fn exec(dir: &Utf8TempDir, args: &[&str]) -> (Result<i32>, String, String) {
        let mut cmd = vec!["conform", "--workspace-root", dir.path().as_str(), "--color=never"];
        cmd.extend_from_slice(args);
        let app = ConformApp::try_parse_from(cmd).expect("valid command line");
        let output = app.init_output();

        let mut output_writer = OutputWriter::Test {
            stdout: Vec::new(),
            stderr: Vec::new(),
        };
        let res = app.exec(output, &mut output_writer);
        let OutputWriter::Test { stdout, stderr } = output_writer else {
            unreachable!("output writer is a test writer");
        };
        (
            res,
            String::from_utf8(stdout).expect("stdout is UTF-8"),
            String::from_utf8(stderr).expect("stderr is UTF-8"),
        )
    }

    #[cfg(unix)]
    #[test]
    fn test_list_json() {
        let dir = sh_workspace(&[
            ("alpha", "printf 'a\\n'\n", "a\n"),
            ("beta", "printf 'b\\n'\n", "b\n"),
        ]);
        let (res, stdout, _) = exec(&dir, &["list", "--message-format", "json", "--skip", "beta"]);
        assert_eq!(res.expect("list succeeded"), ConformExitCode::OK);

        let summary = TestListSummary::parse_json(&stdout).expect("valid JSON");
        assert_eq!(summary.interpreter, "/bin/sh");
        assert_eq!(summary.test_count, 1);
        let ids: Vec<_> = summary.tests.keys().map(String::as_str).collect();
        assert_eq!(ids, ["alpha", "beta"]);
        assert!(summary.tests["alpha"].filter_match);
        assert!(!summary.tests["beta"].filter_match);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_exit_codes() {
        let dir = sh_workspace(&[
            ("alpha", "printf 'a\\n'\n", "a\n"),
            ("beta", "printf 'b\\n'\n", "not b\n"),
        ]);

        let (res, _, stderr) = exec(&dir, &["run", "alpha"]);
        assert_eq!(res.expect("alpha passes"), ConformExitCode::OK);
        assert!(stderr.contains("1 test run: 1 passed"), "{stderr}");

        let (res, _, stderr) = exec(&dir, &["run"]);
        let err = res.expect_err("beta fails");
        assert_eq!(err.process_exit_code(), ConformExitCode::TEST_RUN_FAILED);
        assert!(stderr.contains("--- STDOUT DIFF: beta ---"), "{stderr}");

        let (res, _, _) = exec(&dir, &["run", "--no-diff", "gamma"]);
        let err = res.expect_err("no tests match");
        assert_eq!(err.process_exit_code(), ConformExitCode::NO_TESTS_RUN);

        let (res, _, _) = exec(&dir, &["run", "--tests-dir", "missing"]);
        let err = res.expect_err("tests dir doesn't exist");
        assert_eq!(err.process_exit_code(), ConformExitCode::SCAN_FAILED);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_writes_junit() {
        let dir = sh_workspace(&[("alpha", "printf 'a\\n'\n", "a\n")]);
        let junit_path = dir.path().join("target/junit.xml");
        let (res, _, _) = exec(&dir, &["run", "--junit", junit_path.as_str()]);
        assert_eq!(res.expect("alpha passes"), ConformExitCode::OK);

        let xml = std::fs::read_to_string(&junit_path).expect("JUnit report written");
        assert!(xml.contains(r#"name="tests""#), "{xml}");
        assert!(xml.contains(r#"name="alpha""#), "{xml}");
    }
}
