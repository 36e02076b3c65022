// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{ScanError, WriteTestListError},
    list::{OutputFormat, Styles},
    test_filter::TestFilter,
};
use camino::{Utf8Path, Utf8PathBuf};
use conform_metadata::{TestCaseSummary, TestListSummary};
use owo_colors::OwoColorize;
use std::{borrow::Borrow, collections::BTreeMap, fmt, fs, io, io::Write, sync::Arc};
use tracing::debug;

/// The name of the golden stdout file within a fixture directory.
pub const STDOUT_FILE: &str = "stdout.txt";

/// The name of the golden stderr file within a fixture directory.
pub const STDERR_FILE: &str = "stderr.txt";

/// The stem of the source file within a fixture directory.
pub const SOURCE_STEM: &str = "main";

/// The identifier of a test: the name of its fixture directory.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TestId(Arc<str>);

impl TestId {
    /// Creates a new test id.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TestId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single discovered fixture.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestCase {
    /// The test id.
    pub id: TestId,

    /// The source file passed to the interpreter. It may not exist.
    pub source: Utf8PathBuf,

    /// The golden stdout file, if it existed at scan time.
    pub expected_stdout: Option<Utf8PathBuf>,

    /// The golden stderr file, if it existed at scan time.
    pub expected_stderr: Option<Utf8PathBuf>,

    /// Whether this test matched the filter.
    pub filter_match: bool,
}

impl TestCase {
    fn new(tests_dir: &Utf8Path, id: TestId, source_extension: &str, filter_match: bool) -> Self {
        let dir = tests_dir.join(id.as_str());
        let source = dir.join(format!("{SOURCE_STEM}.{source_extension}"));
        let golden = |name: &str| {
            let path = dir.join(name);
            path.is_file().then_some(path)
        };

        Self {
            source,
            expected_stdout: golden(STDOUT_FILE),
            expected_stderr: golden(STDERR_FILE),
            id,
            filter_match,
        }
    }

    /// Converts this test case into its serializable form.
    pub fn to_summary(&self) -> TestCaseSummary {
        TestCaseSummary::new(
            self.source.clone(),
            self.expected_stdout.clone(),
            self.expected_stderr.clone(),
            self.filter_match,
        )
    }
}

/// The set of tests discovered under a tests directory.
#[derive(Clone, Debug)]
pub struct TestList {
    tests_dir: Utf8PathBuf,
    test_cases: BTreeMap<TestId, TestCase>,
    run_count: usize,
}

impl TestList {
    /// Scans `tests_dir` and builds a test list, marking tests that don't match `filter` as
    /// skipped.
    pub fn scan(
        tests_dir: impl Into<Utf8PathBuf>,
        source_extension: &str,
        filter: &TestFilter,
    ) -> Result<Self, ScanError> {
        let tests_dir = tests_dir.into();
        let ids = scan_ids(&tests_dir)?;

        let test_cases: BTreeMap<_, _> = ids
            .into_iter()
            .map(|id| {
                let filter_match = filter.filter_match(&id);
                let test_case = TestCase::new(&tests_dir, id.clone(), source_extension, filter_match);
                (id, test_case)
            })
            .collect();
        let run_count = test_cases.values().filter(|case| case.filter_match).count();
        debug!(
            %tests_dir,
            test_count = test_cases.len(),
            run_count,
            "scanned tests directory"
        );

        Ok(Self {
            tests_dir,
            test_cases,
            run_count,
        })
    }

    /// Returns the tests directory.
    pub fn tests_dir(&self) -> &Utf8Path {
        &self.tests_dir
    }

    /// Returns the total number of tests, including skipped ones.
    pub fn test_count(&self) -> usize {
        self.test_cases.len()
    }

    /// Returns the number of tests that match the filter.
    ///
    /// It is always the case that `run_count + skip_count == test_count`.
    pub fn run_count(&self) -> usize {
        self.run_count
    }

    /// Returns the number of tests that don't match the filter.
    pub fn skip_count(&self) -> usize {
        self.test_cases.len() - self.run_count
    }

    /// Looks up a test by id.
    pub fn get(&self, id: &str) -> Option<&TestCase> {
        self.test_cases.get(id)
    }

    /// Iterates over all tests in id order, including skipped ones.
    pub fn iter(&self) -> impl Iterator<Item = &TestCase> + '_ {
        self.test_cases.values()
    }

    /// Iterates over the tests that match the filter, in id order.
    pub fn iter_run(&self) -> impl Iterator<Item = &TestCase> + '_ {
        self.iter().filter(|case| case.filter_match)
    }

    /// Constructs a serializable summary for this test list.
    pub fn to_summary(&self, interpreter: &Utf8Path) -> TestListSummary {
        let mut summary = TestListSummary::new(self.tests_dir.clone(), interpreter);
        summary.test_count = self.run_count;
        summary.tests = self
            .test_cases
            .iter()
            .map(|(id, case)| (id.as_str().to_owned(), case.to_summary()))
            .collect();
        summary
    }

    /// Writes this list in the given format.
    pub fn write(
        &self,
        output_format: OutputFormat,
        interpreter: &Utf8Path,
        writer: &mut dyn Write,
        colorize: bool,
    ) -> Result<(), WriteTestListError> {
        match output_format {
            OutputFormat::Human { verbose } => self
                .write_human(writer, verbose, colorize)
                .map_err(WriteTestListError::Io),
            OutputFormat::Serializable(format) => {
                self.to_summary(interpreter)
                    .write_json(format.is_pretty(), &mut *writer)
                    .map_err(WriteTestListError::Json)?;
                writeln!(writer).map_err(WriteTestListError::Io)
            }
        }
    }

    fn write_human(&self, writer: &mut dyn Write, verbose: bool, colorize: bool) -> io::Result<()> {
        let mut styles = Styles::default();
        if colorize {
            styles.colorize();
        }

        if self.test_cases.is_empty() {
            writeln!(writer, "(no tests)")?;
            return Ok(());
        }

        for case in self.test_cases.values() {
            match (verbose, case.filter_match) {
                (_, true) => writeln!(writer, "{}", case.id.style(styles.test_id))?,
                (true, false) => writeln!(
                    writer,
                    "{} {}",
                    case.id.style(styles.test_id),
                    "(skipped)".style(styles.skipped)
                )?,
                (false, false) => continue,
            }

            if verbose {
                writeln!(writer, "  {} {}", "source:".style(styles.field), case.source)?;
                for (label, path) in [
                    ("stdout:", &case.expected_stdout),
                    ("stderr:", &case.expected_stderr),
                ] {
                    match path {
                        Some(path) => writeln!(writer, "  {} {}", label.style(styles.field), path)?,
                        None => writeln!(writer, "  {} (none)", label.style(styles.field))?,
                    }
                }
            }
        }

        Ok(())
    }
}

/// Lists the test ids under `root`: the names of its immediate child directories, sorted.
///
/// Files directly under `root` are ignored.
pub fn scan_ids(root: &Utf8Path) -> Result<Vec<TestId>, ScanError> {
    match fs::metadata(root) {
        Ok(metadata) if metadata.is_dir() => {}
        Ok(_) => {
            return Err(ScanError::NotADirectory {
                root: root.to_owned(),
            });
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(ScanError::RootNotFound {
                root: root.to_owned(),
            });
        }
        Err(err) => {
            return Err(ScanError::ReadDir {
                root: root.to_owned(),
                err,
            });
        }
    }

    let read_dir_err = |err| ScanError::ReadDir {
        root: root.to_owned(),
        err,
    };

    let mut ids = Vec::new();
    for entry in fs::read_dir(root).map_err(read_dir_err)? {
        let entry = entry.map_err(read_dir_err)?;
        // Follows symlinks, so a link to a fixture directory counts as a fixture.
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry
            .file_name()
            .into_string()
            .map_err(|name| ScanError::NonUtf8Name {
                root: root.to_owned(),
                name,
            })?;
        ids.push(TestId::new(name));
    }

    ids.sort_unstable();
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{list::SerializableFormat, test_filter::TestFilterPatterns};
    use camino_tempfile::Utf8TempDir;
    use indoc::formatdoc;
    use pretty_assertions::assert_eq;

    fn make_tree() -> Utf8TempDir {
        let dir = camino_tempfile::tempdir().expect("created temp dir");
        let root = dir.path();
        for id in ["ok2", "ok1", "type-error"] {
            fs::create_dir(root.join(id)).unwrap();
            fs::write(root.join(id).join("main.cara"), "print 1").unwrap();
        }
        fs::write(root.join("ok1/stdout.txt"), "hi\n").unwrap();
        fs::write(root.join("type-error/stderr.txt"), "E0012: type mismatch\n").unwrap();
        fs::write(root.join("README.md"), "not a fixture").unwrap();
        dir
    }

    #[test]
    fn scan_is_sorted_and_ignores_files() {
        let dir = make_tree();
        let ids = scan_ids(dir.path()).unwrap();
        let ids: Vec<_> = ids.iter().map(TestId::as_str).collect();
        assert_eq!(ids, ["ok1", "ok2", "type-error"]);

        // Scanning is deterministic.
        assert_eq!(
            scan_ids(dir.path()).unwrap(),
            scan_ids(dir.path()).unwrap()
        );
    }

    #[test]
    fn scan_errors() {
        let dir = make_tree();

        let missing = dir.path().join("does-not-exist");
        assert!(matches!(
            scan_ids(&missing),
            Err(ScanError::RootNotFound { root }) if root == missing
        ));

        let file = dir.path().join("README.md");
        assert!(matches!(
            scan_ids(&file),
            Err(ScanError::NotADirectory { root }) if root == file
        ));
    }

    #[test]
    fn empty_root_has_no_tests() {
        let dir = camino_tempfile::tempdir().unwrap();
        let list = TestList::scan(dir.path(), "cara", &TestFilter::all()).unwrap();
        assert_eq!(list.test_count(), 0);
        assert_eq!(list.run_count(), 0);
    }

    #[test]
    fn golden_paths_recorded_when_present() {
        let dir = make_tree();
        let list = TestList::scan(dir.path(), "cara", &TestFilter::all()).unwrap();

        let ok1 = list.get("ok1").unwrap();
        assert_eq!(ok1.source, dir.path().join("ok1/main.cara"));
        assert_eq!(ok1.expected_stdout, Some(dir.path().join("ok1/stdout.txt")));
        assert_eq!(ok1.expected_stderr, None);

        let type_error = list.get("type-error").unwrap();
        assert_eq!(type_error.expected_stdout, None);
        assert_eq!(
            type_error.expected_stderr,
            Some(dir.path().join("type-error/stderr.txt"))
        );
    }

    #[test]
    fn filter_marks_skipped() {
        let dir = make_tree();
        let filter = TestFilter::new(&TestFilterPatterns::new(vec!["ok".to_owned()])).unwrap();
        let list = TestList::scan(dir.path(), "cara", &filter).unwrap();

        assert_eq!(list.test_count(), 3);
        assert_eq!(list.run_count(), 2);
        assert_eq!(list.skip_count(), 1);
        let run: Vec<_> = list.iter_run().map(|case| case.id.as_str()).collect();
        assert_eq!(run, ["ok1", "ok2"]);
    }

    #[test]
    fn write_human_verbose() {
        let dir = make_tree();
        let filter = TestFilter::new(&TestFilterPatterns::new(vec!["ok1".to_owned()])).unwrap();
        let list = TestList::scan(dir.path(), "cara", &filter).unwrap();

        let mut buf = Vec::new();
        list.write(
            OutputFormat::Human { verbose: false },
            Utf8Path::new("interp"),
            &mut buf,
            false,
        )
        .unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "ok1\n");

        let mut buf = Vec::new();
        list.write(
            OutputFormat::Human { verbose: true },
            Utf8Path::new("interp"),
            &mut buf,
            false,
        )
        .unwrap();
        let root = dir.path();
        let expected = formatdoc! {"
                ok1
                  source: {root}/ok1/main.cara
                  stdout: {root}/ok1/stdout.txt
                  stderr: (none)
                ok2 (skipped)
                  source: {root}/ok2/main.cara
                  stdout: (none)
                  stderr: (none)
                type-error (skipped)
                  source: {root}/type-error/main.cara
                  stdout: (none)
                  stderr: {root}/type-error/stderr.txt
            "};
        assert_eq!(String::from_utf8(buf).unwrap(), expected);
    }

    #[test]
    fn summary_round_trips_through_json() {
        let dir = make_tree();
        let list = TestList::scan(dir.path(), "cara", &TestFilter::all()).unwrap();

        let mut buf = Vec::new();
        list.write(
            OutputFormat::Serializable(SerializableFormat::Json),
            Utf8Path::new("_build/default/src/compiler.exe"),
            &mut buf,
            false,
        )
        .unwrap();
        let parsed = TestListSummary::parse_json(String::from_utf8(buf).unwrap()).unwrap();
        assert_eq!(
            parsed,
            list.to_summary(Utf8Path::new("_build/default/src/compiler.exe"))
        );
        assert_eq!(parsed.test_count, 3);
    }
}
