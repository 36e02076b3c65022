// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Golden output files.
//!
//! Each fixture may carry a `stdout.txt` and a `stderr.txt`. A missing file means "expect empty
//! output", which is a different thing from an existing but empty file: see
//! [`ExpectationStore::load`].

use crate::{
    errors::ExpectationLoadError,
    list::{STDERR_FILE, STDOUT_FILE, TestId},
};
use bytes::Bytes;
use camino::{Utf8Path, Utf8PathBuf};
use std::{collections::HashMap, fmt, io, sync::Mutex};
use tracing::debug;

/// One of the two captured output streams.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum OutputStream {
    /// Standard output.
    Stdout,

    /// Standard error.
    Stderr,
}

impl OutputStream {
    /// Both streams, in the order they are checked.
    pub const ALL: [Self; 2] = [Self::Stdout, Self::Stderr];

    /// The name of the golden file for this stream within a fixture directory.
    pub fn golden_file_name(self) -> &'static str {
        match self {
            Self::Stdout => STDOUT_FILE,
            Self::Stderr => STDERR_FILE,
        }
    }
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}

/// Loads golden files for fixtures, caching them per (test, stream).
///
/// The cache lives for one generation: the runner calls [`clear`](Self::clear) before each rerun
/// so edits on disk are picked up.
#[derive(Debug)]
pub struct ExpectationStore {
    tests_dir: Utf8PathBuf,
    cache: Mutex<HashMap<(TestId, OutputStream), Option<Bytes>>>,
}

impl ExpectationStore {
    /// Creates a new store rooted at `tests_dir`.
    pub fn new(tests_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            tests_dir: tests_dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the tests directory.
    pub fn tests_dir(&self) -> &Utf8Path {
        &self.tests_dir
    }

    /// Returns the path of the golden file for `id` and `stream`, whether or not it exists.
    pub fn golden_path(&self, id: &TestId, stream: OutputStream) -> Utf8PathBuf {
        self.tests_dir
            .join(id.as_str())
            .join(stream.golden_file_name())
    }

    /// Loads the golden file for `id` and `stream`.
    ///
    /// Returns `Ok(None)` if the file does not exist, and `Ok(Some(bytes))` (possibly empty)
    /// otherwise. Any other I/O failure is an error.
    pub async fn load(
        &self,
        id: &TestId,
        stream: OutputStream,
    ) -> Result<Option<Bytes>, ExpectationLoadError> {
        let key = (id.clone(), stream);
        if let Some(cached) = self.lock_cache().get(&key) {
            return Ok(cached.clone());
        }

        let path = self.golden_path(id, stream);
        let loaded = match tokio::fs::read(&path).await {
            Ok(contents) => Some(Bytes::from(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => return Err(ExpectationLoadError::new(path, err)),
        };
        debug!(
            test = %id,
            %stream,
            present = loaded.is_some(),
            "loaded golden file"
        );

        self.lock_cache().insert(key, loaded.clone());
        Ok(loaded)
    }

    /// Drops all cached golden files.
    pub fn clear(&self) {
        self.lock_cache().clear();
    }

    fn lock_cache(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<(TestId, OutputStream), Option<Bytes>>> {
        // The cache holds plain data, so a panic elsewhere can't leave it inconsistent.
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
