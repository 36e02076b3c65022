// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    config::TestThreads,
    errors::{ConfigParseError, ConfigParseErrorKind},
};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use itertools::Itertools;
use serde::Deserialize;
use std::{collections::BTreeSet, time::Duration};
use tracing::warn;

/// Overall configuration for conform.
///
/// The default config is embedded in the binary, and a repository-specific file is layered on top
/// of it. Relative paths are resolved against the workspace root.
#[derive(Clone, Debug)]
pub struct ConformConfig {
    workspace_root: Utf8PathBuf,
    tests_dir: Utf8PathBuf,
    interpreter: Utf8PathBuf,
    source_extension: String,
    test_threads: TestThreads,
    timeout: Duration,
}

impl ConformConfig {
    /// The default location of the config within the workspace root: `.config/conform.toml`.
    pub const CONFIG_PATH: &'static str = ".config/conform.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../../default-config.toml");

    /// Reads the config from the given file, or if not specified from `.config/conform.toml` in
    /// the workspace root.
    ///
    /// If no config file is specified and `.config/conform.toml` doesn't exist, uses the default
    /// config options.
    pub fn from_sources(
        workspace_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let workspace_root = workspace_root.into();

        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = workspace_root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let (deserialized, unknown) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;

        if !unknown.is_empty() {
            warn!(
                "ignoring unknown configuration keys in `{config_file}`: {}",
                unknown.iter().join(", ")
            );
        }

        Ok(Self::from_deserialized(workspace_root, deserialized))
    }

    /// Returns the default config.
    #[cfg(test)]
    pub(crate) fn default_config(workspace_root: impl Into<Utf8PathBuf>) -> Self {
        let (deserialized, unknown) =
            Self::build_and_deserialize_config(&Self::make_default_config())
                .expect("default config is always valid");

        // The default config is embedded in the binary, so it can't have unknown keys.
        assert!(
            unknown.is_empty(),
            "found unknown keys in default config: {}",
            unknown.iter().join(", ")
        );

        Self::from_deserialized(workspace_root.into(), deserialized)
    }

    /// Returns the workspace root.
    pub fn workspace_root(&self) -> &Utf8Path {
        &self.workspace_root
    }

    /// Returns the tests directory, resolved against the workspace root.
    pub fn tests_dir(&self) -> &Utf8Path {
        &self.tests_dir
    }

    /// Returns the interpreter. Paths are resolved against the workspace root, while a bare
    /// command name is kept as is and looked up in `PATH` when spawned.
    pub fn interpreter(&self) -> &Utf8Path {
        &self.interpreter
    }

    /// Returns the extension of fixture source files, without the leading `.`.
    pub fn source_extension(&self) -> &str {
        &self.source_extension
    }

    /// Returns the configured number of test threads.
    pub fn test_threads(&self) -> TestThreads {
        self.test_threads
    }

    /// Returns the per-test timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    // ---
    // Helper methods
    // ---

    fn from_deserialized(
        workspace_root: Utf8PathBuf,
        deserialized: ConformConfigDeserialize,
    ) -> Self {
        Self {
            tests_dir: workspace_root.join(&deserialized.tests_dir),
            interpreter: resolve_interpreter(&workspace_root, &deserialized.interpreter),
            source_extension: deserialized.source_extension,
            test_threads: deserialized.test_threads,
            timeout: deserialized.timeout,
            workspace_root,
        }
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(ConformConfigDeserialize, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: ConformConfigDeserialize = serde_path_to_error::deserialize(ignored_de)
            .map_err(|error| {
                // The config crate also reports the key; drop it so it isn't printed twice.
                let path = error.path().clone();
                let config_error = error.into_inner();
                let error = match config_error {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                    path, error,
                )))
            })?;

        Ok((config, ignored))
    }
}

fn resolve_interpreter(workspace_root: &Utf8Path, interpreter: &Utf8Path) -> Utf8PathBuf {
    if interpreter.components().count() > 1 {
        workspace_root.join(interpreter)
    } else {
        interpreter.to_owned()
    }
}

// This is the form of `ConformConfig` that gets deserialized.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ConformConfigDeserialize {
    tests_dir: Utf8PathBuf,
    interpreter: Utf8PathBuf,
    source_extension: String,
    test_threads: TestThreads,
    #[serde(with = "humantime_serde")]
    timeout: Duration,
}
