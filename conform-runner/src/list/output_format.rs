// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use owo_colors::Style;

/// Output formats for `conform list`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum OutputFormat {
    /// A human-readable output format.
    Human {
        /// Whether to produce verbose output.
        verbose: bool,
    },

    /// Machine-readable output format.
    Serializable(SerializableFormat),
}

/// A serialized, machine-readable output format.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum SerializableFormat {
    /// JSON with no whitespace.
    Json,
    /// JSON, prettified.
    JsonPretty,
}

impl SerializableFormat {
    pub(crate) fn is_pretty(self) -> bool {
        matches!(self, Self::JsonPretty)
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Styles {
    pub(crate) test_id: Style,
    pub(crate) field: Style,
    pub(crate) skipped: Style,
}

impl Styles {
    pub(crate) fn colorize(&mut self) {
        self.test_id = Style::new().blue().bold();
        self.field = Style::new().yellow().bold();
        self.skipped = Style::new().dimmed();
    }
}
