// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filtering tests based on user-specified parameters.
//!
//! The main structure in this module is [`TestFilter`], which is built from a set of
//! [`TestFilterPatterns`].

use crate::{errors::TestFilterBuildError, list::TestId};
use aho_corasick::AhoCorasick;
use std::collections::HashSet;

/// A set of string-based patterns for test filters.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TestFilterPatterns {
    patterns: Vec<String>,
    skip_patterns: Vec<String>,
    exact: bool,
}

impl TestFilterPatterns {
    /// Creates a new set of patterns.
    ///
    /// A test matches if its id contains any of `patterns` (or all tests match, if `patterns` is
    /// empty) and contains none of the skip patterns.
    pub fn new(patterns: Vec<String>) -> Self {
        Self {
            patterns,
            skip_patterns: Vec::new(),
            exact: false,
        }
    }

    /// Adds a skip pattern.
    pub fn add_skip_pattern(&mut self, pattern: impl Into<String>) -> &mut Self {
        self.skip_patterns.push(pattern.into());
        self
    }

    /// Makes all patterns, including skip patterns, match ids exactly rather than as substrings.
    pub fn set_exact(&mut self, exact: bool) -> &mut Self {
        self.exact = exact;
        self
    }

    fn resolve(&self) -> Result<ResolvedFilterPatterns, TestFilterBuildError> {
        if self.exact {
            return Ok(ResolvedFilterPatterns::Exact {
                patterns: self.patterns.iter().cloned().collect(),
                skip_patterns: self.skip_patterns.iter().cloned().collect(),
            });
        }

        match (self.patterns.is_empty(), self.skip_patterns.is_empty()) {
            (true, true) => Ok(ResolvedFilterPatterns::All),
            (true, false) => Ok(ResolvedFilterPatterns::SkipOnly {
                skip_pattern_matcher: Box::new(AhoCorasick::new(&self.skip_patterns)?),
            }),
            (false, _) => Ok(ResolvedFilterPatterns::Patterns {
                pattern_matcher: Box::new(AhoCorasick::new(&self.patterns)?),
                skip_pattern_matcher: Box::new(AhoCorasick::new(&self.skip_patterns)?),
            }),
        }
    }
}

/// Decides which scanned tests take part in a run.
#[derive(Clone, Debug)]
pub struct TestFilter {
    patterns: ResolvedFilterPatterns,
}

impl TestFilter {
    /// Creates a new filter from the given patterns.
    pub fn new(patterns: &TestFilterPatterns) -> Result<Self, TestFilterBuildError> {
        Ok(Self {
            patterns: patterns.resolve()?,
        })
    }

    /// Creates a filter that matches every test.
    pub fn all() -> Self {
        Self {
            patterns: ResolvedFilterPatterns::All,
        }
    }

    /// Returns true if the test should be run.
    pub fn filter_match(&self, id: &TestId) -> bool {
        self.patterns.is_match(id.as_str())
    }
}

#[derive(Clone, Debug, Default)]
enum ResolvedFilterPatterns {
    #[default]
    All,

    SkipOnly {
        skip_pattern_matcher: Box<AhoCorasick>,
    },

    Patterns {
        pattern_matcher: Box<AhoCorasick>,
        skip_pattern_matcher: Box<AhoCorasick>,
    },

    Exact {
        patterns: HashSet<String>,
        skip_patterns: HashSet<String>,
    },
}

impl ResolvedFilterPatterns {
    fn is_match(&self, id: &str) -> bool {
        match self {
            Self::All => true,
            Self::SkipOnly {
                skip_pattern_matcher,
            } => !skip_pattern_matcher.is_match(id),
            Self::Patterns {
                pattern_matcher,
                skip_pattern_matcher,
            } => {
                // skip overrides all other patterns.
                !skip_pattern_matcher.is_match(id) && pattern_matcher.is_match(id)
            }
            Self::Exact {
                patterns,
                skip_patterns,
            } => !skip_patterns.contains(id) && (patterns.is_empty() || patterns.contains(id)),
        }
    }
}
