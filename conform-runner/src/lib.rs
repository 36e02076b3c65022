// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for conform, a golden-file conformance harness.
//!
//! The basic flow is:
//!
//! 1. [`list::TestList::scan`] discovers fixtures under a tests directory.
//! 2. A [`runner::TestRunner`] executes the interpreter once per fixture, with bounded
//!    concurrency.
//! 3. Each run's output is compared against golden files by [`classify::classify`], and the
//!    verdicts are folded into [`reporter::RunStats`].
//! 4. Events are handed to a callback. [`reporter::TestReporter`] is a ready-made line reporter.

pub mod classify;
pub mod config;
pub mod diff;
pub mod errors;
pub mod expectation;
pub mod list;
pub mod reporter;
pub mod runner;
pub mod test_filter;
mod time;
