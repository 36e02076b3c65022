// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Report the results of a test run.
//!
//! The main type here is [`TestReporter`], which is constructed via a [`TestReporterBuilder`].
//! It prints one line per finished test and a summary, and can also write a JUnit report.

mod aggregator;
mod displayer;
mod events;
mod imp;
mod junit;

pub use aggregator::{RunAggregator, RunStats};
pub use events::*;
pub use imp::*;
