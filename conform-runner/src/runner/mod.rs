// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test runner.
//!
//! The main structure in this module is [`TestRunner`], built with a [`TestRunnerBuilder`]. A
//! single coordinating loop owns the status of every test, while interpreter processes run
//! concurrently up to the configured number of test threads.

mod executor;
mod imp;

pub use executor::{CapturedOutput, ProcessRunner};
pub use imp::*;
