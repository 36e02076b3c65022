// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A golden-file conformance harness for compilers and interpreters.
//!
//! `conform` discovers one fixture directory per test, runs the interpreter on each fixture's
//! source file, and compares what it prints against the fixture's golden files.
//!
//! For the library behind this binary, see the `conform-runner` crate.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::{OutputContext, OutputWriter};
