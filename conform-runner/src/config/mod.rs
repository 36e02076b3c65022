// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for conform.
//!
//! The main structure in this module is [`ConformConfig`].

mod imp;
mod test_threads;

pub use imp::*;
pub use test_threads::*;
