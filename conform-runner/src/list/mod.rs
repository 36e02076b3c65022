// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discovering fixtures and listing tests.
//!
//! The main data structure in this module is [`TestList`], built by scanning a tests directory.

mod output_format;
mod test_list;

pub use output_format::*;
pub use test_list::*;
