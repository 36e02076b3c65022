// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Structured access to `conform` machine-readable output.
//!
//! `conform list --message-format json` emits a [`TestListSummary`]; exit codes are documented in
//! [`ConformExitCode`].

mod exit_codes;
mod test_list;

pub use exit_codes::*;
pub use test_list::*;
