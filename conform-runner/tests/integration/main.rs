// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the conform runner.
//!
//! These run `/bin/sh` over the fixtures in `fixtures/golden-suite` at the workspace root.

#![cfg(unix)]

mod basic;
mod fixtures;
mod rerun;
