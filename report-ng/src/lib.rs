// Copyright (c) The report-ng Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line viewer for statistics derived from recorded test execution runs.
//!
//! See the `report-stats` crate for the underlying library.

#![warn(missing_docs)]

mod dispatch;
mod display;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::{OutputContext, OutputWriter};
