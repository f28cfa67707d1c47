// Copyright (c) The report-ng Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Data model for a recorded test execution run.
//!
//! An [`ExecutionAggregate`] is the complete raw record of one run: suites contain tests, tests
//! contain classes, classes contain methods, methods contain steps, steps contain actions and
//! actions contain log entries which may reference artifacts such as screenshots. Relationships
//! between contexts are expressed as identifier references rather than embedded objects.
//!
//! The model is read-only once fetched. Derived views are built by the `report-stats` crate.

mod context;
mod file;
mod status;

pub use context::*;
pub use file::*;
pub use status::*;
