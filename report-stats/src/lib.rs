// Copyright (c) The report-ng Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Derived statistics for recorded test execution runs.
//!
//! The entry point is [`StatisticsGenerator`](generator::StatisticsGenerator). Given a source for
//! the raw [`ExecutionAggregate`](report_model::ExecutionAggregate) and for artifact files, it
//! builds [`ExecutionStatistics`](statistics::ExecutionStatistics) once per cache lifetime and
//! resolves per-method details and files on top of them. Every result is cached with a TTL, and
//! concurrent requests for the same result share a single load.
//!
//! This crate does no rendering. The `report-ng` binary is a thin command-line front end over
//! it.

pub mod cache;
pub mod config;
pub mod details;
pub mod errors;
pub mod failure_aspect;
pub mod generator;
pub mod layout;
pub mod source;
pub mod statistics;
pub mod status;
#[cfg(test)]
mod test_helpers;
