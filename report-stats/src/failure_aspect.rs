// Copyright (c) The report-ng Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Failure aspects: failures grouped by their cause.

use crate::statistics::StatusCounts;
use report_model::{ErrorContext, MethodContext};

/// Statistics about one failure aspect: a group of failures that share the same cause.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FailureAspectStatistics {
    name: String,
    counts: StatusCounts,
    method_ids: Vec<String>,
}

impl FailureAspectStatistics {
    /// Creates statistics for the aspect described by `error_context`, with no methods yet.
    pub fn from_error_context(error_context: &ErrorContext) -> Self {
        Self {
            name: aspect_name(error_context),
            counts: StatusCounts::new(),
            method_ids: Vec::new(),
        }
    }

    /// Returns the name of this aspect, which also identifies it within a run.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the per-status counts of methods that failed with this aspect.
    pub fn counts(&self) -> &StatusCounts {
        &self.counts
    }

    /// Returns the identifiers of the methods that failed with this aspect, in encounter order.
    pub fn method_ids(&self) -> &[String] {
        &self.method_ids
    }

    /// Returns the number of methods that failed with this aspect.
    pub fn occurrences(&self) -> usize {
        self.method_ids.len()
    }

    pub(crate) fn add_method_context(&mut self, method_context: &MethodContext) {
        self.counts.add(method_context.result_status);
        self.method_ids.push(method_context.id().to_owned());
    }
}

fn aspect_name(error_context: &ErrorContext) -> String {
    if let Some(description) = error_context
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
    {
        return description.to_owned();
    }

    match &error_context.cause {
        Some(cause) => match cause.message.as_deref().map(str::trim) {
            Some(message) if !message.is_empty() => format!("{}: {message}", cause.class_name),
            _ => cause.class_name.clone(),
        },
        None => "(no error details)".to_owned(),
    }
}
