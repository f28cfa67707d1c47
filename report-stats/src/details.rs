// Copyright (c) The report-ng Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolved views of a single test method.

use crate::{
    errors::{ContextKind, StatisticsError},
    failure_aspect::FailureAspectStatistics,
    layout::LayoutComparisonContext,
    statistics::{ClassStatistics, ExecutionStatistics},
};
use report_model::{MethodContext, SessionContext, SuiteContext, TestContext, TestStep};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

/// A method together with every context it belongs to.
///
/// Details hold shared references into an [`ExecutionStatistics`], so they stay valid even after
/// the statistics have been evicted from the cache.
#[derive(Clone, Debug)]
pub struct MethodDetails {
    statistics: Arc<ExecutionStatistics>,
    class_index: usize,
    method_context: Arc<MethodContext>,
    test_context: Arc<TestContext>,
    suite_context: Arc<SuiteContext>,
    session_contexts: Vec<Arc<SessionContext>>,
    failure_aspect: Option<FailureAspectStatistics>,
}

impl MethodDetails {
    /// Looks up `method_id` in `statistics` and resolves its ancestors and sessions.
    ///
    /// Returns `Ok(None)` if there is no such method. Returns an error if the method, or one of
    /// its ancestors, refers to a context that is missing from the aggregate.
    pub fn resolve(
        statistics: Arc<ExecutionStatistics>,
        method_id: &str,
    ) -> Result<Option<Self>, StatisticsError> {
        let Some((class_index, method_context)) = statistics.find_method_context(method_id) else {
            return Ok(None);
        };
        let method_context = Arc::clone(method_context);
        let aggregate = statistics.aggregate();

        // Resolve through the method's own class context: merged class statistics may span
        // class contexts from several tests.
        let class_context = aggregate
            .class_contexts
            .get(&method_context.class_context_id)
            .ok_or_else(|| {
                StatisticsError::missing(
                    ContextKind::Class,
                    &method_context.class_context_id,
                    method_id,
                )
            })?;
        let test_context = aggregate
            .test_contexts
            .get(&class_context.test_context_id)
            .ok_or_else(|| {
                StatisticsError::missing(
                    ContextKind::Test,
                    &class_context.test_context_id,
                    &class_context.context_values.id,
                )
            })?;
        let suite_context = aggregate
            .suite_contexts
            .get(&test_context.suite_context_id)
            .ok_or_else(|| {
                StatisticsError::missing(
                    ContextKind::Suite,
                    &test_context.suite_context_id,
                    &test_context.context_values.id,
                )
            })?;
        let session_contexts = method_context
            .session_context_ids
            .iter()
            .map(|session_id| {
                aggregate
                    .session_contexts
                    .get(session_id)
                    .cloned()
                    .ok_or_else(|| {
                        StatisticsError::missing(ContextKind::Session, session_id, method_id)
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let failure_aspect = method_context.error_context.as_ref().map(|error_context| {
            let mut aspect = FailureAspectStatistics::from_error_context(error_context);
            aspect.add_method_context(&method_context);
            aspect
        });

        let test_context = Arc::clone(test_context);
        let suite_context = Arc::clone(suite_context);
        Ok(Some(Self {
            statistics,
            class_index,
            method_context,
            test_context,
            suite_context,
            session_contexts,
            failure_aspect,
        }))
    }

    /// Returns the statistics this method was resolved from.
    pub fn execution_statistics(&self) -> &Arc<ExecutionStatistics> {
        &self.statistics
    }

    /// Returns the statistics for the class this method belongs to.
    pub fn class_statistics(&self) -> &ClassStatistics {
        &self.statistics.class_statistics()[self.class_index]
    }

    /// Returns the method context.
    pub fn method_context(&self) -> &Arc<MethodContext> {
        &self.method_context
    }

    /// Returns the test this method's class belongs to.
    pub fn test_context(&self) -> &Arc<TestContext> {
        &self.test_context
    }

    /// Returns the suite this method's test belongs to.
    pub fn suite_context(&self) -> &Arc<SuiteContext> {
        &self.suite_context
    }

    /// Returns the sessions this method ran under, in the order the method lists them.
    pub fn session_contexts(&self) -> &[Arc<SessionContext>] {
        &self.session_contexts
    }

    /// Returns the failure aspect for this method, if it has an error context.
    pub fn failure_aspect(&self) -> Option<&FailureAspectStatistics> {
        self.failure_aspect.as_ref()
    }

    /// Returns the formatted identifier of this method, for example `login(user: a, pass: b)`.
    pub fn identifier(&self) -> String {
        format_identifier(&self.method_context)
    }

    /// Returns the number of detail panels that apply to this method.
    ///
    /// One for the error context and one for custom contexts, if present. A method that recorded
    /// an empty set of custom contexts still counts.
    pub fn num_details(&self) -> usize {
        usize::from(self.method_context.error_context.is_some())
            + usize::from(self.method_context.custom_contexts.is_some())
    }

    /// Returns the step that failed, if the method recorded a valid failed step index.
    pub fn failed_step(&self) -> Option<&TestStep> {
        self.method_context
            .failed_step_index
            .and_then(|index| self.method_context.test_steps.get(index))
    }

    /// Decodes the custom context called `name` as JSON.
    ///
    /// Returns `None` if there is no such context or if it isn't valid JSON.
    pub fn decode_custom_context(&self, name: &str) -> Option<serde_json::Value> {
        self.custom_context(name)
    }

    /// Decodes the custom context called `name` into `T`.
    ///
    /// Returns `None` if there is no such context or if it doesn't decode as a `T`.
    pub fn custom_context<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let raw = self.method_context.custom_contexts.as_ref()?.get(name)?;
        match serde_json::from_str(raw) {
            Ok(value) => Some(value),
            Err(error) => {
                debug!(
                    "custom context `{name}` of method `{}` failed to decode: {error}",
                    self.method_context.id()
                );
                None
            }
        }
    }

    /// Decodes the custom context called `name` as a layout comparison.
    pub fn layout_comparison(&self, name: &str) -> Option<LayoutComparisonContext> {
        self.custom_context(name)
    }

    /// Returns the screenshot identifiers recorded by this method.
    pub fn screenshot_ids(&self) -> Vec<String> {
        screenshot_ids(&self.method_context)
    }
}

/// Formats a method's name together with its parameters.
///
/// Parameters are rendered as `name: value` pairs in recorded order. A method without parameters
/// formats as just its name.
pub fn format_identifier(method_context: &MethodContext) -> String {
    if method_context.parameters.is_empty() {
        return method_context.name().to_owned();
    }
    let parameters = method_context
        .parameters
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{}({parameters})", method_context.name())
}

/// Returns the screenshot identifiers recorded by a method, in step, action and entry order.
///
/// Duplicates are kept.
pub fn screenshot_ids(method_context: &MethodContext) -> Vec<String> {
    method_context
        .test_steps
        .iter()
        .flat_map(|step| &step.actions)
        .flat_map(|action| &action.entries)
        .filter_map(|entry| entry.screenshot_id.clone())
        .collect()
}
