// Copyright (c) The report-ng Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Derived statistics for an execution run.
//!
//! [`ExecutionStatistics`] is built once from an [`ExecutionAggregate`]: every method context is
//! folded into the [`ClassStatistics`] for its class, and rollups are recomputed from scratch at
//! the end. Once built, the statistics are never mutated.

use crate::{
    errors::{ContextKind, StatisticsError},
    failure_aspect::FailureAspectStatistics,
    status::StatusNormalizer,
};
use indexmap::IndexMap;
use report_model::{ClassContext, ExecutionAggregate, MethodContext, ResultStatus};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use tracing::debug;

/// Per-status counts of method contexts.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StatusCounts {
    counts: BTreeMap<ResultStatus, usize>,
}

impl StatusCounts {
    /// Creates a new, empty set of counts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the count for exactly `status`.
    pub fn get(&self, status: ResultStatus) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    /// Returns the number of passed methods, including those that passed on retry.
    pub fn passed(&self) -> usize {
        self.sum(|status| status.is_passed())
    }

    /// Returns the number of methods that failed unexpectedly.
    pub fn failed(&self) -> usize {
        self.sum(|status| matches!(status, ResultStatus::Failed | ResultStatus::FailedMinor))
    }

    /// Returns the number of methods that failed as expected.
    pub fn expected_failed(&self) -> usize {
        self.get(ResultStatus::FailedExpected)
    }

    /// Returns the number of skipped methods.
    pub fn skipped(&self) -> usize {
        self.get(ResultStatus::Skipped)
    }

    /// Returns the number of attempts that failed and were retried.
    pub fn retried(&self) -> usize {
        self.get(ResultStatus::FailedRetried)
    }

    /// Returns the total number of methods, not counting attempts superseded by a retry.
    pub fn total(&self) -> usize {
        self.sum(|status| status != ResultStatus::FailedRetried)
    }

    /// Iterates over all non-zero counts, in status order.
    pub fn iter(&self) -> impl Iterator<Item = (ResultStatus, usize)> + '_ {
        self.counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(status, count)| (*status, *count))
    }

    pub(crate) fn add(&mut self, status: ResultStatus) {
        *self.counts.entry(status).or_default() += 1;
    }

    pub(crate) fn merge(&mut self, other: &StatusCounts) {
        for (status, count) in other.iter() {
            *self.counts.entry(status).or_default() += count;
        }
    }

    fn sum(&self, f: impl Fn(ResultStatus) -> bool) -> usize {
        self.iter()
            .filter(|(status, _)| f(*status))
            .map(|(_, count)| count)
            .sum()
    }
}

/// Returns the identifier that groups class contexts into one [`ClassStatistics`].
///
/// An explicit test context name wins over the fully qualified class name, which in turn wins
/// over the display name.
pub fn class_identifier(class_context: &ClassContext) -> &str {
    class_context
        .test_context_name
        .as_deref()
        .filter(|name| !name.is_empty())
        .or_else(|| Some(class_context.full_class_name.as_str()).filter(|name| !name.is_empty()))
        .unwrap_or(&class_context.context_values.name)
}

/// Statistics for all methods sharing one class identifier.
#[derive(Clone, Debug)]
pub struct ClassStatistics {
    class_identifier: String,
    class_context: Arc<ClassContext>,
    method_contexts: Vec<Arc<MethodContext>>,
    counts: StatusCounts,
}

impl ClassStatistics {
    fn new(class_context: Arc<ClassContext>) -> Self {
        Self {
            class_identifier: class_identifier(&class_context).to_owned(),
            class_context,
            method_contexts: Vec::new(),
            counts: StatusCounts::new(),
        }
    }

    /// Returns the class identifier.
    pub fn class_identifier(&self) -> &str {
        &self.class_identifier
    }

    /// Returns the class context that first introduced this class identifier.
    pub fn class_context(&self) -> &Arc<ClassContext> {
        &self.class_context
    }

    /// Returns the method contexts of this class, in encounter order.
    pub fn method_contexts(&self) -> &[Arc<MethodContext>] {
        &self.method_contexts
    }

    /// Returns the per-status counts for this class.
    pub fn counts(&self) -> &StatusCounts {
        &self.counts
    }

    /// Returns the first method context with the given identifier.
    pub fn find_method_context(&self, method_id: &str) -> Option<&Arc<MethodContext>> {
        self.method_contexts
            .iter()
            .find(|method_context| method_context.id() == method_id)
    }

    fn add_method_context(&mut self, method_context: Arc<MethodContext>) {
        self.method_contexts.push(method_context);
    }

    fn update_statistics(&mut self) {
        let mut counts = StatusCounts::new();
        for method_context in &self.method_contexts {
            counts.add(method_context.result_status);
        }
        self.counts = counts;
    }
}

/// Statistics for a whole execution run.
#[derive(Clone, Debug)]
pub struct ExecutionStatistics {
    aggregate: Arc<ExecutionAggregate>,
    class_statistics: Vec<ClassStatistics>,
    class_index: HashMap<String, usize>,
    counts: StatusCounts,
    failure_aspects: Vec<FailureAspectStatistics>,
}

impl ExecutionStatistics {
    /// Builds statistics from a freshly fetched aggregate.
    ///
    /// Method contexts are visited in the aggregate's order. Each one's status is normalized in
    /// place, then the method is appended to the statistics for its class, creating them the
    /// first time a class identifier is seen.
    ///
    /// Returns an error if a method refers to a class context that doesn't exist.
    pub fn from_aggregate(
        mut aggregate: ExecutionAggregate,
        normalizer: &dyn StatusNormalizer,
    ) -> Result<Self, StatisticsError> {
        let mut class_statistics: Vec<ClassStatistics> = Vec::new();
        let mut class_index: HashMap<String, usize> = HashMap::new();

        for method_context in aggregate.method_contexts.values_mut() {
            let class_context = aggregate
                .class_contexts
                .get(&method_context.class_context_id)
                .ok_or_else(|| {
                    StatisticsError::missing(
                        ContextKind::Class,
                        &method_context.class_context_id,
                        method_context.id(),
                    )
                })?;

            let identifier = class_identifier(class_context);
            let index = match class_index.get(identifier) {
                Some(&index) => index,
                None => {
                    class_statistics.push(ClassStatistics::new(Arc::clone(class_context)));
                    class_index.insert(identifier.to_owned(), class_statistics.len() - 1);
                    class_statistics.len() - 1
                }
            };

            // The aggregate hasn't been shared yet, so this doesn't clone.
            let method = Arc::make_mut(method_context);
            method.result_status = normalizer.normalize(method.result_status);

            class_statistics[index].add_method_context(Arc::clone(method_context));
        }

        let mut statistics = Self {
            aggregate: Arc::new(aggregate),
            class_statistics,
            class_index,
            counts: StatusCounts::new(),
            failure_aspects: Vec::new(),
        };
        statistics.update_statistics();

        debug!(
            "built statistics for {} classes, {} methods",
            statistics.class_statistics.len(),
            statistics.aggregate.method_contexts.len(),
        );
        Ok(statistics)
    }

    /// Returns the aggregate these statistics were built from.
    pub fn aggregate(&self) -> &Arc<ExecutionAggregate> {
        &self.aggregate
    }

    /// Returns statistics for every class, in the order classes were first encountered.
    pub fn class_statistics(&self) -> &[ClassStatistics] {
        &self.class_statistics
    }

    /// Returns the statistics for the given class identifier.
    pub fn class_statistics_for(&self, class_identifier: &str) -> Option<&ClassStatistics> {
        self.class_index
            .get(class_identifier)
            .map(|&index| &self.class_statistics[index])
    }

    /// Returns the run-wide per-status counts.
    pub fn counts(&self) -> &StatusCounts {
        &self.counts
    }

    /// Returns failure aspects, most frequent first.
    pub fn failure_aspects(&self) -> &[FailureAspectStatistics] {
        &self.failure_aspects
    }

    /// Finds the first method context with the given identifier, scanning classes in order.
    ///
    /// Returns the index of the owning class statistics along with the method.
    pub fn find_method_context(&self, method_id: &str) -> Option<(usize, &Arc<MethodContext>)> {
        self.class_statistics
            .iter()
            .enumerate()
            .find_map(|(index, class_statistics)| {
                class_statistics
                    .find_method_context(method_id)
                    .map(|method_context| (index, method_context))
            })
    }

    // Recomputes every rollup from the current class statistics, starting from zero.
    fn update_statistics(&mut self) {
        let mut counts = StatusCounts::new();
        let mut failure_aspects: IndexMap<String, FailureAspectStatistics> = IndexMap::new();

        for class_statistics in &mut self.class_statistics {
            class_statistics.update_statistics();
            counts.merge(class_statistics.counts());

            for method_context in class_statistics.method_contexts() {
                let is_failure = matches!(
                    method_context.result_status,
                    ResultStatus::Failed | ResultStatus::FailedMinor | ResultStatus::FailedExpected
                );
                let Some(error_context) = method_context.error_context.as_ref() else {
                    continue;
                };
                if !is_failure {
                    continue;
                }

                let aspect = FailureAspectStatistics::from_error_context(error_context);
                failure_aspects
                    .entry(aspect.name().to_owned())
                    .or_insert(aspect)
                    .add_method_context(method_context);
            }
        }

        let mut failure_aspects: Vec<_> = failure_aspects.into_values().collect();
        // Stable, so ties stay in encounter order.
        failure_aspects.sort_by(|a, b| b.occurrences().cmp(&a.occurrences()));

        self.counts = counts;
        self.failure_aspects = failure_aspects;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{status::DefaultStatusNormalizer, test_helpers::AggregateBuilder};
    use pretty_assertions::assert_eq;
    use report_model::ErrorContext;

    fn method_ids(class_statistics: &ClassStatistics) -> Vec<&str> {
        class_statistics
            .method_contexts()
            .iter()
            .map(|m| m.id())
            .collect()
    }

    #[test]
    fn methods_sharing_a_class_identifier_are_merged() {
        // Two class contexts in different tests describe the same class.
        let aggregate = AggregateBuilder::new()
            .class("c1", "t1", "com.example.LoginTest")
            .class("c2", "t1", "com.example.CartTest")
            .class("c3", "t1", "com.example.LoginTest")
            .method("m1", "c1", ResultStatus::Passed)
            .method("m2", "c2", ResultStatus::Failed)
            .method("m3", "c3", ResultStatus::Skipped)
            .method("m4", "c1", ResultStatus::Passed)
            .build();

        let statistics =
            ExecutionStatistics::from_aggregate(aggregate, &DefaultStatusNormalizer).unwrap();

        let identifiers: Vec<_> = statistics
            .class_statistics()
            .iter()
            .map(|c| c.class_identifier())
            .collect();
        assert_eq!(identifiers, ["com.example.LoginTest", "com.example.CartTest"]);

        let login = statistics
            .class_statistics_for("com.example.LoginTest")
            .unwrap();
        assert_eq!(method_ids(login), ["m1", "m3", "m4"]);
        assert_eq!(login.class_context().context_values.id, "c1");
        assert_eq!(login.counts().passed(), 2);
        assert_eq!(login.counts().skipped(), 1);
        assert_eq!(login.counts().total(), 3);
    }

    #[test]
    fn statuses_are_normalized_and_rolled_up() {
        let aggregate = AggregateBuilder::new()
            .class("c1", "t1", "A")
            .class("c2", "t1", "B")
            .method("m1", "c1", ResultStatus::Minor)
            .method("m2", "c1", ResultStatus::FailedMinor)
            .method("m3", "c2", ResultStatus::FailedRetried)
            .method("m4", "c2", ResultStatus::PassedRetry)
            .method("m5", "c2", ResultStatus::FailedExpected)
            .build();

        let statistics =
            ExecutionStatistics::from_aggregate(aggregate, &DefaultStatusNormalizer).unwrap();

        let stored = &statistics.aggregate().method_contexts["m1"];
        assert_eq!(stored.result_status, ResultStatus::Passed);
        let (_, in_class) = statistics.find_method_context("m2").unwrap();
        assert_eq!(in_class.result_status, ResultStatus::Failed);

        let counts = statistics.counts();
        assert_eq!(counts.get(ResultStatus::Minor), 0);
        assert_eq!(counts.passed(), 2);
        assert_eq!(counts.failed(), 1);
        assert_eq!(counts.expected_failed(), 1);
        assert_eq!(counts.retried(), 1);
        assert_eq!(counts.total(), 4);
        assert_eq!(
            counts.iter().collect::<Vec<_>>(),
            [
                (ResultStatus::Passed, 1),
                (ResultStatus::Failed, 1),
                (ResultStatus::FailedRetried, 1),
                (ResultStatus::FailedExpected, 1),
                (ResultStatus::PassedRetry, 1),
            ]
        );
    }

    #[test]
    fn test_context_name_overrides_class_name() {
        let mut class = ClassContext::default();
        class.context_values.name = "LoginTest".to_owned();
        assert_eq!(class_identifier(&class), "LoginTest");
        class.full_class_name = "com.example.LoginTest".to_owned();
        assert_eq!(class_identifier(&class), "com.example.LoginTest");
        class.test_context_name = Some(String::new());
        assert_eq!(class_identifier(&class), "com.example.LoginTest");
        class.test_context_name = Some("Smoke".to_owned());
        assert_eq!(class_identifier(&class), "Smoke");
    }

    #[test]
    fn missing_class_context_is_an_error() {
        let aggregate = AggregateBuilder::new()
            .class("c1", "t1", "A")
            .method("m1", "c1", ResultStatus::Passed)
            .method("m2", "gone", ResultStatus::Passed)
            .build();

        let error =
            ExecutionStatistics::from_aggregate(aggregate, &DefaultStatusNormalizer).unwrap_err();
        match error {
            StatisticsError::MissingContext {
                kind,
                id,
                referenced_by,
            } => {
                assert_eq!(kind, ContextKind::Class);
                assert_eq!(id, "gone");
                assert_eq!(referenced_by, "m2");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn failure_aspects_are_grouped_and_ranked() {
        let timeout = ErrorContext {
            description: Some("Timed out".to_owned()),
            ..Default::default()
        };
        let missing = ErrorContext {
            description: Some("Element missing".to_owned()),
            ..Default::default()
        };
        let aggregate = AggregateBuilder::new()
            .class("c1", "t1", "A")
            .method_with("m1", "c1", ResultStatus::Failed, |m| {
                m.error_context = Some(missing.clone())
            })
            .method_with("m2", "c1", ResultStatus::Failed, |m| {
                m.error_context = Some(timeout.clone())
            })
            .method_with("m3", "c1", ResultStatus::FailedExpected, |m| {
                m.error_context = Some(timeout.clone())
            })
            // Retried attempts and passes don't contribute aspects.
            .method_with("m4", "c1", ResultStatus::FailedRetried, |m| {
                m.error_context = Some(missing.clone())
            })
            .method_with("m5", "c1", ResultStatus::Passed, |m| {
                m.error_context = Some(missing.clone())
            })
            .build();

        let statistics =
            ExecutionStatistics::from_aggregate(aggregate, &DefaultStatusNormalizer).unwrap();
        let aspects: Vec<_> = statistics
            .failure_aspects()
            .iter()
            .map(|a| (a.name(), a.method_ids().to_vec()))
            .collect();
        assert_eq!(
            aspects,
            [
                ("Timed out", vec!["m2".to_owned(), "m3".to_owned()]),
                ("Element missing", vec!["m1".to_owned()]),
            ]
        );
        let timed_out = &statistics.failure_aspects()[0];
        assert_eq!(timed_out.counts().failed(), 1);
        assert_eq!(timed_out.counts().expected_failed(), 1);
    }

    #[test]
    fn empty_aggregate() {
        let statistics = ExecutionStatistics::from_aggregate(
            ExecutionAggregate::default(),
            &DefaultStatusNormalizer,
        )
        .unwrap();
        assert!(statistics.class_statistics().is_empty());
        assert_eq!(statistics.counts().total(), 0);
        assert!(statistics.find_method_context("m1").is_none());
    }
}
