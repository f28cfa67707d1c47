// Copyright (c) The report-ng Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixtures shared by unit tests.

use crate::{
    errors::SourceError,
    source::{ArtifactSource, ExecutionAggregateSource},
};
use report_model::{
    ClassContext, ContextValues, ExecutionAggregate, File, MethodContext, ResultStatus,
    SessionContext, SuiteContext, TestContext,
};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

/// Builds an [`ExecutionAggregate`] context by context.
///
/// Test and suite contexts referenced by classes are created automatically.
#[derive(Default)]
pub(crate) struct AggregateBuilder {
    aggregate: ExecutionAggregate,
}

impl AggregateBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn class(mut self, id: &str, test_id: &str, full_class_name: &str) -> Self {
        if !self.aggregate.test_contexts.contains_key(test_id) {
            self = self.test(test_id, "s1");
        }
        let simple_name = full_class_name.rsplit('.').next().unwrap_or(full_class_name);
        self.aggregate.class_contexts.insert(
            id.to_owned(),
            Arc::new(ClassContext {
                context_values: ContextValues::new(id, simple_name),
                test_context_id: test_id.to_owned(),
                full_class_name: full_class_name.to_owned(),
                test_context_name: None,
            }),
        );
        self
    }

    pub(crate) fn test(mut self, id: &str, suite_id: &str) -> Self {
        if !self.aggregate.suite_contexts.contains_key(suite_id) {
            self = self.suite(suite_id);
        }
        self.aggregate.test_contexts.insert(
            id.to_owned(),
            Arc::new(TestContext {
                context_values: ContextValues::new(id, format!("test {id}")),
                suite_context_id: suite_id.to_owned(),
            }),
        );
        self
    }

    pub(crate) fn suite(mut self, id: &str) -> Self {
        self.aggregate.suite_contexts.insert(
            id.to_owned(),
            Arc::new(SuiteContext {
                context_values: ContextValues::new(id, format!("suite {id}")),
            }),
        );
        self
    }

    pub(crate) fn session(mut self, id: &str, browser_name: &str) -> Self {
        self.aggregate.session_contexts.insert(
            id.to_owned(),
            Arc::new(SessionContext {
                context_values: ContextValues::new(id, browser_name),
                browser_name: Some(browser_name.to_owned()),
                ..Default::default()
            }),
        );
        self
    }

    pub(crate) fn method(self, id: &str, class_id: &str, status: ResultStatus) -> Self {
        self.method_with(id, class_id, status, |_| {})
    }

    pub(crate) fn method_with(
        mut self,
        id: &str,
        class_id: &str,
        status: ResultStatus,
        f: impl FnOnce(&mut MethodContext),
    ) -> Self {
        let mut method = MethodContext {
            context_values: ContextValues::new(id, id),
            class_context_id: class_id.to_owned(),
            result_status: status,
            ..Default::default()
        };
        f(&mut method);
        self.aggregate
            .method_contexts
            .insert(id.to_owned(), Arc::new(method));
        self
    }

    pub(crate) fn build(self) -> ExecutionAggregate {
        self.aggregate
    }
}

/// An in-memory source that counts fetches and can be told to fail.
#[derive(Debug, Default)]
pub(crate) struct FakeSource {
    aggregate: Mutex<ExecutionAggregate>,
    files: HashMap<String, File>,
    fail_aggregate: Mutex<bool>,
    latency: Duration,
    aggregate_fetches: AtomicUsize,
    file_fetches: AtomicUsize,
}

impl FakeSource {
    pub(crate) fn new(aggregate: ExecutionAggregate) -> Self {
        Self {
            aggregate: Mutex::new(aggregate),
            latency: Duration::from_millis(5),
            ..Default::default()
        }
    }

    pub(crate) fn with_files<'a>(mut self, ids: impl IntoIterator<Item = &'a str>) -> Self {
        for id in ids {
            self.files.insert(
                id.to_owned(),
                File::new(id, format!("screenshots/{id}.png")),
            );
        }
        self
    }

    pub(crate) fn set_aggregate(&self, aggregate: ExecutionAggregate) {
        *self.aggregate.lock().unwrap() = aggregate;
    }

    pub(crate) fn set_fail_aggregate(&self, fail: bool) {
        *self.fail_aggregate.lock().unwrap() = fail;
    }

    pub(crate) fn aggregate_fetches(&self) -> usize {
        self.aggregate_fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn file_fetches(&self) -> usize {
        self.file_fetches.load(Ordering::SeqCst)
    }
}

impl ExecutionAggregateSource for FakeSource {
    async fn fetch_aggregate(&self) -> Result<ExecutionAggregate, SourceError> {
        self.aggregate_fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        if *self.fail_aggregate.lock().unwrap() {
            return Err(SourceError::msg("source unavailable"));
        }
        Ok(self.aggregate.lock().unwrap().clone())
    }
}

impl ArtifactSource for FakeSource {
    async fn fetch_file(&self, file_id: &str) -> Result<File, SourceError> {
        self.file_fetches.fetch_add(1, Ordering::SeqCst);
        // Later ids finish first, so completion order differs from request order.
        let delay = self.latency / (self.file_fetches.load(Ordering::SeqCst) as u32);
        tokio::time::sleep(delay).await;
        self.files
            .get(file_id)
            .cloned()
            .ok_or_else(|| SourceError::msg(format!("no file with id `{file_id}`")))
    }
}
