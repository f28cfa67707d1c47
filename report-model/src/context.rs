// Copyright (c) The report-ng Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::ResultStatus;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

/// The full raw record of one test execution run.
///
/// Every map is keyed by the context's own identifier, and keeps the order in which the source
/// produced its entries. Contexts refer to each other by identifier (for example,
/// [`MethodContext::class_context_id`]), never by embedding.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionAggregate {
    /// The root context of the run, if the source recorded one.
    #[serde(default)]
    pub execution_context: Option<ExecutionContext>,

    /// All suite contexts in the run.
    #[serde(default)]
    pub suite_contexts: IndexMap<String, Arc<SuiteContext>>,

    /// All test contexts in the run.
    #[serde(default)]
    pub test_contexts: IndexMap<String, Arc<TestContext>>,

    /// All class contexts in the run.
    #[serde(default)]
    pub class_contexts: IndexMap<String, Arc<ClassContext>>,

    /// All method contexts in the run.
    #[serde(default)]
    pub method_contexts: IndexMap<String, Arc<MethodContext>>,

    /// All browser or device sessions used by the run.
    #[serde(default)]
    pub session_contexts: IndexMap<String, Arc<SessionContext>>,
}

/// Values shared by every kind of context.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextValues {
    /// The opaque identifier of this context, unique within a run.
    pub id: String,

    /// The display name of this context.
    #[serde(default)]
    pub name: String,

    /// Start time in milliseconds since the Unix epoch.
    #[serde(default)]
    pub start_time: Option<u64>,

    /// End time in milliseconds since the Unix epoch.
    #[serde(default)]
    pub end_time: Option<u64>,
}

impl ContextValues {
    /// Creates context values with the given identifier and name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            start_time: None,
            end_time: None,
        }
    }

    /// Returns the elapsed time in milliseconds, if both timestamps are known.
    pub fn duration_ms(&self) -> Option<u64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(end.saturating_sub(start)),
            _ => None,
        }
    }
}

/// The root context of a run.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    /// Common context values.
    pub context_values: ContextValues,

    /// The name of the run configuration, if any.
    #[serde(default)]
    pub run_config_name: Option<String>,
}

/// A test suite.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteContext {
    /// Common context values.
    pub context_values: ContextValues,
}

/// A test within a suite.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestContext {
    /// Common context values.
    pub context_values: ContextValues,

    /// The suite this test belongs to.
    pub suite_context_id: String,
}

/// A test class within a test.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassContext {
    /// Common context values.
    pub context_values: ContextValues,

    /// The test this class belongs to.
    pub test_context_id: String,

    /// The fully qualified name of the class.
    #[serde(default)]
    pub full_class_name: String,

    /// An explicit grouping name that replaces the class name, if one was configured.
    #[serde(default)]
    pub test_context_name: Option<String>,
}

/// A browser or device session that a method ran under.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    /// Common context values.
    pub context_values: ContextValues,

    /// The key under which the session was requested.
    #[serde(default)]
    pub session_key: Option<String>,

    /// The provider that supplied the session, such as a grid.
    #[serde(default)]
    pub provider: Option<String>,

    /// The remote session identifier.
    #[serde(default)]
    pub session_id: Option<String>,

    /// The browser name.
    #[serde(default)]
    pub browser_name: Option<String>,

    /// The browser version.
    #[serde(default)]
    pub browser_version: Option<String>,
}

/// One execution of a test method.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodContext {
    /// Common context values.
    pub context_values: ContextValues,

    /// The class this method belongs to.
    pub class_context_id: String,

    /// Parameter names mapped to their rendered values.
    #[serde(default)]
    pub parameters: IndexMap<String, String>,

    /// The steps recorded while the method ran, in order.
    #[serde(default)]
    pub test_steps: Vec<TestStep>,

    /// Details about the failure, if the method failed with an error.
    #[serde(default)]
    pub error_context: Option<ErrorContext>,

    /// Named custom contexts, each one a JSON document.
    ///
    /// `None` means the method recorded no custom contexts at all, which is distinct from an
    /// empty map.
    #[serde(default)]
    pub custom_contexts: Option<IndexMap<String, String>>,

    /// The result status of the method.
    #[serde(default)]
    pub result_status: ResultStatus,

    /// The index into [`Self::test_steps`] of the step that failed.
    ///
    /// Negative values on the wire mean that no step failed.
    #[serde(default, deserialize_with = "deserialize_step_index")]
    pub failed_step_index: Option<usize>,

    /// The sessions this method ran under.
    #[serde(default)]
    pub session_context_ids: Vec<String>,

    /// Video artifacts recorded for this method.
    #[serde(default)]
    pub video_ids: Vec<String>,

    /// The retry number, zero for the first attempt.
    #[serde(default)]
    pub retry_number: u32,
}

impl MethodContext {
    /// Returns the identifier of this method.
    pub fn id(&self) -> &str {
        &self.context_values.id
    }

    /// Returns the display name of this method.
    pub fn name(&self) -> &str {
        &self.context_values.name
    }
}

fn deserialize_step_index<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let index = Option::<i64>::deserialize(deserializer)?;
    Ok(index.and_then(|index| usize::try_from(index).ok()))
}

/// A named step within a method.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStep {
    /// The name of the step.
    #[serde(default)]
    pub name: String,

    /// The actions performed within this step, in order.
    #[serde(default)]
    pub actions: Vec<TestStepAction>,
}

/// An action within a step.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStepAction {
    /// The name of the action.
    #[serde(default)]
    pub name: String,

    /// When the action started, in milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: Option<u64>,

    /// The log entries recorded during this action, in order.
    #[serde(default)]
    pub entries: Vec<LogEntry>,
}

/// A single entry recorded during an action.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// The screenshot taken at this point, if any.
    #[serde(default)]
    pub screenshot_id: Option<String>,

    /// The log message emitted at this point, if any.
    #[serde(default)]
    pub log_message: Option<LogMessage>,
}

/// A log message.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogMessage {
    /// The log level, for example `INFO`.
    #[serde(default)]
    pub level: String,

    /// The message text.
    #[serde(default)]
    pub message: String,

    /// The name of the logger.
    #[serde(default)]
    pub logger_name: Option<String>,

    /// When the message was logged, in milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: Option<u64>,
}

/// Details about why a method failed.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorContext {
    /// A human-readable description of the failure.
    #[serde(default)]
    pub description: Option<String>,

    /// The outermost cause of the failure.
    #[serde(default)]
    pub cause: Option<StackTraceCause>,

    /// The test source around the failing line.
    #[serde(default)]
    pub script_source: Option<ScriptSource>,

    /// A ticket tracking this failure.
    #[serde(default)]
    pub ticket_id: Option<String>,
}

/// One cause in a chain of causes.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceCause {
    /// The class name of the exception.
    #[serde(default)]
    pub class_name: String,

    /// The exception message.
    #[serde(default)]
    pub message: Option<String>,

    /// Rendered stack trace elements, innermost frame first.
    #[serde(default)]
    pub stack_trace_elements: Vec<String>,

    /// The next cause in the chain.
    #[serde(default)]
    pub cause: Option<Box<StackTraceCause>>,
}

/// An excerpt of source code.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptSource {
    /// The file the excerpt was taken from.
    #[serde(default)]
    pub file_name: String,

    /// The method containing the excerpt.
    #[serde(default)]
    pub method_name: Option<String>,

    /// The lines of the excerpt.
    #[serde(default)]
    pub lines: Vec<ScriptSourceLine>,
}

/// A single line of a [`ScriptSource`].
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptSourceLine {
    /// The line text.
    #[serde(default)]
    pub line: String,

    /// The one-based line number.
    #[serde(default)]
    pub line_number: u32,

    /// Whether this line is the one that failed.
    #[serde(default)]
    pub mark: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("-1", None ; "negative sentinel")]
    #[test_case("null", None ; "null")]
    #[test_case("2", Some(2) ; "index")]
    fn failed_step_index(input: &str, expected: Option<usize>) {
        let json = format!(
            r#"{{"contextValues": {{"id": "m1"}}, "classContextId": "c1", "failedStepIndex": {input}}}"#
        );
        let method: MethodContext = serde_json::from_str(&json).unwrap();
        assert_eq!(method.failed_step_index, expected);
    }

    #[test]
    fn aggregate_preserves_source_order() {
        let json = indoc! {r#"
            {
                "methodContexts": {
                    "z": {"contextValues": {"id": "z", "name": "last"}, "classContextId": "c"},
                    "a": {"contextValues": {"id": "a", "name": "first"}, "classContextId": "c"},
                    "m": {"contextValues": {"id": "m", "name": "middle"}, "classContextId": "c"}
                }
            }
        "#};
        let aggregate: ExecutionAggregate = serde_json::from_str(json).unwrap();
        let ids: Vec<_> = aggregate.method_contexts.keys().map(String::as_str).collect();
        assert_eq!(ids, ["z", "a", "m"]);
        assert!(aggregate.execution_context.is_none());
    }

    #[test]
    fn custom_contexts_absent_vs_empty() {
        let absent: MethodContext =
            serde_json::from_str(r#"{"contextValues": {"id": "m"}, "classContextId": "c"}"#)
                .unwrap();
        assert!(absent.custom_contexts.is_none());

        let empty: MethodContext = serde_json::from_str(
            r#"{"contextValues": {"id": "m"}, "classContextId": "c", "customContexts": {}}"#,
        )
        .unwrap();
        assert_eq!(empty.custom_contexts, Some(IndexMap::new()));
    }

    #[test]
    fn duration() {
        let mut values = ContextValues::new("id", "name");
        assert_eq!(values.duration_ms(), None);
        values.start_time = Some(1_000);
        values.end_time = Some(1_250);
        assert_eq!(values.duration_ms(), Some(250));
    }
}
