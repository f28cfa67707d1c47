// Copyright (c) The report-ng Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Drives a generator over a report directory on disk.

use camino::Utf8Path;
use camino_tempfile::Utf8TempDir;
use indoc::indoc;
use pretty_assertions::assert_eq;
use report_model::ResultStatus;
use report_stats::{
    errors::StatisticsError, generator::StatisticsGeneratorBuilder, source::ReportDirectory,
    source::ReportPathCorrector,
};

static EXECUTION_JSON: &str = indoc! {r#"
    {
        "executionContext": {"contextValues": {"id": "run", "name": "nightly"}},
        "suiteContexts": {
            "s1": {"contextValues": {"id": "s1", "name": "Regression"}}
        },
        "testContexts": {
            "t1": {"contextValues": {"id": "t1", "name": "Shop"}, "suiteContextId": "s1"}
        },
        "classContexts": {
            "c1": {
                "contextValues": {"id": "c1", "name": "CheckoutTest"},
                "testContextId": "t1",
                "fullClassName": "com.example.CheckoutTest"
            },
            "c2": {
                "contextValues": {"id": "c2", "name": "CheckoutTest"},
                "testContextId": "t1",
                "fullClassName": "com.example.CheckoutTest"
            }
        },
        "sessionContexts": {
            "sess1": {"contextValues": {"id": "sess1", "name": "chrome"}, "browserName": "chrome"}
        },
        "methodContexts": {
            "m1": {
                "contextValues": {"id": "m1", "name": "pay"},
                "classContextId": "c1",
                "parameters": {"card": "visa", "amount": "10"},
                "resultStatus": "FAILED",
                "failedStepIndex": 0,
                "sessionContextIds": ["sess1"],
                "errorContext": {
                    "cause": {"className": "AssertionError", "message": "total mismatch"}
                },
                "testSteps": [
                    {
                        "name": "submit",
                        "actions": [
                            {"name": "click", "entries": [{"screenshotId": "f1"}, {"logMessage": {"level": "INFO", "message": "clicked"}}]},
                            {"name": "verify", "entries": [{"screenshotId": "f2"}]}
                        ]
                    }
                ]
            },
            "m2": {
                "contextValues": {"id": "m2", "name": "browse"},
                "classContextId": "c2",
                "resultStatus": "MINOR",
                "failedStepIndex": -1
            }
        }
    }
"#};

fn write_report(root: &Utf8Path) {
    let files_dir = root.join(ReportDirectory::FILES_DIR);
    std::fs::create_dir_all(&files_dir).unwrap();
    std::fs::write(root.join(ReportDirectory::EXECUTION_PATH), EXECUTION_JSON).unwrap();
    for id in ["f1", "f2"] {
        std::fs::write(
            files_dir.join(format!("{id}.json")),
            format!(r#"{{"id": "{id}", "relativePath": "\\out\\screenshots\\{id}.png"}}"#),
        )
        .unwrap();
    }
}

#[tokio::test]
async fn report_directory_end_to_end() {
    let temp = Utf8TempDir::new().unwrap();
    write_report(temp.path());

    let mut builder = StatisticsGeneratorBuilder::new();
    builder.set_path_corrector(ReportPathCorrector::new(Some("out".to_owned())));
    let generator = builder.build(ReportDirectory::new(temp.path()));

    let statistics = generator.get_execution_statistics().await.unwrap();
    assert_eq!(statistics.class_statistics().len(), 1);
    let class = &statistics.class_statistics()[0];
    assert_eq!(class.class_identifier(), "com.example.CheckoutTest");
    assert_eq!(class.counts().failed(), 1);
    assert_eq!(class.counts().get(ResultStatus::Passed), 1);
    assert_eq!(statistics.failure_aspects()[0].name(), "AssertionError: total mismatch");

    let details = generator.get_method_details("m1").await.unwrap().unwrap();
    assert_eq!(details.identifier(), "pay(card: visa, amount: 10)");
    assert_eq!(details.suite_context().context_values.name, "Regression");
    assert_eq!(details.failed_step().unwrap().name, "submit");
    assert_eq!(details.num_details(), 1);

    let m2 = generator.get_method_details("m2").await.unwrap().unwrap();
    assert!(m2.failed_step().is_none());
    assert_eq!(m2.num_details(), 0);

    let mut files = generator
        .get_screenshots_for_method("m1")
        .await
        .unwrap()
        .unwrap();
    files.sort_by(|a, b| a.id.cmp(&b.id));
    let paths: Vec<_> = files.iter().map(|f| f.relative_path.as_str()).collect();
    assert_eq!(paths, ["screenshots/f1.png", "screenshots/f2.png"]);
}

#[tokio::test]
async fn missing_report_directory() {
    let temp = Utf8TempDir::new().unwrap();
    let generator = StatisticsGeneratorBuilder::new().build(ReportDirectory::new(temp.path()));

    let error = generator.get_execution_statistics().await.unwrap_err();
    assert!(matches!(error, StatisticsError::AggregateFetch(_)));

    let error = generator.get_file("nope").await.unwrap_err();
    assert!(matches!(
        error,
        StatisticsError::FileFetch { ref file_id, .. } if file_id == "nope"
    ));
}
