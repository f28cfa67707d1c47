// Copyright (c) The report-ng Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plain-text rendering of statistics, method details and files.

use crate::output::ReportStyles;
use owo_colors::OwoColorize;
use report_model::{File, ResultStatus};
use report_stats::{
    details::MethodDetails,
    layout::LayoutComparisonContext,
    statistics::{ExecutionStatistics, StatusCounts},
};
use std::{collections::HashMap, sync::Arc};
use swrite::{SWrite, swrite, swriteln};

pub(crate) fn write_counts(out: &mut String, counts: &StatusCounts, styles: &ReportStyles) {
    swrite!(
        out,
        "{} passed, {} failed, {} expected failed, {} skipped",
        counts.passed().style(styles.pass),
        counts.failed().style(styles.fail),
        counts.expected_failed().style(styles.count),
        counts.skipped().style(styles.skip),
    );
    if counts.retried() > 0 {
        swrite!(out, ", {} retried", counts.retried().style(styles.count));
    }
    swrite!(out, " ({} total)", counts.total().style(styles.count));
}

pub(crate) fn summary(
    statistics: &ExecutionStatistics,
    max_aspects: usize,
    verbose: bool,
    styles: &ReportStyles,
) -> String {
    let mut out = String::new();
    let run_name = statistics
        .aggregate()
        .execution_context
        .as_ref()
        .map(|context| context.context_values.name.as_str())
        .filter(|name| !name.is_empty())
        .unwrap_or("run");
    swrite!(out, "{}: ", run_name.style(styles.heading));
    write_counts(&mut out, statistics.counts(), styles);
    out.push('\n');

    if !statistics.class_statistics().is_empty() {
        swriteln!(out, "\n{}", "Classes:".style(styles.heading));
        for class in statistics.class_statistics() {
            swrite!(out, "  {}: ", class.class_identifier().style(styles.identifier));
            write_counts(&mut out, class.counts(), styles);
            out.push('\n');
        }
    }

    let aspects = statistics.failure_aspects();
    if !aspects.is_empty() && max_aspects > 0 {
        swriteln!(out, "\n{}", "Failure aspects:".style(styles.heading));
        for aspect in aspects.iter().take(max_aspects) {
            swriteln!(
                out,
                "  {} x {}",
                aspect.occurrences().style(styles.count),
                aspect.name()
            );
            if verbose {
                swriteln!(out, "      {}", aspect.method_ids().join(", "));
            }
        }
        if aspects.len() > max_aspects {
            swriteln!(out, "  ... and {} more", aspects.len() - max_aspects);
        }
    }

    out
}

fn status_style(status: ResultStatus, styles: &ReportStyles) -> owo_colors::Style {
    if status.is_passed() {
        styles.pass
    } else if status.is_failed() {
        styles.fail
    } else {
        styles.skip
    }
}

pub(crate) fn method_details(details: &MethodDetails, styles: &ReportStyles) -> String {
    let method = details.method_context();
    let mut out = String::new();
    swriteln!(
        out,
        "{} {}",
        details.identifier().style(styles.identifier),
        method
            .result_status
            .as_str()
            .style(status_style(method.result_status, styles)),
    );
    swriteln!(out, "  class:   {}", details.class_statistics().class_identifier());
    swriteln!(out, "  test:    {}", details.test_context().context_values.name);
    swriteln!(out, "  suite:   {}", details.suite_context().context_values.name);
    if let Some(duration) = method.context_values.duration_ms() {
        swriteln!(out, "  duration: {duration}ms");
    }
    if method.retry_number > 0 {
        swriteln!(out, "  retry:   {}", method.retry_number);
    }

    for session in details.session_contexts() {
        let browser = match (&session.browser_name, &session.browser_version) {
            (Some(name), Some(version)) => format!("{name} {version}"),
            (Some(name), None) => name.clone(),
            _ => session.context_values.name.clone(),
        };
        swriteln!(
            out,
            "  session: {browser} ({})",
            session.context_values.id
        );
    }

    if let Some(step) = details.failed_step() {
        swriteln!(out, "  failed step: {}", step.name.style(styles.fail));
    }
    if let Some(aspect) = details.failure_aspect() {
        swriteln!(out, "  failure aspect: {}", aspect.name());
    }
    swriteln!(out, "  detail panels: {}", details.num_details());

    let screenshots = details.screenshot_ids();
    if !screenshots.is_empty() {
        swriteln!(out, "  screenshots: {}", screenshots.join(", "));
    }
    out
}

pub(crate) fn layout_comparison(name: &str, context: &LayoutComparisonContext) -> String {
    let mut out = String::new();
    swriteln!(out, "layout comparison `{name}`:");
    if let Some(mode) = &context.mode {
        swriteln!(out, "  mode:       {mode}");
    }
    if let Some(distance) = context.distance {
        swriteln!(out, "  distance:   {distance}%");
    }
    let screenshots = [
        ("actual", &context.actual_screenshot),
        ("expected", &context.expected_screenshot),
        ("distance", &context.distance_screenshot),
        ("annotated", &context.annotated_screenshot),
    ];
    for (label, screenshot) in screenshots {
        if let Some(screenshot) = screenshot {
            swriteln!(out, "  {label:<10}  {}", screenshot.path());
        }
    }
    out
}

/// Orders files to match the identifiers they were requested by.
///
/// Files are resolved in completion order, so this restores the caller's order. Duplicate
/// identifiers yield the same file more than once.
pub(crate) fn in_request_order(files: Vec<Arc<File>>, file_ids: &[String]) -> Vec<Arc<File>> {
    let by_id: HashMap<&str, &Arc<File>> =
        files.iter().map(|file| (file.id.as_str(), file)).collect();
    file_ids
        .iter()
        .filter_map(|id| by_id.get(id.as_str()).map(|file| Arc::clone(file)))
        .collect()
}

pub(crate) fn files(files: &[Arc<File>], styles: &ReportStyles) -> String {
    let mut out = String::new();
    for file in files {
        swrite!(out, "{}  {}", file.id.style(styles.identifier), file.relative_path);
        if let Some(mimetype) = &file.mimetype {
            swrite!(out, "  ({mimetype})");
        }
        out.push('\n');
    }
    out
}
