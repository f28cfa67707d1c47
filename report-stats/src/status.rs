// Copyright (c) The report-ng Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Result status normalization.

use report_model::ResultStatus;

/// Canonicalizes raw result statuses before they are counted.
///
/// Implementations must be pure and idempotent: normalizing an already-normalized status returns
/// it unchanged.
pub trait StatusNormalizer: Send + Sync {
    /// Returns the canonical status for `raw`.
    fn normalize(&self, raw: ResultStatus) -> ResultStatus;
}

impl<F> StatusNormalizer for F
where
    F: Fn(ResultStatus) -> ResultStatus + Send + Sync,
{
    fn normalize(&self, raw: ResultStatus) -> ResultStatus {
        self(raw)
    }
}

/// The default normalizer, which folds the "minor" statuses into their canonical counterparts.
#[derive(Copy, Clone, Debug, Default)]
pub struct DefaultStatusNormalizer;

impl StatusNormalizer for DefaultStatusNormalizer {
    fn normalize(&self, raw: ResultStatus) -> ResultStatus {
        match raw {
            ResultStatus::Minor => ResultStatus::Passed,
            ResultStatus::FailedMinor => ResultStatus::Failed,
            ResultStatus::MinorRetry => ResultStatus::PassedRetry,
            other => other,
        }
    }
}
