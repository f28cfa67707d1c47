// Copyright (c) The report-ng Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt;

/// The result status recorded for a test method.
///
/// Raw statuses coming from a recorded run may include the "minor" family, which downstream
/// consumers usually fold into a canonical status before counting.
#[derive(
    Copy, Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultStatus {
    /// The method was never run.
    #[default]
    NoRun,

    /// An informational entry, not a real test.
    Info,

    /// The method was skipped.
    Skipped,

    /// The method passed.
    Passed,

    /// The method passed with minor failures.
    Minor,

    /// The method failed.
    Failed,

    /// The method failed, and also had minor failures.
    FailedMinor,

    /// The method failed, and was retried.
    FailedRetried,

    /// The method failed, and the failure was expected.
    FailedExpected,

    /// The method passed after being retried.
    PassedRetry,

    /// The method passed with minor failures after being retried.
    MinorRetry,
}

impl ResultStatus {
    /// Returns all the variants of this enum, in declaration order.
    pub fn variants() -> &'static [ResultStatus] {
        &[
            Self::NoRun,
            Self::Info,
            Self::Skipped,
            Self::Passed,
            Self::Minor,
            Self::Failed,
            Self::FailedMinor,
            Self::FailedRetried,
            Self::FailedExpected,
            Self::PassedRetry,
            Self::MinorRetry,
        ]
    }

    /// Returns the wire representation of this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoRun => "NO_RUN",
            Self::Info => "INFO",
            Self::Skipped => "SKIPPED",
            Self::Passed => "PASSED",
            Self::Minor => "MINOR",
            Self::Failed => "FAILED",
            Self::FailedMinor => "FAILED_MINOR",
            Self::FailedRetried => "FAILED_RETRIED",
            Self::FailedExpected => "FAILED_EXPECTED",
            Self::PassedRetry => "PASSED_RETRY",
            Self::MinorRetry => "MINOR_RETRY",
        }
    }

    /// Returns true if this status counts as a pass.
    pub fn is_passed(self) -> bool {
        matches!(
            self,
            Self::Passed | Self::Minor | Self::PassedRetry | Self::MinorRetry
        )
    }

    /// Returns true if this status counts as a failure, expected or not.
    pub fn is_failed(self) -> bool {
        matches!(
            self,
            Self::Failed | Self::FailedMinor | Self::FailedRetried | Self::FailedExpected
        )
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
