// Copyright (c) The report-ng Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use owo_colors::OwoColorize;
use report_stats::errors::{ConfigParseError, StatisticsError};
use std::error::Error;
use thiserror::Error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

/// Documented exit codes for `report-ng` failures.
///
/// Unknown or unexpected failures always result in exit code 1.
pub enum ReportNgExitCode {}

impl ReportNgExitCode {
    /// No errors occurred.
    pub const OK: i32 = 0;

    /// The requested method does not exist in the report.
    pub const METHOD_NOT_FOUND: i32 = 4;

    /// A user issue happened while setting up, for example an invalid config file.
    pub const SETUP_ERROR: i32 = 96;

    /// The execution aggregate could not be read.
    pub const REPORT_LOAD_FAILED: i32 = 102;

    /// One or more files could not be resolved.
    pub const FILE_RESOLUTION_FAILED: i32 = 103;

    /// The report refers to contexts that don't exist.
    pub const INVALID_REPORT: i32 = 105;

    /// Writing data to stdout produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}

// The #[error()] strings are placeholders: errors are meant to be printed with
// display_to_stderr, which also prints causes.

/// An expected failure of a `report-ng` command.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("failed to create async runtime")]
    RuntimeCreateError {
        #[source]
        err: std::io::Error,
    },
    #[error("statistics error")]
    StatisticsError {
        #[from]
        err: StatisticsError,
    },
    #[error("method not found")]
    MethodNotFound { method_id: String },
    #[error("error writing output")]
    WriteError {
        #[source]
        err: std::io::Error,
    },
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::ConfigParseError { .. } | Self::RuntimeCreateError { .. } => {
                ReportNgExitCode::SETUP_ERROR
            }
            Self::StatisticsError { err } => match err {
                StatisticsError::AggregateFetch(_) => ReportNgExitCode::REPORT_LOAD_FAILED,
                StatisticsError::FileFetch { .. } => ReportNgExitCode::FILE_RESOLUTION_FAILED,
                StatisticsError::MissingContext { .. } => ReportNgExitCode::INVALID_REPORT,
                _ => 1,
            },
            Self::MethodNotFound { .. } => ReportNgExitCode::METHOD_NOT_FOUND,
            Self::WriteError { .. } => ReportNgExitCode::WRITE_OUTPUT_ERROR,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::ConfigParseError { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::RuntimeCreateError { err } => {
                tracing::error!("failed to create async runtime");
                Some(err as &dyn Error)
            }
            Self::StatisticsError { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::MethodNotFound { method_id } => {
                tracing::error!(
                    "no method with id `{}` in report",
                    method_id.style(styles.bold)
                );
                None
            }
            Self::WriteError { err } => {
                tracing::error!("error writing output");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            tracing::error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {err}");
            next_error = err.source();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use report_stats::errors::{ContextKind, SourceError};

    #[test]
    fn exit_codes() {
        let aggregate = ExpectedError::from(StatisticsError::AggregateFetch(SourceError::msg(
            "failed to read `model/execution.json`",
        )));
        assert_eq!(
            aggregate.process_exit_code(),
            ReportNgExitCode::REPORT_LOAD_FAILED
        );

        let missing = ExpectedError::from(StatisticsError::MissingContext {
            kind: ContextKind::Session,
            id: "s1".to_owned(),
            referenced_by: "m1".to_owned(),
        });
        assert_eq!(missing.process_exit_code(), ReportNgExitCode::INVALID_REPORT);

        let not_found = ExpectedError::MethodNotFound {
            method_id: "m9".to_owned(),
        };
        assert_eq!(not_found.process_exit_code(), 4);
    }
}
