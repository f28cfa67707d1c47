// Copyright (c) The report-ng Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sources for execution aggregates and artifacts, and path correction.

use crate::errors::SourceError;
use camino::{Utf8Path, Utf8PathBuf};
use report_model::{ExecutionAggregate, File};
use serde::de::DeserializeOwned;
use std::future::Future;
use tracing::debug;

/// Supplies the raw execution aggregate for a run.
pub trait ExecutionAggregateSource: Send + Sync + 'static {
    /// Fetches the full execution aggregate.
    fn fetch_aggregate(
        &self,
    ) -> impl Future<Output = Result<ExecutionAggregate, SourceError>> + Send;
}

/// Supplies individual artifact file records by identifier.
pub trait ArtifactSource: Send + Sync + 'static {
    /// Fetches the file record with the given identifier.
    fn fetch_file(&self, file_id: &str) -> impl Future<Output = Result<File, SourceError>> + Send;
}

/// Corrects the relative path of a resolved file.
pub trait PathCorrector: Send + Sync {
    /// Returns the corrected form of `relative_path`.
    fn correct(&self, relative_path: &str) -> String;
}

impl<F> PathCorrector for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn correct(&self, relative_path: &str) -> String {
        self(relative_path)
    }
}

/// The default path corrector for report directories.
///
/// Paths recorded on Windows use backslashes, and some writers record paths relative to a parent
/// of the report directory. This corrector normalizes separators to `/`, strips the configured
/// prefix if present, and trims leading slashes.
#[derive(Clone, Debug, Default)]
pub struct ReportPathCorrector {
    prefix: Option<String>,
}

impl ReportPathCorrector {
    /// Creates a new corrector, stripping `prefix` from paths that start with it.
    pub fn new(prefix: Option<String>) -> Self {
        let prefix = prefix
            .map(|prefix| prefix.replace('\\', "/").trim_matches('/').to_owned())
            .filter(|prefix| !prefix.is_empty());
        Self { prefix }
    }

    /// Returns the prefix stripped by this corrector.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }
}

impl PathCorrector for ReportPathCorrector {
    fn correct(&self, relative_path: &str) -> String {
        let path = relative_path.replace('\\', "/");
        let mut path = path.trim_start_matches('/');
        if let Some(prefix) = &self.prefix {
            if let Some(rest) = path.strip_prefix(prefix.as_str()) {
                // Only strip whole path components.
                if rest.is_empty() || rest.starts_with('/') {
                    path = rest.trim_start_matches('/');
                }
            }
        }
        path.to_owned()
    }
}

/// A report directory on disk.
///
/// The layout is:
///
/// ```text
/// <root>/model/execution.json     the execution aggregate
/// <root>/model/files/<id>.json    one record per artifact file
/// ```
#[derive(Clone, Debug)]
pub struct ReportDirectory {
    root: Utf8PathBuf,
}

impl ReportDirectory {
    /// The path of the execution aggregate, relative to the root.
    pub const EXECUTION_PATH: &'static str = "model/execution.json";

    /// The directory holding file records, relative to the root.
    pub const FILES_DIR: &'static str = "model/files";

    /// Creates a new report directory rooted at `root`.
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root of the report directory.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Returns the path at which the record for `file_id` is stored.
    ///
    /// Returns an error if `file_id` could escape the files directory.
    pub fn file_record_path(&self, file_id: &str) -> Result<Utf8PathBuf, SourceError> {
        if file_id.is_empty()
            || file_id.contains(['/', '\\'])
            || file_id == "."
            || file_id == ".."
        {
            return Err(SourceError::msg(format!("invalid file id `{file_id}`")));
        }
        Ok(self.root.join(Self::FILES_DIR).join(format!("{file_id}.json")))
    }
}

impl ExecutionAggregateSource for ReportDirectory {
    async fn fetch_aggregate(&self) -> Result<ExecutionAggregate, SourceError> {
        read_json(&self.root.join(Self::EXECUTION_PATH)).await
    }
}

impl ArtifactSource for ReportDirectory {
    async fn fetch_file(&self, file_id: &str) -> Result<File, SourceError> {
        let path = self.file_record_path(file_id)?;
        read_json(&path).await
    }
}

async fn read_json<T: DeserializeOwned>(path: &Utf8Path) -> Result<T, SourceError> {
    debug!("reading `{path}`");
    let contents = tokio::fs::read(path)
        .await
        .map_err(|err| SourceError::new(format!("failed to read `{path}`"), err))?;
    serde_json::from_slice(&contents)
        .map_err(|err| SourceError::new(format!("failed to parse `{path}`"), err))
}
