// Copyright (c) The report-ng Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The statistics generator: cached access to statistics, method details and files.

use crate::{
    cache::{CacheConfig, MemoCache},
    config::ReportConfig,
    details::{MethodDetails, screenshot_ids},
    errors::StatisticsError,
    source::{ArtifactSource, ExecutionAggregateSource, PathCorrector, ReportPathCorrector},
    statistics::ExecutionStatistics,
    status::{DefaultStatusNormalizer, StatusNormalizer},
};
use debug_ignore::DebugIgnore;
use futures::{StreamExt, TryStreamExt};
use report_model::{File, MethodContext};
use std::{fmt, num::NonZeroUsize, sync::Arc};
use tracing::debug;

/// The cache key for execution statistics.
pub const EXECUTION_STATISTICS_KEY: &str = "executionStatistics";

/// The default upper bound on concurrent file loads.
pub const DEFAULT_FETCH_CONCURRENCY: NonZeroUsize = NonZeroUsize::new(16).unwrap();

fn method_key(method_id: &str) -> String {
    format!("method:{method_id}")
}

fn file_key(file_id: &str) -> String {
    format!("file:{file_id}")
}

/// Builder for a [`StatisticsGenerator`].
#[derive(Debug)]
pub struct StatisticsGeneratorBuilder {
    cache_config: CacheConfig,
    fetch_concurrency: NonZeroUsize,
    normalizer: DebugIgnore<Arc<dyn StatusNormalizer>>,
    path_corrector: DebugIgnore<Arc<dyn PathCorrector>>,
}

impl Default for StatisticsGeneratorBuilder {
    fn default() -> Self {
        Self {
            cache_config: CacheConfig::default(),
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            normalizer: DebugIgnore(Arc::new(DefaultStatusNormalizer)),
            path_corrector: DebugIgnore(Arc::new(ReportPathCorrector::default())),
        }
    }
}

impl StatisticsGeneratorBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new builder from report configuration.
    pub fn from_config(config: &ReportConfig) -> Self {
        let mut builder = Self::new();
        builder
            .set_cache_config(config.cache_config())
            .set_fetch_concurrency(config.fetch_concurrency())
            .set_path_corrector(ReportPathCorrector::new(
                config.path_prefix().map(ToOwned::to_owned),
            ));
        builder
    }

    /// Sets the configuration shared by all caches.
    pub fn set_cache_config(&mut self, cache_config: CacheConfig) -> &mut Self {
        self.cache_config = cache_config;
        self
    }

    /// Sets the maximum number of file loads run at once by
    /// [`StatisticsGenerator::get_files_for_ids`].
    pub fn set_fetch_concurrency(&mut self, fetch_concurrency: NonZeroUsize) -> &mut Self {
        self.fetch_concurrency = fetch_concurrency;
        self
    }

    /// Sets the normalizer applied to every method's result status.
    pub fn set_status_normalizer(
        &mut self,
        normalizer: impl StatusNormalizer + 'static,
    ) -> &mut Self {
        self.normalizer = DebugIgnore(Arc::new(normalizer));
        self
    }

    /// Sets the corrector applied to every resolved file's relative path.
    pub fn set_path_corrector(&mut self, path_corrector: impl PathCorrector + 'static) -> &mut Self {
        self.path_corrector = DebugIgnore(Arc::new(path_corrector));
        self
    }

    /// Builds a generator reading from `source`.
    pub fn build<S>(self, source: S) -> StatisticsGenerator<S> {
        let cache_config = self.cache_config;
        StatisticsGenerator {
            loader: StatisticsLoader {
                source: Arc::new(source),
                normalizer: self.normalizer,
                cache: Arc::new(MemoCache::new(cache_config)),
            },
            method_cache: Arc::new(MemoCache::new(cache_config)),
            file_cache: Arc::new(MemoCache::new(cache_config)),
            path_corrector: self.path_corrector,
            fetch_concurrency: self.fetch_concurrency,
        }
    }
}

type StatisticsCache = MemoCache<Arc<ExecutionStatistics>, StatisticsError>;
type MethodCache = MemoCache<Option<Arc<MethodDetails>>, StatisticsError>;
type FileCache = MemoCache<Arc<File>, StatisticsError>;

/// Derives statistics and resolves artifacts for a run, caching every result.
///
/// Statistics are cached under [`EXECUTION_STATISTICS_KEY`], method details under
/// `method:<id>` and files under `file:<id>`. All caches share one TTL. Concurrent requests for
/// the same key share a single load, and failed loads are retried on the next request.
///
/// Clones share the same caches.
pub struct StatisticsGenerator<S> {
    loader: StatisticsLoader<S>,
    method_cache: Arc<MethodCache>,
    file_cache: Arc<FileCache>,
    path_corrector: DebugIgnore<Arc<dyn PathCorrector>>,
    fetch_concurrency: NonZeroUsize,
}

impl<S> StatisticsGenerator<S> {
    /// Returns the source this generator reads from.
    pub fn source(&self) -> &S {
        &self.loader.source
    }

    /// Returns the screenshot identifiers recorded by a method, in order and with duplicates.
    pub fn screenshot_ids_from_method_context(&self, method_context: &MethodContext) -> Vec<String> {
        screenshot_ids(method_context)
    }

    /// Drops every cached value, so that the next request of any kind reloads from the source.
    pub fn clear_caches(&self) {
        debug!("clearing all caches");
        self.loader.cache.clear();
        self.method_cache.clear();
        self.file_cache.clear();
    }
}

impl<S: ExecutionAggregateSource> StatisticsGenerator<S> {
    /// Returns the statistics for the run, building them on first access.
    pub async fn get_execution_statistics(
        &self,
    ) -> Result<Arc<ExecutionStatistics>, StatisticsError> {
        self.loader.load().await
    }

    /// Returns the details for a method, or `None` if the run has no such method.
    pub async fn get_method_details(
        &self,
        method_id: &str,
    ) -> Result<Option<Arc<MethodDetails>>, StatisticsError> {
        let loader = self.loader.clone();
        let id = method_id.to_owned();
        self.method_cache
            .get_or_load(&method_key(method_id), move || async move {
                let statistics = loader.load().await?;
                let details = MethodDetails::resolve(statistics, &id)?;
                if details.is_none() {
                    debug!("no method with id `{id}`");
                }
                Ok(details.map(Arc::new))
            })
            .await
    }
}

impl<S: ArtifactSource> StatisticsGenerator<S> {
    /// Returns the file with the given identifier, with its relative path corrected.
    pub async fn get_file(&self, file_id: &str) -> Result<Arc<File>, StatisticsError> {
        let source = Arc::clone(&self.loader.source);
        let path_corrector = Arc::clone(&self.path_corrector.0);
        let id = file_id.to_owned();
        self.file_cache
            .get_or_load(&file_key(file_id), move || async move {
                let mut file = source
                    .fetch_file(&id)
                    .await
                    .map_err(|error| StatisticsError::FileFetch {
                        file_id: id.clone(),
                        error,
                    })?;
                file.relative_path = path_corrector.correct(&file.relative_path);
                Ok(Arc::new(file))
            })
            .await
    }

    /// Returns the files with the given identifiers.
    ///
    /// Files are loaded concurrently, up to the configured fetch concurrency, and returned in the
    /// order they finish loading. If any load fails, the whole batch fails.
    pub async fn get_files_for_ids<I>(&self, file_ids: I) -> Result<Vec<Arc<File>>, StatisticsError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let file_ids: Vec<String> = file_ids
            .into_iter()
            .map(|id| id.as_ref().to_owned())
            .collect();
        debug!(
            "resolving {} files, {} at a time",
            file_ids.len(),
            self.fetch_concurrency
        );

        futures::stream::iter(file_ids.iter().map(|id| self.get_file(id)))
            .buffer_unordered(self.fetch_concurrency.get())
            .try_collect()
            .await
    }
}

impl<S: ExecutionAggregateSource + ArtifactSource> StatisticsGenerator<S> {
    /// Returns the files for every screenshot recorded by a method.
    ///
    /// Returns `None` if the run has no such method. Files are returned in completion order.
    pub async fn get_screenshots_for_method(
        &self,
        method_id: &str,
    ) -> Result<Option<Vec<Arc<File>>>, StatisticsError> {
        let Some(details) = self.get_method_details(method_id).await? else {
            return Ok(None);
        };
        let files = self.get_files_for_ids(details.screenshot_ids()).await?;
        Ok(Some(files))
    }
}

impl<S> Clone for StatisticsGenerator<S> {
    fn clone(&self) -> Self {
        Self {
            loader: self.loader.clone(),
            method_cache: Arc::clone(&self.method_cache),
            file_cache: Arc::clone(&self.file_cache),
            path_corrector: self.path_corrector.clone(),
            fetch_concurrency: self.fetch_concurrency,
        }
    }
}

impl<S> fmt::Debug for StatisticsGenerator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatisticsGenerator")
            .field("statistics_cache", &self.loader.cache)
            .field("method_cache", &self.method_cache)
            .field("file_cache", &self.file_cache)
            .field("fetch_concurrency", &self.fetch_concurrency)
            .finish_non_exhaustive()
    }
}

// Everything needed to load statistics, split out so that method-detail loads can hold it
// without holding the generator.
struct StatisticsLoader<S> {
    source: Arc<S>,
    normalizer: DebugIgnore<Arc<dyn StatusNormalizer>>,
    cache: Arc<StatisticsCache>,
}

impl<S> Clone for StatisticsLoader<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            normalizer: self.normalizer.clone(),
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<S: ExecutionAggregateSource> StatisticsLoader<S> {
    async fn load(&self) -> Result<Arc<ExecutionStatistics>, StatisticsError> {
        let source = Arc::clone(&self.source);
        let normalizer = Arc::clone(&self.normalizer.0);
        self.cache
            .get_or_load(EXECUTION_STATISTICS_KEY, move || async move {
                debug!("fetching execution aggregate");
                let aggregate = source
                    .fetch_aggregate()
                    .await
                    .map_err(StatisticsError::AggregateFetch)?;
                let statistics = ExecutionStatistics::from_aggregate(aggregate, &*normalizer)?;
                Ok(Arc::new(statistics))
            })
            .await
    }
}
