// Copyright (c) The report-ng Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration for report-ng.
//!
//! Configuration is read from, in increasing order of priority:
//!
//! 1. the defaults in `default-config.toml`,
//! 2. an optional user config file,
//! 3. environment variables prefixed with `REPORT_NG_`, with `__` separating nested keys. For
//!    example, `REPORT_NG_CACHE__TTL=5m`.

use crate::{
    cache::CacheConfig,
    errors::{ConfigParseError, ConfigParseErrorKind},
};
use camino::Utf8Path;
use config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::{num::NonZeroUsize, time::Duration};

/// Configuration for the statistics generator and its caches.
#[derive(Clone, Debug)]
pub struct ReportConfig {
    inner: ReportConfigImpl,
}

impl ReportConfig {
    /// Contains the default config as a TOML file.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Environment configuration uses this prefix, plus a _.
    pub const ENVIRONMENT_PREFIX: &'static str = "REPORT_NG";

    /// Returns the default configuration.
    pub fn default_config() -> Self {
        let config = Self::make_default_config()
            .build()
            .expect("default config is always valid");
        let inner = config
            .try_deserialize()
            .expect("default config is always valid");
        Self { inner }
    }

    /// Reads configuration from the defaults, then `config_file` if specified, then the
    /// environment.
    pub fn from_sources(config_file: Option<&Utf8Path>) -> Result<Self, ConfigParseError> {
        Self::from_sources_with_env(config_file, std::env::vars())
    }

    pub(crate) fn from_sources_with_env(
        config_file: Option<&Utf8Path>,
        env: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, ConfigParseError> {
        let mut builder = Self::make_default_config();
        if let Some(config_file) = config_file {
            builder = builder.add_source(File::new(config_file.as_str(), FileFormat::Toml));
        }
        builder = builder.add_source(
            Environment::with_prefix(Self::ENVIRONMENT_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(Some(Self::environment_map(env))),
        );

        let inner = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(config_file.map(ToOwned::to_owned), kind))?;
        Ok(Self { inner })
    }

    /// Returns the configuration for every cache.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new(self.inner.cache.ttl)
    }

    /// Returns the maximum number of file records fetched at once.
    pub fn fetch_concurrency(&self) -> NonZeroUsize {
        self.inner.artifacts.fetch_concurrency
    }

    /// Returns the prefix stripped from resolved file paths, if any.
    pub fn path_prefix(&self) -> Option<&str> {
        self.inner.artifacts.path_prefix.as_deref()
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    // Keys are kebab-case, but environment variables can't contain dashes. Within each nested
    // key, underscores are turned into dashes: `REPORT_NG_ARTIFACTS__FETCH_CONCURRENCY` sets
    // `artifacts.fetch-concurrency`.
    fn environment_map(
        env: impl IntoIterator<Item = (String, String)>,
    ) -> config::Map<String, String> {
        let prefix = format!("{}_", Self::ENVIRONMENT_PREFIX);
        env.into_iter()
            .filter_map(|(name, value)| {
                let key = name.strip_prefix(&prefix)?;
                let key = key
                    .split("__")
                    .map(|part| part.replace('_', "-"))
                    .collect::<Vec<_>>()
                    .join("__");
                Some((format!("{prefix}{key}"), value))
            })
            .collect()
    }

    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<ReportConfigImpl, ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        serde_path_to_error::deserialize(config)
            .map_err(|error| ConfigParseErrorKind::DeserializeError(Box::new(error)))
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ReportConfigImpl {
    cache: CacheSection,
    artifacts: ArtifactsSection,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CacheSection {
    #[serde(with = "humantime_serde")]
    ttl: Duration,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ArtifactsSection {
    fetch_concurrency: NonZeroUsize,
    #[serde(default)]
    path_prefix: Option<String>,
}
