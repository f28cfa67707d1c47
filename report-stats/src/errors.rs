// Copyright (c) The report-ng Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by report-stats.

use camino::Utf8PathBuf;
use config::ConfigError;
use std::{error::Error, fmt, sync::Arc};
use thiserror::Error;

/// An error returned by an execution aggregate source or an artifact source.
///
/// Source errors are cloneable so that every caller waiting on the same load observes the same
/// failure.
#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub struct SourceError {
    message: String,
    #[source]
    source: Option<Arc<dyn Error + Send + Sync>>,
}

impl SourceError {
    /// Creates a new source error with the given message and underlying cause.
    pub fn new(message: impl Into<String>, source: impl Error + Send + Sync + 'static) -> Self {
        Self {
            message: message.into(),
            source: Some(Arc::new(source)),
        }
    }

    /// Creates a new source error with just a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Returns the message for this error.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The kind of context referenced by another context.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ContextKind {
    /// A class context.
    Class,
    /// A test context.
    Test,
    /// A suite context.
    Suite,
    /// A session context.
    Session,
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class => write!(f, "class"),
            Self::Test => write!(f, "test"),
            Self::Suite => write!(f, "suite"),
            Self::Session => write!(f, "session"),
        }
    }
}

/// An error that occurred while deriving statistics or resolving artifacts.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum StatisticsError {
    /// Fetching the execution aggregate failed.
    #[error("failed to fetch execution aggregate")]
    AggregateFetch(#[source] SourceError),

    /// Fetching a single file failed.
    #[error("failed to fetch file `{file_id}`")]
    FileFetch {
        /// The identifier of the file.
        file_id: String,

        /// The underlying error.
        #[source]
        error: SourceError,
    },

    /// A context referenced by identifier does not exist in the execution aggregate.
    #[error(
        "{kind} context `{id}` referenced by `{referenced_by}` is missing from the execution aggregate"
    )]
    MissingContext {
        /// The kind of the missing context.
        kind: ContextKind,

        /// The identifier that could not be resolved.
        id: String,

        /// The identifier of the context holding the reference.
        referenced_by: String,
    },
}

impl StatisticsError {
    pub(crate) fn missing(
        kind: ContextKind,
        id: impl Into<String>,
        referenced_by: impl Into<String>,
    ) -> Self {
        Self::MissingContext {
            kind,
            id: id.into(),
            referenced_by: referenced_by.into(),
        }
    }
}

/// An error that occurred while reading the report configuration.
#[derive(Debug, Error)]
#[error("failed to parse report config{}", .config_file.as_ref().map(|f| format!(" at `{f}`")).unwrap_or_default())]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Option<Utf8PathBuf>,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: Option<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self { config_file, kind }
    }

    /// Returns the config file that failed to parse, if one was specified.
    pub fn config_file(&self) -> Option<&Utf8PathBuf> {
        self.config_file.as_ref()
    }

    /// Returns the kind of error that occurred.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of [`ConfigParseError`].
#[derive(Debug, Error)]
pub enum ConfigParseErrorKind {
    /// Building the layered configuration failed.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// Deserializing the configuration failed.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),
}

/// An error that occurred while comparing two screenshots.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum LayoutDiffError {
    /// A pixel buffer's length does not match its dimensions.
    #[error(
        "{which} screenshot has {actual} bytes of pixel data, expected {expected} for {width}x{height} RGBA"
    )]
    BufferSize {
        /// Which screenshot was malformed.
        which: &'static str,
        /// The declared width.
        width: u32,
        /// The declared height.
        height: u32,
        /// The expected number of bytes.
        expected: usize,
        /// The actual number of bytes.
        actual: usize,
    },
}
