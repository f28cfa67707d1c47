// Copyright (c) The report-ng Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// An artifact stored alongside a run, such as a screenshot, video or log file.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    /// The opaque identifier of this file.
    pub id: String,

    /// The path of this file relative to the report root.
    #[serde(default)]
    pub relative_path: String,

    /// The MIME type of this file.
    #[serde(default)]
    pub mimetype: Option<String>,

    /// The size of this file in bytes.
    #[serde(default)]
    pub size: u64,

    /// When this file was created, in milliseconds since the Unix epoch.
    #[serde(default)]
    pub created_timestamp: Option<u64>,

    /// When this file was last modified, in milliseconds since the Unix epoch.
    #[serde(default)]
    pub last_modified: Option<u64>,

    /// Additional metadata attached to this file.
    #[serde(default)]
    pub meta: IndexMap<String, String>,
}

impl File {
    /// Creates a new file record with the given identifier and relative path.
    pub fn new(id: impl Into<String>, relative_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            relative_path: relative_path.into(),
            ..Default::default()
        }
    }
}
