// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cached entry descriptor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single entity parsed from a PROPFIND reply.
///
/// `name` is relative to the containing directory and may be ".." for the
/// directory itself. Properties the server did not report are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DavEntry {
    pub name: String,
    pub size: Option<u64>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub is_directory: bool,
}

impl DavEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_directory: true,
            ..Default::default()
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = Some(modified);
        self
    }
}
