//! Operation flags

use serde::{Deserialize, Serialize};

/// Flags for directory listing requests
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ListingFlags {
    /// Drop any cached snapshot before fetching
    pub force_refresh: bool,
    /// Suppress the ".." entry
    pub no_dot_dot: bool,
}

/// Flags for opening a file
///
/// At most one of `read`/`write` may be set; `append` is advisory and a
/// backend may refuse it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OpenFlags {
    pub read: bool,
    pub write: bool,
    pub append: bool,
    /// Create the entry if it does not exist (write mode)
    pub create: bool,
    /// Fail with `Exists` if the entry is already present (write mode)
    pub no_overwrite: bool,
}

impl OpenFlags {
    pub fn read() -> Self {
        Self {
            read: true,
            ..Default::default()
        }
    }

    pub fn write() -> Self {
        Self {
            write: true,
            ..Default::default()
        }
    }

    pub fn with_create(mut self) -> Self {
        self.create = true;
        self
    }

    pub fn with_no_overwrite(mut self) -> Self {
        self.no_overwrite = true;
        self
    }
}
