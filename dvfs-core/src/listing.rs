//! Directory listing containers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unix access mode reported for directories: `S_IFDIR | rwx` for the owner.
pub const DIRECTORY_ACCESS_MODE: u32 = 0o040_000 | 0o400 | 0o200 | 0o100;

/// Unix access mode reported for regular files: `S_IFREG | rw` for the owner.
pub const REGULAR_FILE_ACCESS_MODE: u32 = 0o100_000 | 0o400 | 0o200;

/// Entry kind, mirroring `DT_DIR`/`DT_REG`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    pub fn access_mode(self) -> u32 {
        match self {
            EntryKind::File => REGULAR_FILE_ACCESS_MODE,
            EntryKind::Directory => DIRECTORY_ACCESS_MODE,
        }
    }
}

/// Lightweight entry surfaced by `iterate_directory_listing`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// One row of a materialised directory listing.
///
/// `size` is dense (zero when the backend does not know it); the timestamps
/// are sparse and absent when unknown. `ctime` mirrors `mtime` for backends
/// that do not track status changes separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingEntry {
    pub name: String,
    pub mode: u32,
    pub kind: EntryKind,
    pub size: u64,
    pub btime: Option<DateTime<Utc>>,
    pub mtime: Option<DateTime<Utc>>,
    pub ctime: Option<DateTime<Utc>>,
}

impl ListingEntry {
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// A materialised directory listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryListing {
    /// Directory path, always with a trailing slash
    pub path: String,
    pub entries: Vec<ListingEntry>,
}

/// Builder the dispatch layer hands to a backend to materialise a listing.
///
/// Backends push one entry per row; the builder owns the directory path.
#[derive(Debug)]
pub struct ListingBuilder {
    path: String,
    entries: Vec<ListingEntry>,
}

impl ListingBuilder {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: ListingEntry) {
        self.entries.push(entry);
    }

    pub fn build(self) -> DirectoryListing {
        DirectoryListing {
            path: self.path,
            entries: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_modes() {
        assert_eq!(DIRECTORY_ACCESS_MODE, 0o40700);
        assert_eq!(REGULAR_FILE_ACCESS_MODE, 0o100600);
        assert_eq!(EntryKind::Directory.access_mode(), 0o40700);
        assert_eq!(EntryKind::File.access_mode(), 0o100600);
    }

    #[test]
    fn test_builder_preserves_order() {
        let mut builder = ListingBuilder::new("/x/");
        for name in ["..", "a", "b"] {
            builder.push(ListingEntry {
                name: name.to_string(),
                mode: DIRECTORY_ACCESS_MODE,
                kind: EntryKind::Directory,
                size: 0,
                btime: None,
                mtime: None,
                ctime: None,
            });
        }
        let listing = builder.build();
        assert_eq!(listing.path, "/x/");
        let names: Vec<_> = listing.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["..", "a", "b"]);
    }
}
