//! Stat records

use crate::listing::EntryKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of a point `stat` lookup.
///
/// Fields the backend does not know are `None` rather than zeroed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VfsStat {
    pub mode: u32,
    pub kind: EntryKind,
    pub size: Option<u64>,
    pub btime: Option<DateTime<Utc>>,
    pub mtime: Option<DateTime<Utc>>,
    pub ctime: Option<DateTime<Utc>>,
}

impl VfsStat {
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Volume-level statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatFs {
    pub volume_name: String,
    pub total_bytes: Option<u64>,
    pub free_bytes: Option<u64>,
    pub avail_bytes: Option<u64>,
}
