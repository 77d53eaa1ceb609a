// SPDX-License-Identifier: AGPL-3.0-or-later
//! Path-keyed directory snapshots

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use dvfs_core::host::ChangeHandler;
use dvfs_core::path::{ensure_trailing_slash, split_path};
use tracing::trace;

use crate::entry::DavEntry;

const LISTING_TTL: Duration = Duration::from_secs(60);

// Tickets are unique across the whole process, not per cache.
static NEXT_TICKET: AtomicU64 = AtomicU64::new(1);

/// Outcome of a point lookup
#[derive(Debug, Clone, PartialEq)]
pub enum ItemLookup {
    /// The entry is present in a current snapshot
    Found(DavEntry),
    /// The cache cannot answer; ask the server
    Unknown,
    /// A current snapshot proves the entry does not exist
    Nonexistent,
}

struct Snapshot {
    fetched_at: Instant,
    items: Vec<DavEntry>,
    dirty_marks: Vec<bool>,
    has_dirty_items: bool,
}

impl Snapshot {
    fn empty_dirty() -> Self {
        Self {
            fetched_at: Instant::now(),
            items: Vec::new(),
            dirty_marks: Vec::new(),
            has_dirty_items: true,
        }
    }
}

struct Observer {
    path: String,
    ticket: u64,
    handler: ChangeHandler,
}

/// Directory listing cache with dirty marks and change observers.
///
/// Snapshots are keyed by absolute directory path with a trailing slash and
/// age out after sixty seconds. Locally initiated mutations are committed
/// without refetching and flag the directory so that whole-listing queries
/// go back to the server, while point lookups keep serving the locally
/// committed state. Observers are notified synchronously on the committing
/// thread, outside the directory lock.
pub struct ListingCache {
    ttl: Duration,
    dirs: Mutex<HashMap<String, Snapshot>>,
    observers: Mutex<Vec<Observer>>,
}

impl Default for ListingCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingCache {
    pub fn new() -> Self {
        Self::with_ttl(LISTING_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            dirs: Mutex::new(HashMap::new()),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Replaces the snapshot at `path` with freshly fetched `items`.
    ///
    /// Items are sorted by filename, all dirty marks are cleared and
    /// observers of `path` are notified.
    pub fn commit_listing(&self, path: &str, mut items: Vec<DavEntry>) {
        let path = ensure_trailing_slash(path);
        items.sort_by(|a, b| a.name.cmp(&b.name));

        {
            let mut dirs = self.dirs.lock().unwrap();
            let count = items.len();
            dirs.insert(
                path.clone(),
                Snapshot {
                    fetched_at: Instant::now(),
                    items,
                    dirty_marks: vec![false; count],
                    has_dirty_items: false,
                },
            );
        }
        trace!(path = %path, "committed listing");

        self.notify(&path);
    }

    /// Returns the cached items for `path`, or `None` when the snapshot is
    /// missing, outdated or carries locally committed mutations.
    pub fn listing(&self, path: &str) -> Option<Vec<DavEntry>> {
        let path = ensure_trailing_slash(path);
        let dirs = self.dirs.lock().unwrap();
        let snapshot = dirs.get(&path)?;
        if snapshot.has_dirty_items || self.is_outdated(snapshot) {
            return None;
        }
        Some(snapshot.items.clone())
    }

    pub fn discard_listing(&self, path: &str) {
        let path = ensure_trailing_slash(path);
        self.dirs.lock().unwrap().remove(&path);
    }

    /// Point lookup of a single entry by its full path.
    pub fn item(&self, path: &str) -> ItemLookup {
        let (directory, filename) = split_path(path);
        if filename.is_empty() {
            return ItemLookup::Nonexistent;
        }

        let dirs = self.dirs.lock().unwrap();
        let Some(snapshot) = dirs.get(&directory) else {
            return ItemLookup::Unknown;
        };
        if self.is_outdated(snapshot) {
            return ItemLookup::Unknown;
        }
        match snapshot
            .items
            .binary_search_by(|e| e.name.as_str().cmp(&filename))
        {
            Ok(index) if snapshot.dirty_marks[index] => ItemLookup::Unknown,
            Ok(index) => ItemLookup::Found(snapshot.items[index].clone()),
            Err(_) => ItemLookup::Nonexistent,
        }
    }

    /// Records a locally created directory at `path`.
    pub fn commit_mkdir(&self, path: &str) {
        self.upsert(path, true, None);
    }

    /// Records a locally created regular file at `path`.
    pub fn commit_mkfile(&self, path: &str, size: Option<u64>) {
        self.upsert(path, false, size);
    }

    /// Records a local removal of the entry at `path`.
    pub fn commit_unlink(&self, path: &str) {
        let (directory, filename) = split_path(path);
        if filename.is_empty() {
            return;
        }

        {
            let mut dirs = self.dirs.lock().unwrap();
            let Some(snapshot) = dirs.get_mut(&directory) else {
                return;
            };
            if let Ok(index) = snapshot
                .items
                .binary_search_by(|e| e.name.as_str().cmp(&filename))
            {
                snapshot.items.remove(index);
                snapshot.dirty_marks.remove(index);
            }
            snapshot.has_dirty_items = true;
        }

        self.notify(&directory);
    }

    /// Records a local removal of the directory at `path`.
    pub fn commit_rmdir(&self, path: &str) {
        self.commit_unlink(path);
        self.discard_listing(path);
    }

    /// Records a local rename from `old_path` to `new_path`.
    ///
    /// If the old path named a cached directory its snapshot moves to the
    /// new key; the entry is then removed from the old parent and inserted,
    /// renamed, into the new parent.
    pub fn commit_move(&self, old_path: &str, new_path: &str) {
        {
            let mut dirs = self.dirs.lock().unwrap();
            if let Some(snapshot) = dirs.remove(&ensure_trailing_slash(old_path)) {
                dirs.insert(ensure_trailing_slash(new_path), snapshot);
            }
        }

        let (old_directory, old_filename) = split_path(old_path);
        if old_filename.is_empty() {
            return;
        }

        let mut moved: Option<DavEntry> = None;
        {
            let mut dirs = self.dirs.lock().unwrap();
            let Some(snapshot) = dirs.get_mut(&old_directory) else {
                return;
            };
            if let Ok(index) = snapshot
                .items
                .binary_search_by(|e| e.name.as_str().cmp(&old_filename))
            {
                moved = Some(snapshot.items.remove(index));
                snapshot.dirty_marks.remove(index);
            }
            snapshot.has_dirty_items = true;
        }
        self.notify(&old_directory);

        let (new_directory, new_filename) = split_path(new_path);
        if new_filename.is_empty() {
            return;
        }

        {
            let mut dirs = self.dirs.lock().unwrap();
            let Some(snapshot) = dirs.get_mut(&new_directory) else {
                return;
            };
            snapshot.has_dirty_items = true;
            if let Some(mut entry) = moved {
                entry.name = new_filename.clone();
                match snapshot
                    .items
                    .binary_search_by(|e| e.name.as_str().cmp(&new_filename))
                {
                    Ok(index) => {
                        snapshot.items[index] = entry;
                        snapshot.dirty_marks[index] = true;
                    }
                    Err(index) => {
                        snapshot.items.insert(index, entry);
                        snapshot.dirty_marks.insert(index, false);
                    }
                }
            }
        }
        self.notify(&new_directory);
    }

    /// Registers `handler` to run whenever the directory at `path` changes.
    /// Returns a fresh non-zero ticket.
    pub fn observe(&self, path: &str, handler: ChangeHandler) -> u64 {
        let ticket = NEXT_TICKET.fetch_add(1, Ordering::Relaxed);
        self.observers.lock().unwrap().push(Observer {
            path: ensure_trailing_slash(path),
            ticket,
            handler,
        });
        ticket
    }

    /// Unregisters a ticket; 0 and unknown tickets are ignored.
    pub fn stop_observing(&self, ticket: u64) {
        if ticket == 0 {
            return;
        }
        let mut observers = self.observers.lock().unwrap();
        if let Some(at) = observers.iter().position(|o| o.ticket == ticket) {
            observers.remove(at);
        }
    }

    fn is_outdated(&self, snapshot: &Snapshot) -> bool {
        snapshot.fetched_at.elapsed() > self.ttl
    }

    // Inserts or replaces an entry under its parent without refetching.
    // A replaced entry is marked dirty since its server-side properties are
    // no longer trustworthy; a fresh insert is authoritative until the next
    // full refresh. The parent snapshot is created on demand so that point
    // lookups can serve the mutation even on a cold cache.
    fn upsert(&self, path: &str, is_directory: bool, size: Option<u64>) {
        let (directory, filename) = split_path(path);
        if filename.is_empty() {
            return;
        }

        let entry = DavEntry {
            name: filename.clone(),
            size,
            created: None,
            modified: None,
            is_directory,
        };

        {
            let mut dirs = self.dirs.lock().unwrap();
            let snapshot = dirs
                .entry(directory.clone())
                .or_insert_with(Snapshot::empty_dirty);
            match snapshot
                .items
                .binary_search_by(|e| e.name.as_str().cmp(&filename))
            {
                Ok(index) => {
                    snapshot.items[index] = entry;
                    snapshot.dirty_marks[index] = true;
                }
                Err(index) => {
                    snapshot.items.insert(index, entry);
                    snapshot.dirty_marks.insert(index, false);
                }
            }
            snapshot.has_dirty_items = true;
        }

        self.notify(&directory);
    }

    // Handlers run on the committing thread after both locks are released,
    // so a handler may issue further cache calls.
    fn notify(&self, changed_dir_path: &str) {
        let handlers: Vec<ChangeHandler> = {
            let observers = self.observers.lock().unwrap();
            observers
                .iter()
                .filter(|o| o.path == changed_dir_path)
                .map(|o| o.handler.clone())
                .collect()
        };
        for handler in handlers {
            handler();
        }
    }
}
