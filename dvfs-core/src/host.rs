//! Host and file traits

use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    CancelToken, DirEntry, DirectoryListing, ListingFlags, OpenFlags, StatFs, VfsResult, VfsStat,
};

/// Callback invoked when an observed directory changes
pub type ChangeHandler = Arc<dyn Fn() + Send + Sync>;

/// Optional capabilities a host may advertise
#[derive(Debug, Clone, Copy, Default)]
pub struct HostFeatures {
    /// `remove_directory` succeeds on non-empty directories
    pub non_empty_rmdir: bool,
}

/// How a file object supports reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadParadigm {
    NoRead,
    Sequential,
    Random,
}

/// How a file object supports writing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteParadigm {
    NoWrite,
    /// Total size declared once, then sequential append up to that size
    Upload,
    Random,
}

/// A filesystem backend.
///
/// The dispatch layer selects a host by its `tag` and talks to it through
/// this interface only. Implementations are safe to share across tasks; all
/// path arguments are absolute and start with "/".
#[async_trait]
pub trait VfsHost: Send + Sync {
    /// Stable identifier used to select this backend kind
    fn tag(&self) -> &'static str;

    /// The mount point as seen by the dispatcher
    fn junction(&self) -> &str;

    /// Human-readable junction, e.g. `scheme://user@host:port/base`
    fn verbose_junction(&self) -> &str;

    fn features(&self) -> HostFeatures {
        HostFeatures::default()
    }

    fn is_writable(&self) -> bool {
        false
    }

    fn is_case_sensitive(&self, _path: &str) -> bool {
        true
    }

    async fn fetch_directory_listing(
        &self,
        path: &str,
        flags: ListingFlags,
        cancel: &CancelToken,
    ) -> VfsResult<DirectoryListing>;

    /// Visits every direct child of `path`, never including "..". The
    /// handler returning `false` aborts the walk with a cancellation error.
    async fn iterate_directory_listing(
        &self,
        path: &str,
        handler: &mut (dyn for<'h> FnMut(&'h DirEntry) -> bool + Send),
    ) -> VfsResult<()>;

    async fn stat(&self, path: &str, cancel: &CancelToken) -> VfsResult<VfsStat>;

    async fn statfs(&self, path: &str, cancel: &CancelToken) -> VfsResult<StatFs>;

    async fn create_directory(&self, path: &str, cancel: &CancelToken) -> VfsResult<()>;

    async fn remove_directory(&self, path: &str, cancel: &CancelToken) -> VfsResult<()>;

    async fn unlink(&self, path: &str, cancel: &CancelToken) -> VfsResult<()>;

    async fn rename(&self, old_path: &str, new_path: &str, cancel: &CancelToken)
        -> VfsResult<()>;

    /// Constructs a detached file object; no traffic happens until `open`.
    fn create_file(&self, path: &str) -> VfsResult<Box<dyn VfsFile>>;

    /// Registers a change observer; returns a process-unique ticket (>= 1),
    /// or 0 when observation is not possible for `path`.
    fn observe_directory_changes(&self, path: &str, handler: ChangeHandler) -> u64;

    /// Unregisters a previously returned ticket; no-op for 0 or unknown.
    fn stop_observing(&self, ticket: u64);
}

/// A file produced by [`VfsHost::create_file`].
///
/// The object is constructed closed, opened with flags, driven through
/// transfers and closed again; dropping an open file closes it implicitly,
/// discarding any error.
#[async_trait]
pub trait VfsFile: Send {
    async fn open(&mut self, flags: OpenFlags, cancel: &CancelToken) -> VfsResult<()>;

    fn is_open(&self) -> bool;

    async fn close(&mut self) -> VfsResult<()>;

    /// Reads up to `buf.len()` bytes. Blocks until the data is available or
    /// the stream ends; a short read means end of file.
    async fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize>;

    /// Writes bytes, reporting how many were actually consumed.
    async fn write(&mut self, buf: &[u8]) -> VfsResult<usize>;

    /// Declares the total upload size; must be called exactly once before
    /// the first `write`.
    fn set_upload_size(&mut self, size: u64) -> VfsResult<()>;

    fn pos(&self) -> u64;

    fn size(&self) -> Option<u64>;

    fn eof(&self) -> bool;

    fn read_paradigm(&self) -> ReadParadigm;

    fn write_paradigm(&self) -> WriteParadigm;
}
