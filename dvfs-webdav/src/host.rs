//! WebDAV host facade

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tracing::debug;

use dvfs_cache::{DavEntry, ItemLookup, ListingCache};
use dvfs_core::path::{ensure_trailing_slash, split_path};
use dvfs_core::{
    CancelToken, ChangeHandler, DirEntry, DirectoryListing, EntryKind, HostFeatures,
    ListingBuilder, ListingEntry, ListingFlags, StatFs, VfsError, VfsFile, VfsHost, VfsResult,
    VfsStat,
};

use crate::config::{HostConfiguration, TAG};
use crate::connection::ProgressCheck;
use crate::file::WebDavFile;
use crate::pool::ConnectionPool;
use crate::requests::{
    request_dav_listing, request_delete, request_mkcol, request_move, request_server_options,
    request_space_quota, HttpRequests,
};

/// A remote WebDAV server exposed as a virtual filesystem.
///
/// Construction probes the server with `OPTIONS`; a transport failure at
/// that point is fatal. Listings and point lookups go through the listing
/// cache, which local mutations keep consistent without refetching.
pub struct WebDavHost {
    config: HostConfiguration,
    pool: ConnectionPool,
    cache: ListingCache,
    supported_requests: HttpRequests,
    weak_self: Weak<WebDavHost>,
}

impl std::fmt::Debug for WebDavHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebDavHost")
            .field("config", &self.config)
            .field("supported_requests", &self.supported_requests)
            .finish_non_exhaustive()
    }
}

impl WebDavHost {
    pub async fn connect(config: HostConfiguration) -> VfsResult<Arc<Self>> {
        let pool = ConnectionPool::new(config.clone())?;
        let supported_requests = {
            let mut connection = pool.get();
            request_server_options(&config, &mut connection).await?
        };
        debug!(server = %config.verbose_junction(), allow = %supported_requests, "probed webdav server");

        Ok(Arc::new_cyclic(|weak| Self {
            config,
            pool,
            cache: ListingCache::new(),
            supported_requests,
            weak_self: weak.clone(),
        }))
    }

    pub fn config(&self) -> &HostConfiguration {
        &self.config
    }

    /// The verb set the server advertised at construction. Diagnostic
    /// only; servers are known to misreport it.
    pub fn supported_requests(&self) -> HttpRequests {
        self.supported_requests
    }

    pub fn host(&self) -> &str {
        &self.config.server_url
    }

    pub fn base_path(&self) -> &str {
        &self.config.path
    }

    pub fn username(&self) -> &str {
        &self.config.user
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub(crate) fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub(crate) fn cache(&self) -> &ListingCache {
        &self.cache
    }

    async fn refresh_listing(&self, path: &str, cancel: &CancelToken) -> VfsResult<()> {
        debug_assert!(path.ends_with('/'));
        cancel.check()?;
        let items = {
            let mut connection = self.pool.get();
            connection.set_progress_check(progress_from(cancel));
            request_dav_listing(&self.config, &mut connection, path).await?
        };
        cancel.check()?;
        self.cache.commit_listing(path, items);
        Ok(())
    }

    async fn cached_or_refreshed_listing(
        &self,
        path: &str,
        cancel: &CancelToken,
    ) -> VfsResult<Vec<DavEntry>> {
        if let Some(items) = self.cache.listing(path) {
            return Ok(items);
        }
        self.refresh_listing(path, cancel).await?;
        self.cache
            .listing(path)
            .ok_or_else(|| VfsError::InvalidArgument(format!("no listing for {path}")))
    }
}

fn progress_from(cancel: &CancelToken) -> ProgressCheck {
    let token = cancel.clone();
    Arc::new(move || !token.is_cancelled())
}

fn is_valid_input_path(path: &str) -> bool {
    path.starts_with('/')
}

fn invalid_path(path: &str) -> VfsError {
    VfsError::InvalidArgument(format!("path must be absolute: {path:?}"))
}

fn entry_kind(entry: &DavEntry) -> EntryKind {
    if entry.is_directory {
        EntryKind::Directory
    } else {
        EntryKind::File
    }
}

fn entry_to_stat(entry: &DavEntry) -> VfsStat {
    let kind = entry_kind(entry);
    VfsStat {
        mode: kind.access_mode(),
        kind,
        size: entry.size,
        btime: entry.created,
        mtime: entry.modified,
        ctime: entry.modified,
    }
}

#[async_trait]
impl VfsHost for WebDavHost {
    fn tag(&self) -> &'static str {
        TAG
    }

    fn junction(&self) -> &str {
        &self.config.server_url
    }

    fn verbose_junction(&self) -> &str {
        self.config.verbose_junction()
    }

    fn features(&self) -> HostFeatures {
        // WebDAV DELETE on a collection is recursive
        HostFeatures {
            non_empty_rmdir: true,
        }
    }

    fn is_writable(&self) -> bool {
        true
    }

    fn is_case_sensitive(&self, _path: &str) -> bool {
        true
    }

    async fn fetch_directory_listing(
        &self,
        path: &str,
        flags: ListingFlags,
        cancel: &CancelToken,
    ) -> VfsResult<DirectoryListing> {
        if !is_valid_input_path(path) {
            return Err(invalid_path(path));
        }
        let path = ensure_trailing_slash(path);

        if flags.force_refresh {
            self.cache.discard_listing(&path);
        }

        let mut items = self.cached_or_refreshed_listing(&path, cancel).await?;

        if flags.no_dot_dot || path == "/" {
            items.retain(|item| item.name != "..");
        } else if let Some(at) = items.iter().position(|item| item.name == "..") {
            let dot_dot = items.remove(at);
            items.insert(0, dot_dot);
        } else {
            // a listing committed without the collection's own entry still
            // surfaces "..", sized as the directory content total
            let content_size = items.iter().filter_map(|item| item.size).sum();
            items.insert(
                0,
                DavEntry::directory("..").with_size(content_size),
            );
        }

        let mut builder = ListingBuilder::new(path);
        for item in items {
            let kind = entry_kind(&item);
            builder.push(ListingEntry {
                name: item.name,
                mode: kind.access_mode(),
                kind,
                size: item.size.unwrap_or(0),
                btime: item.created,
                mtime: item.modified,
                ctime: item.modified,
            });
        }
        Ok(builder.build())
    }

    async fn iterate_directory_listing(
        &self,
        path: &str,
        handler: &mut (dyn for<'h> FnMut(&'h DirEntry) -> bool + Send),
    ) -> VfsResult<()> {
        if !is_valid_input_path(path) {
            return Err(invalid_path(path));
        }
        let path = ensure_trailing_slash(path);

        let mut items = self
            .cached_or_refreshed_listing(&path, &CancelToken::none())
            .await?;
        items.retain(|item| item.name != "..");

        for item in items {
            let entry = DirEntry {
                name: item.name.clone(),
                kind: entry_kind(&item),
            };
            if !handler(&entry) {
                return Err(VfsError::Cancelled);
            }
        }
        Ok(())
    }

    async fn stat(&self, path: &str, cancel: &CancelToken) -> VfsResult<VfsStat> {
        if !is_valid_input_path(path) {
            return Err(invalid_path(path));
        }

        match self.cache.item(path) {
            ItemLookup::Found(entry) => Ok(entry_to_stat(&entry)),
            ItemLookup::Nonexistent => Err(VfsError::NotFound(path.to_string())),
            ItemLookup::Unknown => {
                let (directory, _) = split_path(path);
                self.refresh_listing(&directory, cancel).await?;
                match self.cache.item(path) {
                    ItemLookup::Found(entry) => Ok(entry_to_stat(&entry)),
                    _ => Err(VfsError::NotFound(path.to_string())),
                }
            }
        }
    }

    async fn statfs(&self, _path: &str, cancel: &CancelToken) -> VfsResult<StatFs> {
        cancel.check()?;
        let (free, used) = {
            let mut connection = self.pool.get();
            connection.set_progress_check(progress_from(cancel));
            request_space_quota(&self.config, &mut connection).await?
        };
        cancel.check()?;

        Ok(StatFs {
            volume_name: self.config.full_url().to_string(),
            total_bytes: free.zip(used).map(|(f, u)| f + u),
            free_bytes: free,
            avail_bytes: free,
        })
    }

    async fn create_directory(&self, path: &str, cancel: &CancelToken) -> VfsResult<()> {
        if !is_valid_input_path(path) {
            return Err(invalid_path(path));
        }
        let path = ensure_trailing_slash(path);

        cancel.check()?;
        {
            let mut connection = self.pool.get();
            connection.set_progress_check(progress_from(cancel));
            request_mkcol(&self.config, &mut connection, &path).await?;
        }
        cancel.check()?;

        self.cache.commit_mkdir(&path);
        Ok(())
    }

    async fn remove_directory(&self, path: &str, cancel: &CancelToken) -> VfsResult<()> {
        if !is_valid_input_path(path) {
            return Err(invalid_path(path));
        }
        let path = ensure_trailing_slash(path);

        cancel.check()?;
        {
            let mut connection = self.pool.get();
            connection.set_progress_check(progress_from(cancel));
            request_delete(&self.config, &mut connection, &path).await?;
        }
        cancel.check()?;

        self.cache.commit_rmdir(&path);
        Ok(())
    }

    async fn unlink(&self, path: &str, cancel: &CancelToken) -> VfsResult<()> {
        if !is_valid_input_path(path) {
            return Err(invalid_path(path));
        }

        cancel.check()?;
        {
            let mut connection = self.pool.get();
            connection.set_progress_check(progress_from(cancel));
            request_delete(&self.config, &mut connection, path).await?;
        }
        cancel.check()?;

        self.cache.commit_unlink(path);
        Ok(())
    }

    async fn rename(
        &self,
        old_path: &str,
        new_path: &str,
        cancel: &CancelToken,
    ) -> VfsResult<()> {
        if !is_valid_input_path(old_path) || !is_valid_input_path(new_path) {
            return Err(invalid_path(old_path));
        }

        let stat = self.stat(old_path, cancel).await?;

        // collections are denoted with a trailing slash in MOVE requests
        let (src, dst) = if stat.is_directory() {
            (
                ensure_trailing_slash(old_path),
                ensure_trailing_slash(new_path),
            )
        } else {
            (old_path.to_string(), new_path.to_string())
        };

        cancel.check()?;
        {
            let mut connection = self.pool.get();
            connection.set_progress_check(progress_from(cancel));
            request_move(&self.config, &mut connection, &src, &dst).await?;
        }
        cancel.check()?;

        self.cache.commit_move(old_path, new_path);
        Ok(())
    }

    fn create_file(&self, path: &str) -> VfsResult<Box<dyn VfsFile>> {
        if !is_valid_input_path(path) {
            return Err(invalid_path(path));
        }
        let host = self
            .weak_self
            .upgrade()
            .ok_or_else(|| VfsError::Io("host is shutting down".to_string()))?;
        Ok(Box::new(WebDavFile::new(host, path)))
    }

    fn observe_directory_changes(&self, path: &str, handler: ChangeHandler) -> u64 {
        if !is_valid_input_path(path) {
            return 0;
        }
        self.cache.observe(path, handler)
    }

    fn stop_observing(&self, ticket: u64) {
        self.cache.stop_observing(ticket);
    }
}
