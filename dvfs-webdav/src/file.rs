//! WebDAV file object
//!
//! Reads are sequential over a streaming GET; writes are upload-style: the
//! caller declares the total size once, appends bytes up to it and closes.
//! The file borrows one connection from the host's pool for its whole open
//! lifetime and returns it on close.

use std::sync::Arc;

use async_trait::async_trait;

use dvfs_core::{
    CancelToken, OpenFlags, ReadParadigm, VfsError, VfsFile, VfsHost, VfsResult, WriteParadigm,
};

use crate::connection::Connection;
use crate::host::WebDavHost;
use crate::path::uri_for_path;

pub struct WebDavFile {
    host: Arc<WebDavHost>,
    path: String,
    open_flags: Option<OpenFlags>,
    pos: u64,
    size: Option<u64>,
    connection: Option<Connection>,
}

impl WebDavFile {
    pub(crate) fn new(host: Arc<WebDavHost>, path: &str) -> Self {
        Self {
            host,
            path: path.to_string(),
            open_flags: None,
            pos: 0,
            size: None,
            connection: None,
        }
    }

    fn spawn_download_connection(&mut self) {
        if self.connection.is_some() {
            return;
        }
        let mut connection = self.host.pool().get_raw();
        connection.set_url(&uri_for_path(self.host.config(), &self.path));
        connection.set_custom_request("GET");
        connection.make_non_blocking();
        self.connection = Some(connection);
    }

    fn spawn_upload_connection(&mut self, total: u64) {
        if self.connection.is_some() {
            return;
        }
        let mut connection = self.host.pool().get_raw();
        connection.set_url(&uri_for_path(self.host.config(), &self.path));
        connection.set_non_blocking_upload(total);
        connection.make_non_blocking();
        self.connection = Some(connection);
    }

    fn mode(&self) -> OpenFlags {
        self.open_flags.unwrap_or_default()
    }
}

#[async_trait]
impl VfsFile for WebDavFile {
    async fn open(&mut self, flags: OpenFlags, cancel: &CancelToken) -> VfsResult<()> {
        if flags.append {
            return Err(VfsError::Permission(
                "append is not supported on WebDAV".to_string(),
            ));
        }
        if flags.read && flags.write {
            return Err(VfsError::Permission(
                "simultaneous read and write is not supported".to_string(),
            ));
        }

        if flags.read {
            let stat = self.host.stat(&self.path, cancel).await?;
            if stat.is_directory() {
                return Err(VfsError::Permission(format!(
                    "not a regular file: {}",
                    self.path
                )));
            }
            self.size = Some(stat.size.unwrap_or(0));
            self.pos = 0;
            self.open_flags = Some(flags);
            return Ok(());
        }

        if flags.write {
            let stat = self.host.stat(&self.path, cancel).await;

            match stat {
                Ok(existing) => {
                    if flags.no_overwrite {
                        return Err(VfsError::Exists(self.path.clone()));
                    }
                    if existing.is_directory() {
                        return Err(VfsError::IsDirectory(self.path.clone()));
                    }
                    // PUT would overwrite in place, but the cache needs a
                    // clean slot, so clear the old entry first
                    self.host.unlink(&self.path, cancel).await?;
                }
                Err(_) => {
                    if !flags.create {
                        return Err(VfsError::NotFound(self.path.clone()));
                    }
                }
            }

            self.size = None;
            self.pos = 0;
            self.open_flags = Some(flags);
            return Ok(());
        }

        Err(VfsError::InvalidArgument(
            "open flags must select read or write".to_string(),
        ))
    }

    fn is_open(&self) -> bool {
        self.open_flags.is_some()
    }

    async fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        if !self.is_open() || !self.mode().read {
            return Err(VfsError::InvalidArgument(
                "file is not open for reading".to_string(),
            ));
        }
        if buf.is_empty() || self.eof() {
            return Ok(0);
        }

        self.spawn_download_connection();
        let Some(connection) = self.connection.as_mut() else {
            return Err(VfsError::Io("no connection for read".to_string()));
        };

        connection.read_body_up_to(buf.len()).await?;
        let has_read = connection.response_body().read(buf);
        self.pos += has_read as u64;
        Ok(has_read)
    }

    async fn write(&mut self, buf: &[u8]) -> VfsResult<usize> {
        if !self.is_open() || !self.mode().write {
            return Err(VfsError::InvalidArgument(
                "file is not open for writing".to_string(),
            ));
        }
        let Some(total) = self.size else {
            return Err(VfsError::InvalidArgument(
                "upload size was not declared".to_string(),
            ));
        };

        self.spawn_upload_connection(total);
        let Some(connection) = self.connection.as_mut() else {
            return Err(VfsError::Io("no connection for write".to_string()));
        };

        connection.request_body().append(buf);
        connection.write_body_up_to(buf.len()).await?;

        let remaining = connection.request_body().size();
        let has_written = buf.len() - remaining;
        connection.request_body().discard(remaining);
        self.pos += has_written as u64;
        Ok(has_written)
    }

    fn set_upload_size(&mut self, size: u64) -> VfsResult<()> {
        if !self.is_open() || self.size.is_some() {
            return Err(VfsError::InvalidArgument(
                "upload size may be declared once on an open file".to_string(),
            ));
        }
        self.size = Some(size);
        Ok(())
    }

    async fn close(&mut self) -> VfsResult<()> {
        if !self.is_open() {
            return Err(VfsError::InvalidArgument("file is not open".to_string()));
        }

        let flags = self.mode();
        let mut result = Ok(());

        if flags.read {
            if let Some(mut connection) = self.connection.take() {
                connection.abort_body_read();
                self.host.pool().put_back(connection);
            }
        } else if flags.write {
            if let Some(size) = self.size {
                if self.connection.is_none() {
                    // force a connection to appear so zero-byte uploads
                    // still travel
                    let _ = self.write(&[]).await;
                }
                if let Some(mut connection) = self.connection.take() {
                    if self.pos < size {
                        result = connection.abort_body_write().await;
                    } else {
                        result = connection.conclude_body_write().await;
                        if result.is_ok() {
                            self.host.cache().commit_mkfile(&self.path, Some(size));
                        }
                    }
                    self.host.pool().put_back(connection);
                }
            }
        }

        self.open_flags = None;
        self.pos = 0;
        self.size = None;
        result
    }

    fn pos(&self) -> u64 {
        self.pos
    }

    fn size(&self) -> Option<u64> {
        self.size
    }

    fn eof(&self) -> bool {
        if !self.is_open() {
            return true;
        }
        self.size == Some(self.pos)
    }

    fn read_paradigm(&self) -> ReadParadigm {
        ReadParadigm::Sequential
    }

    fn write_paradigm(&self) -> WriteParadigm {
        WriteParadigm::Upload
    }
}

impl Drop for WebDavFile {
    // An open file dropped without close is torn down hard: the connection
    // aborts any transfer while being cleared and goes back to the pool.
    fn drop(&mut self) {
        if self.open_flags.is_some() {
            if let Some(mut connection) = self.connection.take() {
                connection.clear();
                self.host.pool().put_back(connection);
            }
        }
    }
}
