//! WebDAV request layer
//!
//! Stateless functions over `(HostConfiguration, Connection)`: each builds
//! a request on the given connection, performs it blocking, parses the
//! response and maps failures onto the error taxonomy.

use bitflags::bitflags;
use reqwest::header::{HeaderMap, ALLOW};
use std::fmt;

use dvfs_cache::DavEntry;
use dvfs_core::{VfsError, VfsResult};

use crate::config::HostConfiguration;
use crate::connection::Connection;
use crate::errors::{is_ok_http, status_error};
use crate::path::uri_for_path;
use crate::xml::{parse_multistatus, parse_space_quota};

bitflags! {
    /// Verbs a server reports in its `Allow:` response header
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HttpRequests: u16 {
        const GET = 0x0001;
        const HEAD = 0x0002;
        const POST = 0x0004;
        const PUT = 0x0008;
        const DELETE = 0x0010;
        const CONNECT = 0x0020;
        const OPTIONS = 0x0040;
        const TRACE = 0x0080;
        const COPY = 0x0100;
        const LOCK = 0x0200;
        const UNLOCK = 0x0400;
        const MKCOL = 0x0800;
        const MOVE = 0x1000;
        const PROPFIND = 0x2000;
        const PROPPATCH = 0x4000;
    }
}

impl HttpRequests {
    /// The least a server must support to be of any use. Not enforced at
    /// construction; heterogeneous servers are known to misreport their
    /// verb set.
    pub fn minimal_required() -> Self {
        Self::GET | Self::PROPFIND | Self::PROPPATCH
    }
}

impl fmt::Display for HttpRequests {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter_names().map(|(name, _)| name).collect();
        write!(f, "{}", names.join(" "))
    }
}

const PROPFIND_LISTING_BODY: &str = "<?xml version=\"1.0\"?>\
<a:propfind xmlns:a=\"DAV:\">\
<a:prop>\
<a:resourcetype/>\
<a:getcontentlength/>\
<a:getlastmodified/>\
<a:creationdate/>\
</a:prop>\
</a:propfind>";

const PROPFIND_QUOTA_BODY: &str = "<?xml version=\"1.0\"?>\
<a:propfind xmlns:a=\"DAV:\">\
<a:prop>\
<a:quota-available-bytes/>\
<a:quota-used-bytes/>\
</a:prop>\
</a:propfind>";

/// Probes the server with `OPTIONS` and reports the advertised verb set.
pub async fn request_server_options(
    config: &HostConfiguration,
    connection: &mut Connection,
) -> VfsResult<HttpRequests> {
    connection.set_custom_request("OPTIONS");
    connection.set_url(config.full_url());

    let status = connection.perform_blocking_request().await?;
    if is_ok_http(status) {
        Ok(parse_allow_header(connection.response_headers()))
    } else {
        Err(status_error(status))
    }
}

/// Fetches a depth-1 PROPFIND listing of the collection at `path`.
///
/// `path` must carry a trailing slash. Entries come back relative to the
/// collection, with the collection itself renamed to "..".
pub async fn request_dav_listing(
    config: &HostConfiguration,
    connection: &mut Connection,
    path: &str,
) -> VfsResult<Vec<DavEntry>> {
    if !path.ends_with('/') {
        return Err(VfsError::InvalidArgument(format!(
            "listing path must end with a slash: {path}"
        )));
    }

    connection.set_custom_request("PROPFIND");
    connection.set_header(&[
        ("Depth", "1"),
        ("translate", "f"),
        ("Content-Type", "application/xml; charset=\"utf-8\""),
    ]);
    connection.set_url(&uri_for_path(config, path));
    connection.set_body(PROPFIND_LISTING_BODY.as_bytes());

    let status = connection.perform_blocking_request().await?;
    if !is_ok_http(status) {
        return Err(status_error(status));
    }

    let response = connection.response_body().read_all_as_string();
    let items = parse_multistatus(&response)?;
    let base_path = if config.path.is_empty() {
        path.to_string()
    } else {
        format!("/{}{}", config.path, path)
    };
    Ok(prune_filepaths(items, &base_path))
}

/// Asks for the quota on the base collection; `(free, used)`.
pub async fn request_space_quota(
    config: &HostConfiguration,
    connection: &mut Connection,
) -> VfsResult<(Option<u64>, Option<u64>)> {
    connection.set_custom_request("PROPFIND");
    connection.set_header(&[
        ("Depth", "0"),
        ("Content-Type", "application/xml; charset=\"utf-8\""),
    ]);
    connection.set_url(config.full_url());
    connection.set_body(PROPFIND_QUOTA_BODY.as_bytes());

    let status = connection.perform_blocking_request().await?;
    if !is_ok_http(status) {
        return Err(status_error(status));
    }

    let response = connection.response_body().read_all_as_string();
    Ok(parse_space_quota(&response))
}

/// Creates the collection at `path` (which must end with a slash).
pub async fn request_mkcol(
    config: &HostConfiguration,
    connection: &mut Connection,
    path: &str,
) -> VfsResult<()> {
    if !path.ends_with('/') {
        return Err(VfsError::InvalidArgument(format!(
            "collection path must end with a slash: {path}"
        )));
    }

    connection.set_custom_request("MKCOL");
    connection.set_url(&uri_for_path(config, path));

    let status = connection.perform_blocking_request().await?;
    if is_ok_http(status) {
        Ok(())
    } else {
        Err(status_error(status))
    }
}

/// Deletes the entity at `path`. Deleting "/" is refused locally.
pub async fn request_delete(
    config: &HostConfiguration,
    connection: &mut Connection,
    path: &str,
) -> VfsResult<()> {
    if path == "/" {
        return Err(VfsError::Permission(
            "refusing to delete the root collection".to_string(),
        ));
    }

    connection.set_custom_request("DELETE");
    connection.set_url(&uri_for_path(config, path));

    let status = connection.perform_blocking_request().await?;
    if is_ok_http(status) {
        Ok(())
    } else {
        Err(status_error(status))
    }
}

/// Moves `src` to `dst` server-side via the `Destination:` header.
pub async fn request_move(
    config: &HostConfiguration,
    connection: &mut Connection,
    src: &str,
    dst: &str,
) -> VfsResult<()> {
    if src == "/" {
        return Err(VfsError::Permission(
            "refusing to move the root collection".to_string(),
        ));
    }

    let destination = uri_for_path(config, dst);
    connection.set_custom_request("MOVE");
    connection.set_header(&[("Destination", destination.as_str())]);
    connection.set_url(&uri_for_path(config, src));

    let status = connection.perform_blocking_request().await?;
    if is_ok_http(status) {
        Ok(())
    } else {
        Err(status_error(status))
    }
}

fn parse_allow_header(headers: &HeaderMap) -> HttpRequests {
    let mut mask = HttpRequests::empty();
    for value in headers.get_all(ALLOW) {
        let Ok(list) = value.to_str() else { continue };
        for verb in list.split(',') {
            mask |= match verb.trim().to_ascii_uppercase().as_str() {
                "GET" => HttpRequests::GET,
                "HEAD" => HttpRequests::HEAD,
                "POST" => HttpRequests::POST,
                "PUT" => HttpRequests::PUT,
                "DELETE" => HttpRequests::DELETE,
                "CONNECT" => HttpRequests::CONNECT,
                "OPTIONS" => HttpRequests::OPTIONS,
                "TRACE" => HttpRequests::TRACE,
                "COPY" => HttpRequests::COPY,
                "LOCK" => HttpRequests::LOCK,
                "UNLOCK" => HttpRequests::UNLOCK,
                "MKCOL" => HttpRequests::MKCOL,
                "MOVE" => HttpRequests::MOVE,
                "PROPFIND" => HttpRequests::PROPFIND,
                "PROPPATCH" => HttpRequests::PROPPATCH,
                _ => HttpRequests::empty(),
            };
        }
    }
    mask
}

// Rebases raw hrefs against the requested collection: entries outside the
// base are dropped, the collection itself becomes "..", directory hrefs
// lose their trailing slash, and a non-directory with a trailing slash is
// nonsense the server made up.
fn prune_filepaths(items: Vec<DavEntry>, base_path: &str) -> Vec<DavEntry> {
    debug_assert!(base_path.starts_with('/') && base_path.ends_with('/'));
    items
        .into_iter()
        .filter_map(|mut item| {
            let mut name = item.name.strip_prefix(base_path)?.to_string();
            if name.is_empty() {
                name = "..".to_string();
            } else if name.ends_with('/') {
                if !item.is_directory {
                    return None;
                }
                name.pop();
            }
            item.name = name;
            Some(item)
        })
        .collect()
}
