//! WebDAV storage backend
//!
//! Exposes a remote WebDAV server as a virtual filesystem: directory
//! listings, stat, sequential file reads, upload-style writes, directory
//! creation and removal, unlink, rename and directory-change observation.
//! Compatible with NextCloud, ownCloud, Apache mod_dav and similar servers.

mod buffer;
mod config;
mod connection;
mod dates;
mod errors;
mod file;
mod host;
mod path;
mod pool;
mod requests;
mod xml;

pub use buffer::{ReadBuffer, WriteBuffer};
pub use config::{HostConfiguration, TAG};
pub use connection::{Connection, ProgressCheck, RequestBodyGuard};
pub use file::WebDavFile;
pub use host::WebDavHost;
pub use pool::{ConnectionPool, PooledConnection};
pub use requests::HttpRequests;
