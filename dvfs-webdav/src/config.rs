//! WebDAV host configuration

use serde::{Deserialize, Serialize};

/// Tag by which the dispatch layer selects this backend
pub const TAG: &str = "net_webdav";

pub(crate) const USER_AGENT: &str = concat!("dvfs/", env!("CARGO_PKG_VERSION"));

/// Immutable configuration of one WebDAV host.
///
/// Two hosts address the same filesystem iff their persisted fields compare
/// equal; the display string and the full base URL are derived caches and
/// do not participate in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "PersistedConfiguration", into = "PersistedConfiguration")]
pub struct HostConfiguration {
    pub server_url: String,
    pub user: String,
    pub passwd: String,
    /// Base path on the server, without surrounding slashes
    pub path: String,
    pub https: bool,
    pub port: u16,
    verbose: String,
    full_url: String,
}

impl HostConfiguration {
    /// Builds a configuration, deriving the display string and the full
    /// base URL. A missing `port` defaults to 80 or 443 by scheme.
    pub fn new(
        server_url: impl Into<String>,
        user: impl Into<String>,
        passwd: impl Into<String>,
        path: impl Into<String>,
        https: bool,
        port: Option<u16>,
    ) -> Self {
        let server_url = server_url.into();
        let user = user.into();
        let passwd = passwd.into();
        let path = path.into().trim_matches('/').to_string();
        let port = port.unwrap_or(if https { 443 } else { 80 });
        let default_port = port == if https { 443 } else { 80 };

        let scheme = if https { "https://" } else { "http://" };
        let port_suffix = if default_port {
            String::new()
        } else {
            format!(":{port}")
        };

        let verbose = format!(
            "{scheme}{}{}{server_url}{port_suffix}{}",
            user,
            if user.is_empty() { "" } else { "@" },
            if path.is_empty() {
                String::new()
            } else {
                format!("/{path}")
            },
        );
        let full_url = format!(
            "{scheme}{server_url}{port_suffix}/{}",
            if path.is_empty() {
                String::new()
            } else {
                format!("{path}/")
            },
        );

        Self {
            server_url,
            user,
            passwd,
            path,
            https,
            port,
            verbose,
            full_url,
        }
    }

    /// `scheme://[user@]host[:port][/base]`
    pub fn verbose_junction(&self) -> &str {
        &self.verbose
    }

    /// `scheme://host[:port]/[base/]`, always with a trailing slash
    pub fn full_url(&self) -> &str {
        &self.full_url
    }
}

impl PartialEq for HostConfiguration {
    fn eq(&self, other: &Self) -> bool {
        self.server_url == other.server_url
            && self.user == other.user
            && self.passwd == other.passwd
            && self.path == other.path
            && self.https == other.https
            && self.port == other.port
    }
}

impl Eq for HostConfiguration {}

/// Persisted form of the configuration, tag `"net_webdav"`
#[derive(Serialize, Deserialize)]
struct PersistedConfiguration {
    server_url: String,
    user: String,
    passwd: String,
    path: String,
    https: bool,
    port: u16,
}

impl From<PersistedConfiguration> for HostConfiguration {
    fn from(p: PersistedConfiguration) -> Self {
        Self::new(p.server_url, p.user, p.passwd, p.path, p.https, Some(p.port))
    }
}

impl From<HostConfiguration> for PersistedConfiguration {
    fn from(c: HostConfiguration) -> Self {
        Self {
            server_url: c.server_url,
            user: c.user,
            passwd: c.passwd,
            path: c.path,
            https: c.https,
            port: c.port,
        }
    }
}
