//! URL construction and escaping

use crate::config::HostConfiguration;

/// Percent-encodes every segment of an absolute path, keeping the slashes.
pub(crate) fn uri_escape(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

pub(crate) fn uri_unescape(escaped: &str) -> String {
    urlencoding::decode(escaped)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| escaped.to_string())
}

/// Builds the absolute URL for `path` under the host's base.
pub(crate) fn uri_for_path(config: &HostConfiguration, path: &str) -> String {
    debug_assert!(path.starts_with('/'));
    format!(
        "{}{}",
        config.full_url().trim_end_matches('/'),
        uri_escape(path)
    )
}
