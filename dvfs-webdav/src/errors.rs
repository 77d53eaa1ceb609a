//! Protocol and transport error mapping

use dvfs_core::VfsError;

pub(crate) fn is_ok_http(code: u16) -> bool {
    (200..300).contains(&code)
}

/// Maps an HTTP status onto the error taxonomy; `None` for success codes.
pub(crate) fn http_error(code: u16) -> Option<VfsError> {
    if is_ok_http(code) {
        return None;
    }
    let detail = format!("HTTP {code}");
    Some(match code {
        400 => VfsError::InvalidArgument(detail),
        401 | 402 => VfsError::Authentication(detail),
        403 => VfsError::Permission(detail),
        404 | 410 => VfsError::NotFound(detail),
        405 => VfsError::NoSuchDevice(detail),
        408 => VfsError::Timeout(detail),
        409 | 411 | 412 | 415..=417 | 422 | 424 | 428 => VfsError::InvalidArgument(detail),
        413 => VfsError::Overflow(detail),
        414 | 431 => VfsError::NameTooLong(detail),
        421 => VfsError::ConnectionAborted(detail),
        423 => VfsError::Permission(format!("{detail} (locked)")),
        429 => VfsError::TooManyOpen(detail),
        507 => VfsError::QuotaExceeded(detail),
        508 => VfsError::LoopDetected(detail),
        _ => VfsError::Io(detail),
    })
}

/// Maps a non-success HTTP status onto the taxonomy, falling back to the
/// generic I/O category.
pub(crate) fn status_error(code: u16) -> VfsError {
    http_error(code).unwrap_or_else(|| VfsError::Io(format!("HTTP {code}")))
}

/// Maps a transport failure onto the error taxonomy.
pub(crate) fn transport_error(err: reqwest::Error) -> VfsError {
    let detail = error_chain(&err);
    let lowered = detail.to_lowercase();

    if err.is_timeout() {
        return VfsError::Timeout(detail);
    }
    if lowered.contains("certificate")
        || lowered.contains("tls")
        || lowered.contains("ssl")
        || lowered.contains("handshake")
    {
        return VfsError::Tls(detail);
    }
    if err.is_connect() {
        if lowered.contains("dns") || lowered.contains("lookup") || lowered.contains("resolve") {
            return VfsError::Unreachable(detail);
        }
        if lowered.contains("refused") {
            return VfsError::AddressNotAvailable(detail);
        }
        return VfsError::Unreachable(detail);
    }
    VfsError::Io(detail)
}

// Flattens the source chain, which is where hyper hides the interesting part.
fn error_chain(err: &reqwest::Error) -> String {
    let mut detail = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        detail.push_str(": ");
        detail.push_str(&inner.to_string());
        source = inner.source();
    }
    detail
}
