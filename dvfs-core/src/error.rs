//! Error taxonomy shared by every backend

use thiserror::Error;

/// Result type alias
pub type VfsResult<T> = Result<T, VfsError>;

/// Main error type
///
/// Backends map protocol and transport failures onto these categories; the
/// payload carries human-readable context, including the numeric subcode
/// (HTTP status or transport code) where one exists.
#[derive(Error, Debug, Clone)]
pub enum VfsError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    Exists(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("is a directory: {0}")]
    IsDirectory(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("no such device: {0}")]
    NoSuchDevice(String),

    #[error("too many open resources: {0}")]
    TooManyOpen(String),

    #[error("value too large: {0}")]
    Overflow(String),

    #[error("name too long: {0}")]
    NameTooLong(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("loop detected: {0}")]
    LoopDetected(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("connection aborted: {0}")]
    ConnectionAborted(String),

    #[error("host unreachable: {0}")]
    Unreachable(String),

    #[error("address not available: {0}")]
    AddressNotAvailable(String),

    #[error("TLS failure: {0}")]
    Tls(String),

    #[error("cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(String),
}

impl VfsError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, VfsError::Cancelled)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, VfsError::NotFound(_))
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self, VfsError::Authentication(_))
    }
}
