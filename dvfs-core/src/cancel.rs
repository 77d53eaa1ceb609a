//! Cooperative cancellation

use crate::error::{VfsError, VfsResult};
use std::fmt;
use std::sync::Arc;

/// Cancellation checker handed into every host operation.
///
/// The wrapped closure is polled before a network call is issued and by the
/// transport's progress hook while a transfer is in flight. A token built
/// with [`CancelToken::none`] never cancels.
#[derive(Clone, Default)]
pub struct CancelToken(Option<Arc<dyn Fn() -> bool + Send + Sync>>);

impl CancelToken {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn new(checker: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self(Some(Arc::new(checker)))
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.as_ref().map(|checker| checker()).unwrap_or(false)
    }

    /// Returns `Err(VfsError::Cancelled)` if the checker has signalled.
    pub fn check(&self) -> VfsResult<()> {
        if self.is_cancelled() {
            Err(VfsError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CancelToken")
            .field(&self.0.as_ref().map(|_| "checker"))
            .finish()
    }
}
