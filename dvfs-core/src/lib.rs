//! dvfs core
//!
//! Traits and types shared by every virtual-filesystem backend: the error
//! taxonomy, cancellation token, operation flags, listing/stat containers
//! and the `VfsHost`/`VfsFile` interface.

pub mod cancel;
pub mod error;
pub mod flags;
pub mod host;
pub mod listing;
pub mod path;
pub mod stat;

pub use cancel::CancelToken;
pub use error::{VfsError, VfsResult};
pub use flags::{ListingFlags, OpenFlags};
pub use host::{ChangeHandler, HostFeatures, ReadParadigm, VfsFile, VfsHost, WriteParadigm};
pub use listing::{
    DirEntry, DirectoryListing, EntryKind, ListingBuilder, ListingEntry, DIRECTORY_ACCESS_MODE,
    REGULAR_FILE_ACCESS_MODE,
};
pub use stat::{StatFs, VfsStat};
