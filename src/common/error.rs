//! Error types for pagetree.

use thiserror::Error;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors raised by the storage layer, buffer pool and index.
///
/// Structural events inside the B+ tree (overflow, underflow) are never
/// errors; they are repaired as part of the operation. A duplicate insert or
/// a delete of an absent key is reported through the operation's `bool`
/// return value, not through this type.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist on disk.
    #[error("Page {0} not found")]
    PageNotFound(u32),

    /// Buffer pool has no free frames and cannot evict any pages.
    ///
    /// This happens when all frames are pinned.
    #[error("No free frames available in buffer pool")]
    NoFreeFrames,

    /// The disk manager reached its configured page limit.
    #[error("Storage exhausted: page limit of {0} reached")]
    StorageExhausted(u32),

    /// The provided page ID is invalid (e.g. the sentinel value).
    #[error("Invalid page ID: {0}")]
    InvalidPageId(u32),

    /// Attempted to delete a page that is still referenced by a guard.
    #[error("Page {0} is still pinned")]
    PagePinned(u32),

    /// The page read from disk does not match its stored checksum.
    #[error("Checksum mismatch on page {0}")]
    ChecksumMismatch(u32),

    /// A page was expected to hold a specific node kind but holds another.
    #[error("Page {page_id} is not a {expected} page")]
    UnexpectedPageType {
        page_id: u32,
        expected: &'static str,
    },

    /// Index configuration rejected by validation.
    #[error("Invalid index configuration: {0}")]
    InvalidConfig(String),

    /// A structural invariant of the B+ tree does not hold.
    #[error("B+ tree invariant violated: {0}")]
    Corrupted(String),
}

impl Error {
    /// True for failures caused by running out of frames or pages.
    ///
    /// Allocation failures during an insert are reported before any node is
    /// modified, so the tree stays consistent and the caller may retry.
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, Error::NoFreeFrames | Error::StorageExhausted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PageNotFound(42);
        assert_eq!(format!("{}", err), "Page 42 not found");

        let err = Error::NoFreeFrames;
        assert_eq!(format!("{}", err), "No free frames available in buffer pool");

        let err = Error::UnexpectedPageType {
            page_id: 7,
            expected: "leaf",
        };
        assert_eq!(format!("{}", err), "Page 7 is not a leaf page");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        assert!(matches!(err, Error::Io(_)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_resource_exhaustion() {
        assert!(Error::NoFreeFrames.is_resource_exhaustion());
        assert!(Error::StorageExhausted(16).is_resource_exhaustion());
        assert!(!Error::PagePinned(3).is_resource_exhaustion());
        assert!(!Error::Corrupted("x".into()).is_resource_exhaustion());
    }
}
