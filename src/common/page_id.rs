//! Page identifier type.

use std::fmt;

/// Identifies a page on disk.
///
/// Pages reference each other only through `PageId`s: a B+ tree internal node
/// stores its children as ids and a leaf stores its right sibling as an id.
/// Nothing in the index holds a pointer into page memory beyond the lifetime
/// of a guard.
///
/// # Example
/// ```
/// use pagetree::PageId;
///
/// let page_id = PageId::new(42);
/// assert!(page_id.is_valid());
/// assert_eq!(PageId::from_le_bytes(page_id.to_le_bytes()), page_id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    /// Invalid/sentinel page ID.
    ///
    /// Marks an empty tree's root, the rightmost leaf's sibling link and the
    /// unused sibling field of internal pages.
    pub const INVALID: PageId = PageId(u32::MAX);

    /// Encoded width in bytes.
    pub const SIZE: usize = 4;

    /// Create a new PageId.
    #[inline]
    pub fn new(id: u32) -> Self {
        PageId(id)
    }

    /// Check if this page ID is valid (not the sentinel value).
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// `None` for the sentinel, `Some(self)` otherwise.
    #[inline]
    pub fn to_option(self) -> Option<PageId> {
        self.is_valid().then_some(self)
    }

    #[inline]
    pub fn to_le_bytes(self) -> [u8; Self::SIZE] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub fn from_le_bytes(bytes: [u8; Self::SIZE]) -> Self {
        PageId(u32::from_le_bytes(bytes))
    }
}

impl From<Option<PageId>> for PageId {
    fn from(value: Option<PageId>) -> Self {
        value.unwrap_or(PageId::INVALID)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Page(INVALID)")
        } else {
            write!(f, "Page({})", self.0)
        }
    }
}
