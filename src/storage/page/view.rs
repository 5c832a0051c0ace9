//! Typed views over raw page bytes.
//!
//! A view borrows a page's bytes and interprets them as one structured
//! format (a B+ tree leaf, an internal node, a header page). Views own no
//! memory, so a view can never outlive the guard that latched the page.

/// A read-only interpretation of page bytes.
pub trait PageView<'a>: Sized {
    fn from_bytes(data: &'a [u8]) -> Self;
}

/// A mutable interpretation of page bytes.
pub trait PageViewMut<'a>: Sized {
    fn from_bytes_mut(data: &'a mut [u8]) -> Self;
}
