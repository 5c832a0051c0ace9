//! Configuration constants for pagetree.

/// Size of a page in bytes (4KB).
///
/// This is both the unit of disk I/O and the size of one B+ tree node, so it
/// bounds the fan-out of the index: with 8-byte keys a leaf holds up to 253
/// entries and an internal node up to 338 children.
pub const PAGE_SIZE: usize = 4096;

/// Maximum number of pages with u32 PageId.
///
/// One id (`u32::MAX`) is reserved as `PageId::INVALID`.
pub const MAX_PAGES: u64 = u32::MAX as u64;

/// Maximum theoretical database size in bytes.
pub const MAX_DB_SIZE_BYTES: u64 = MAX_PAGES * PAGE_SIZE as u64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_power_of_two() {
        assert!(PAGE_SIZE.is_power_of_two());
        assert_eq!(PAGE_SIZE, 4096);
    }

    #[test]
    fn test_max_db_size() {
        assert_eq!(MAX_DB_SIZE_BYTES, (u32::MAX as u64) * 4096);
    }
}
