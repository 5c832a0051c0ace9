//! Record identifier type.

use std::fmt;

use super::PageId;

/// Points at a record stored outside the index.
///
/// The B+ tree stores `RecordId`s as uninterpreted 8-byte payloads in its
/// leaves; only equality is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    /// Page holding the record.
    pub page_id: PageId,
    /// Slot within that page.
    pub slot: u32,
}

impl RecordId {
    /// Encoded width in bytes.
    pub const SIZE: usize = 8;

    pub fn new(page_id: PageId, slot: u32) -> Self {
        Self { page_id, slot }
    }

    pub fn to_le_bytes(self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[..4].copy_from_slice(&self.page_id.to_le_bytes());
        out[4..].copy_from_slice(&self.slot.to_le_bytes());
        out
    }

    pub fn from_le_bytes(bytes: [u8; Self::SIZE]) -> Self {
        Self {
            page_id: PageId::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            slot: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rid({}, {})", self.page_id.0, self.slot)
    }
}
