//! Fan-out configuration for a B+ tree.

use crate::common::{Error, Result};

use super::key::IndexKey;
use super::node::{internal_slots, leaf_slots};

/// Smallest leaf capacity that still splits into two non-empty halves.
pub const MIN_LEAF_MAX_SIZE: usize = 2;

/// Smallest internal capacity whose halves each keep two children.
pub const MIN_INTERNAL_MAX_SIZE: usize = 3;

/// Node capacities for a tree.
///
/// Unset capacities default to as many entries as fit on a page for the
/// tree's key type.
///
/// # Example
/// ```
/// use pagetree::index::btree::BTreeConfig;
///
/// let config = BTreeConfig::default()
///     .with_leaf_max_size(4)
///     .with_internal_max_size(4);
/// assert_eq!(config.resolve::<u64>().unwrap(), (4, 4));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BTreeConfig {
    pub leaf_max_size: Option<usize>,
    pub internal_max_size: Option<usize>,
}

impl BTreeConfig {
    pub fn with_leaf_max_size(mut self, max_size: usize) -> Self {
        self.leaf_max_size = Some(max_size);
        self
    }

    pub fn with_internal_max_size(mut self, max_size: usize) -> Self {
        self.internal_max_size = Some(max_size);
        self
    }

    /// Largest leaf capacity for `K`; one slot stays free for the overflow entry.
    pub fn max_leaf_size<K: IndexKey>() -> usize {
        leaf_slots::<K>() - 1
    }

    pub fn max_internal_size<K: IndexKey>() -> usize {
        internal_slots::<K>()
    }

    /// Fill in defaults and check bounds. Returns `(leaf_max, internal_max)`.
    ///
    /// # Errors
    /// `Error::InvalidConfig` if a capacity is too small or does not fit on
    /// a page.
    pub fn resolve<K: IndexKey>(&self) -> Result<(usize, usize)> {
        let leaf_limit = Self::max_leaf_size::<K>();
        let internal_limit = Self::max_internal_size::<K>();

        let leaf = self.leaf_max_size.unwrap_or(leaf_limit);
        let internal = self.internal_max_size.unwrap_or(internal_limit);

        if !(MIN_LEAF_MAX_SIZE..=leaf_limit).contains(&leaf) {
            return Err(Error::InvalidConfig(format!(
                "leaf_max_size {leaf} outside {MIN_LEAF_MAX_SIZE}..={leaf_limit}"
            )));
        }
        if !(MIN_INTERNAL_MAX_SIZE..=internal_limit).contains(&internal) {
            return Err(Error::InvalidConfig(format!(
                "internal_max_size {internal} outside {MIN_INTERNAL_MAX_SIZE}..={internal_limit}"
            )));
        }

        Ok((leaf, internal))
    }
}
