//! Cache-block mapping.

use std::collections::BTreeSet;

use crate::task::DataId;

pub type BlockId = u64;

/// Maps raw data items to the cache blocks containing them.
///
/// A data item `d` belongs to block `d - d % block_size`, so all items of one aligned block share an id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockMapper {
    block_size: u64,
}

impl BlockMapper {
    /// Creates a mapper. The block size must be positive, which is checked by
    /// [`SchedulerConfig::validate`](crate::config::SchedulerConfig::validate).
    pub fn new(block_size: u64) -> Self {
        debug_assert!(block_size > 0);
        Self { block_size }
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn block_of(&self, data_id: DataId) -> BlockId {
        data_id - data_id % self.block_size
    }

    /// Maps data items to blocks keeping order and duplicates.
    pub fn map(&self, data: &[DataId]) -> Vec<BlockId> {
        data.iter().map(|&d| self.block_of(d)).collect()
    }

    /// Set of distinct blocks touched by the data items.
    pub fn block_set(&self, data: &[DataId]) -> BTreeSet<BlockId> {
        data.iter().map(|&d| self.block_of(d)).collect()
    }
}
