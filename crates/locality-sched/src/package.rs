//! Task packages used by the clustering schedulers.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::block::{BlockId, BlockMapper};
use crate::task::{Task, TaskBatch, TaskId};

/// Cluster of tasks that will run on the same processor.
///
/// Members keep insertion order, which later decides which tasks are moved during rebalancing (tasks are taken
/// from the tail). `blocks` is always the union of the members' blocks and `load` the sum of their costs.
///
/// Packages are ordered by (member count, member list). Task ids are unique, so two distinct packages never
/// compare equal and the block set does not take part in the ordering.
#[derive(Clone, Debug)]
pub struct Package {
    tasks: Vec<TaskId>,
    blocks: BTreeSet<BlockId>,
    load: f64,
}

impl Package {
    /// Package with a single task.
    pub fn from_task(task: &Task, mapper: &BlockMapper) -> Self {
        Self {
            tasks: vec![task.id],
            blocks: mapper.block_set(&task.data),
            load: task.cost,
        }
    }

    pub fn tasks(&self) -> &[TaskId] {
        &self.tasks
    }

    pub fn count(&self) -> usize {
        self.tasks.len()
    }

    pub fn blocks(&self) -> &BTreeSet<BlockId> {
        &self.blocks
    }

    pub fn load(&self) -> f64 {
        self.load
    }

    /// Number of blocks shared with `other`.
    pub fn shared_blocks(&self, other: &Package) -> usize {
        self.blocks.intersection(&other.blocks).count()
    }

    /// Size of the block set the merge with `other` would have.
    pub fn merged_block_count(&self, other: &Package) -> usize {
        self.blocks.len() + other.blocks.len() - self.shared_blocks(other)
    }

    /// Absorbs `other`: its members are appended after ours.
    pub fn merge(mut self, other: Package) -> Self {
        self.tasks.extend(other.tasks);
        self.blocks.extend(other.blocks);
        self.load += other.load;
        self
    }

    /// Checks that the block set equals the union of the members' blocks.
    pub fn blocks_consistent(&self, batch: &TaskBatch, mapper: &BlockMapper) -> bool {
        let mut expected = BTreeSet::new();
        for &id in self.tasks.iter() {
            match batch.get(id) {
                Some(task) => expected.extend(task.data.iter().map(|&d| mapper.block_of(d))),
                None => return false,
            }
        }
        expected == self.blocks
    }

    pub fn into_tasks(self) -> Vec<TaskId> {
        self.tasks
    }
}

impl PartialEq for Package {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Package {}

impl PartialOrd for Package {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Package {
    fn cmp(&self, other: &Self) -> Ordering {
        self.tasks
            .len()
            .cmp(&other.tasks.len())
            .then_with(|| self.tasks.cmp(&other.tasks))
    }
}

/// Processor queue during rebalancing: a package stripped of its block set.
///
/// Ordered by (load, member count, member list) for load-based rebalancing.
#[derive(Clone, Debug)]
pub struct Bin {
    pub tasks: Vec<TaskId>,
    pub load: f64,
}

impl Bin {
    pub fn count(&self) -> usize {
        self.tasks.len()
    }
}

impl From<Package> for Bin {
    fn from(package: Package) -> Self {
        Self {
            tasks: package.tasks,
            load: package.load,
        }
    }
}

impl PartialEq for Bin {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Bin {}

impl PartialOrd for Bin {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Bin {
    fn cmp(&self, other: &Self) -> Ordering {
        self.load
            .total_cmp(&other.load)
            .then_with(|| self.tasks.len().cmp(&other.tasks.len()))
            .then_with(|| self.tasks.cmp(&other.tasks))
    }
}
