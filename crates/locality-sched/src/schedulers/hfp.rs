use std::collections::BTreeSet;

use log::{debug, info};

use crate::block::BlockMapper;
use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::schedule::Schedule;
use crate::scheduler::Scheduler;
use crate::schedulers::clustering::cluster;
use crate::task::{TaskBatch, TaskId};

/// Hierarchical fair packing for tasks of similar cost.
///
/// Clusters the tasks into one package per processor (see [`cluster`]) and then balances the packages by task
/// count: no processor gets more than `ceil(n / num_proc)` tasks. Tasks are moved from the tail of the largest
/// package to the tail of the smallest one.
pub struct HfpScheduler {
    num_proc: usize,
    mapper: BlockMapper,
    max_mem: Option<usize>,
}

impl HfpScheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(HfpScheduler {
            num_proc: config.num_proc,
            mapper: config.block_mapper(),
            max_mem: config.max_mem,
        })
    }
}

/// Moves tail tasks from the largest to the smallest list until no list exceeds `ceil(total / num_proc)`.
///
/// Lists are kept ordered by (length, contents) and the result comes out in that order.
pub fn balance_by_count(lists: Vec<Vec<TaskId>>, num_proc: usize) -> Vec<Vec<TaskId>> {
    let total: usize = lists.iter().map(|l| l.len()).sum();
    let bound = total.div_ceil(num_proc);

    let mut lists: BTreeSet<(usize, Vec<TaskId>)> = lists.into_iter().map(|l| (l.len(), l)).collect();
    while lists.len() >= 2 && lists.last().map_or(false, |(count, _)| *count > bound) {
        let (smallest_count, mut smallest) = lists.pop_first().unwrap();
        let (largest_count, mut largest) = lists.pop_last().unwrap();
        let transfer = (largest_count - bound).min(bound.saturating_sub(smallest_count));
        assert!(
            transfer > 0,
            "can't rebalance: smallest package {:?} is already at the bound {}",
            smallest,
            bound
        );
        debug!(
            "moving {} tasks from package of {} to package of {}",
            transfer, largest_count, smallest_count
        );
        smallest.extend(largest.drain(largest_count - transfer..));
        lists.insert((smallest_count + transfer, smallest));
        lists.insert((largest_count - transfer, largest));
    }
    lists.into_iter().map(|(_, l)| l).collect()
}

impl Scheduler for HfpScheduler {
    fn name(&self) -> &str {
        "Hfp"
    }

    fn get_schedule(&self, batch: &TaskBatch) -> Schedule {
        let packages = cluster(batch, &self.mapper, self.num_proc, self.max_mem);
        let lists = balance_by_count(packages.into_iter().map(|p| p.into_tasks()).collect(), self.num_proc);
        info!(
            "package sizes after balancing: {:?}",
            lists.iter().map(|l| l.len()).collect::<Vec<_>>()
        );
        Schedule::from_lists(self.num_proc, lists)
    }
}
