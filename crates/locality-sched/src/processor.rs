//! Per-processor state kept by the greedy schedulers.

use std::collections::HashSet;

use crate::block::BlockId;
use crate::task::TaskId;

/// Processor as seen by a list scheduler during one run.
///
/// `available_time` only grows, and blocks recorded as resident are never evicted.
#[derive(Clone, Debug)]
pub struct ProcessorState {
    pub id: usize,
    available_time: f64,
    resident: HashSet<BlockId>,
    tasks: Vec<TaskId>,
}

impl ProcessorState {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            available_time: 0.,
            resident: HashSet::new(),
            tasks: Vec::new(),
        }
    }

    /// Earliest time the processor can start new work.
    pub fn available_time(&self) -> f64 {
        self.available_time
    }

    pub fn is_resident(&self, block: BlockId) -> bool {
        self.resident.contains(&block)
    }

    pub fn resident_blocks(&self) -> &HashSet<BlockId> {
        &self.resident
    }

    pub fn tasks(&self) -> &[TaskId] {
        &self.tasks
    }

    /// Appends the task, moves the available time to `end_time` and records the fetched blocks as resident.
    pub fn assign<I: IntoIterator<Item = BlockId>>(&mut self, task: TaskId, end_time: f64, fetched: I) {
        assert!(
            end_time >= self.available_time,
            "processor {} would go back in time: {} -> {}",
            self.id,
            self.available_time,
            end_time
        );
        self.available_time = end_time;
        self.resident.extend(fetched);
        self.tasks.push(task);
    }

    pub fn into_tasks(self) -> Vec<TaskId> {
        self.tasks
    }
}

/// Picks the candidate with the earliest finish time, ties go to the lowest processor index.
///
/// Each candidate is a finish time with data the caller wants back for the winner (e.g. blocks to fetch).
/// Returns `None` only for an empty candidate list.
pub fn earliest_finish<T, I: IntoIterator<Item = (f64, T)>>(candidates: I) -> Option<(usize, f64, T)> {
    let mut best: Option<(usize, f64, T)> = None;
    for (proc_id, (time, data)) in candidates.into_iter().enumerate() {
        if best.as_ref().map_or(true, |(_, best_time, _)| time.total_cmp(best_time).is_lt()) {
            best = Some((proc_id, time, data));
        }
    }
    best
}
