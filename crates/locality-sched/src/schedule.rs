//! Scheduling result.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ordering::order_by_locality;
use crate::task::{TaskBatch, TaskId};

/// Mapping from processor index to the ordered list of tasks it executes.
///
/// Every processor `0..num_proc` has an entry, possibly empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    assignments: BTreeMap<usize, Vec<TaskId>>,
    /// Makespan predicted by the scheduler itself (greedy schedulers only).
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_makespan: Option<f64>,
}

impl Schedule {
    /// Builds a schedule from per-processor lists, the i-th list going to processor i.
    ///
    /// Missing trailing processors get empty lists.
    pub fn from_lists(num_proc: usize, lists: Vec<Vec<TaskId>>) -> Self {
        assert!(
            lists.len() <= num_proc,
            "{} task lists for {} processors",
            lists.len(),
            num_proc
        );
        let mut assignments: BTreeMap<usize, Vec<TaskId>> = lists.into_iter().enumerate().collect();
        for proc_id in assignments.len()..num_proc {
            assignments.insert(proc_id, Vec::new());
        }
        Self {
            assignments,
            expected_makespan: None,
        }
    }

    pub fn with_expected_makespan(mut self, makespan: f64) -> Self {
        self.expected_makespan = Some(makespan);
        self
    }

    pub fn expected_makespan(&self) -> Option<f64> {
        self.expected_makespan
    }

    pub fn num_proc(&self) -> usize {
        self.assignments.len()
    }

    /// Tasks of processor `proc_id` in execution order.
    pub fn tasks_on(&self, proc_id: usize) -> &[TaskId] {
        self.assignments.get(&proc_id).map_or(&[], |tasks| tasks.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &[TaskId])> {
        self.assignments.iter().map(|(&proc_id, tasks)| (proc_id, tasks.as_slice()))
    }

    pub fn task_count(&self) -> usize {
        self.assignments.values().map(|tasks| tasks.len()).sum()
    }

    /// Checks that every task of the batch is scheduled exactly once and nothing else is.
    pub fn covers_exactly(&self, batch: &TaskBatch) -> bool {
        let mut seen = HashSet::with_capacity(batch.len());
        for tasks in self.assignments.values() {
            for &task in tasks {
                if batch.get(task).is_none() || !seen.insert(task) {
                    return false;
                }
            }
        }
        seen.len() == batch.len()
    }

    /// Reorders every processor queue with the locality-ordering heuristic.
    pub fn order_by_locality(&mut self, batch: &TaskBatch) -> Result<()> {
        for tasks in self.assignments.values_mut() {
            *tasks = order_by_locality(tasks, batch)?;
        }
        Ok(())
    }
}
