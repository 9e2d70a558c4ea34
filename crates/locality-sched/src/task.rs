//! Tasks and task batches.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub type TaskId = usize;
/// Raw data item identifier (e.g. a memory address from a trace).
pub type DataId = u64;

/// Represents a task submitted for scheduling.
///
/// Described by the estimated compute cost (also used as the runtime estimate) and the data items it reads or
/// writes. The same data item may be listed more than once.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub cost: f64,
    pub data: Vec<DataId>,
}

impl Task {
    /// Creates new task.
    pub fn new(id: TaskId, cost: f64, data: Vec<DataId>) -> Self {
        Self { id, cost, data }
    }
}

/// Ordered batch of tasks with a lookup by task id.
///
/// The order of tasks is the queue order consumed by the greedy schedulers.
/// Batches are validated on construction and are never mutated by schedulers.
#[derive(Clone, Debug, Default)]
pub struct TaskBatch {
    tasks: Vec<Task>,
    index: HashMap<TaskId, usize>,
}

impl TaskBatch {
    /// Creates a batch, rejecting duplicate ids and negative or non-finite costs.
    pub fn new(tasks: Vec<Task>) -> Result<Self> {
        let mut index = HashMap::with_capacity(tasks.len());
        for (pos, task) in tasks.iter().enumerate() {
            if !task.cost.is_finite() || task.cost < 0. {
                return Err(Error::InvalidTask {
                    id: task.id,
                    reason: format!("cost must be a non-negative number, got {}", task.cost),
                });
            }
            if index.insert(task.id, pos).is_some() {
                return Err(Error::DuplicateTask(task.id));
            }
        }
        Ok(Self { tasks, index })
    }

    /// Builds a batch from a task order and separate runtime and data lookups.
    ///
    /// Every id in `order` must be present in both lookups.
    pub fn from_lookup(
        order: &[TaskId],
        runtimes: &HashMap<TaskId, f64>,
        data: &HashMap<TaskId, Vec<DataId>>,
    ) -> Result<Self> {
        let tasks = order
            .iter()
            .map(|&id| match (runtimes.get(&id), data.get(&id)) {
                (Some(&cost), Some(items)) => Ok(Task::new(id, cost, items.clone())),
                _ => Err(Error::MissingData(id)),
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(tasks)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.index.get(&id).map(|&pos| &self.tasks[pos])
    }

    /// Same as [`get`](Self::get), but reports an absent task as [`Error::MissingData`].
    pub fn lookup(&self, id: TaskId) -> Result<&Task> {
        self.get(id).ok_or(Error::MissingData(id))
    }

    /// Sum of all task costs.
    pub fn total_cost(&self) -> f64 {
        self.tasks.iter().map(|t| t.cost).sum()
    }

    /// Returns a copy ordered by decreasing cost (longest task first).
    ///
    /// The sort is stable, so tasks with equal cost keep their relative order.
    pub fn sorted_by_cost_desc(&self) -> Self {
        let mut tasks = self.tasks.clone();
        tasks.sort_by(|a, b| b.cost.total_cmp(&a.cost));
        let index = tasks.iter().enumerate().map(|(pos, t)| (t.id, pos)).collect();
        Self { tasks, index }
    }
}
