//! Metrics of a computed schedule.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::block::BlockMapper;
use crate::error::Result;
use crate::schedule::Schedule;
use crate::task::TaskBatch;

/// Metrics of a single processor queue.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProcessorReport {
    pub processor: usize,
    pub task_count: usize,
    /// Sum of the costs of the processor's tasks.
    pub completion_time: f64,
    /// Number of distinct cache blocks the processor touches.
    pub blocks: usize,
}

/// Contains metrics of a schedule evaluated against its batch.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RunReport {
    pub processors: Vec<ProcessorReport>,
    /// Maximum completion time over all processors.
    pub makespan: f64,
    /// Makespan predicted by the scheduler, if it provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_makespan: Option<f64>,
    /// Sum of distinct blocks over processors, i.e. blocks counted once per processor that touches them.
    pub total_blocks: usize,
}

impl RunReport {
    /// Evaluates the schedule. Fails if the schedule refers to a task absent from the batch.
    pub fn new(schedule: &Schedule, batch: &TaskBatch, mapper: &BlockMapper) -> Result<Self> {
        let mut processors = Vec::with_capacity(schedule.num_proc());
        for (processor, tasks) in schedule.iter() {
            let mut completion_time = 0.;
            let mut blocks = BTreeSet::new();
            for &id in tasks {
                let task = batch.lookup(id)?;
                completion_time += task.cost;
                blocks.extend(task.data.iter().map(|&d| mapper.block_of(d)));
            }
            processors.push(ProcessorReport {
                processor,
                task_count: tasks.len(),
                completion_time,
                blocks: blocks.len(),
            });
        }

        Ok(Self {
            makespan: processors.iter().map(|p| p.completion_time).fold(0., f64::max),
            expected_makespan: schedule.expected_makespan(),
            total_blocks: processors.iter().map(|p| p.blocks).sum(),
            processors,
        })
    }
}
