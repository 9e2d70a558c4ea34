use std::collections::BTreeSet;

use log::{debug, info};

use crate::block::{BlockId, BlockMapper};
use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::fetch_cost::{ConstantFetchCost, FetchCostModel};
use crate::processor::{earliest_finish, ProcessorState};
use crate::schedule::Schedule;
use crate::scheduler::Scheduler;
use crate::task::{Task, TaskBatch};

/// Locality-aware earliest-finish-time list scheduler (deque model data aware).
///
/// Like [`GreedyScheduler`](crate::schedulers::greedy::GreedyScheduler), but the finish time on a processor also
/// includes fetching every block of the task which is not resident there yet. Fetched blocks stay resident on the
/// chosen processor for the rest of the run (cold cache, no eviction).
pub struct DmdaScheduler {
    num_proc: usize,
    mapper: BlockMapper,
    fetch_cost_model: Box<dyn FetchCostModel>,
}

impl DmdaScheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(DmdaScheduler {
            num_proc: config.num_proc,
            mapper: config.block_mapper(),
            fetch_cost_model: Box::new(ConstantFetchCost::new(config.fetch_cost)),
        })
    }

    pub fn with_fetch_cost_model<M: FetchCostModel + 'static>(mut self, model: M) -> Self {
        self.fetch_cost_model = Box::new(model);
        self
    }

    /// Assigns the tasks in batch order and returns the final processor states.
    ///
    /// `on_assign` is called after every assignment with the task and the current processor states.
    pub fn plan<F: FnMut(&Task, &[ProcessorState])>(&self, batch: &TaskBatch, mut on_assign: F) -> Vec<ProcessorState> {
        let mut processors = (0..self.num_proc).map(ProcessorState::new).collect::<Vec<_>>();

        for task in batch.tasks() {
            let blocks = self.mapper.map(&task.data);

            let (best_proc, best_finish, fetched) = earliest_finish(processors.iter().map(|processor| {
                let (time, fetched) = self.task_cost(task, &blocks, processor);
                (processor.available_time() + time, fetched)
            }))
            .unwrap();

            debug!(
                "scheduling [dmda] task {} on processor {} finishing at {:.3}, fetching {} blocks",
                task.id,
                best_proc,
                best_finish,
                fetched.len()
            );
            processors[best_proc].assign(task.id, best_finish, fetched);
            on_assign(task, &processors);
        }
        processors
    }

    /// Time to run the task on the processor and the blocks that would have to be fetched for it.
    fn task_cost(&self, task: &Task, blocks: &[BlockId], processor: &ProcessorState) -> (f64, BTreeSet<BlockId>) {
        let mut fetched = BTreeSet::new();
        let mut transfer_time = 0.;
        for &block in blocks {
            if !processor.is_resident(block) && fetched.insert(block) {
                transfer_time += self.fetch_cost_model.fetch_cost(block, processor.id);
            }
        }
        (task.cost + transfer_time, fetched)
    }
}

impl Scheduler for DmdaScheduler {
    fn name(&self) -> &str {
        "Dmda"
    }

    fn get_schedule(&self, batch: &TaskBatch) -> Schedule {
        let processors = self.plan(batch, |_, _| {});

        let longest_time = processors.iter().map(|p| p.available_time()).fold(0., f64::max);
        info!(
            "expected makespan: {:.3}, resident blocks: {}",
            longest_time,
            processors.iter().map(|p| p.resident_blocks().len()).sum::<usize>()
        );

        Schedule::from_lists(self.num_proc, processors.into_iter().map(|p| p.into_tasks()).collect())
            .with_expected_makespan(longest_time)
    }
}
