use log::{debug, info};

use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::processor::{earliest_finish, ProcessorState};
use crate::schedule::Schedule;
use crate::scheduler::Scheduler;
use crate::task::{Task, TaskBatch};

/// Earliest-finish-time list scheduler without any data model.
///
/// Takes tasks in batch order and puts each one on the processor where it would finish first
/// (lowest processor id on ties). Data sets are ignored, which makes it the load-balancing baseline.
pub struct GreedyScheduler {
    num_proc: usize,
}

impl GreedyScheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(GreedyScheduler {
            num_proc: config.num_proc,
        })
    }

    /// Assigns the tasks in batch order and returns the final processor states.
    ///
    /// `on_assign` is called after every assignment with the task and the current processor states.
    pub fn plan<F: FnMut(&Task, &[ProcessorState])>(&self, batch: &TaskBatch, mut on_assign: F) -> Vec<ProcessorState> {
        let mut processors = (0..self.num_proc).map(ProcessorState::new).collect::<Vec<_>>();

        for task in batch.tasks() {
            let (best_proc, best_finish, ()) =
                earliest_finish(processors.iter().map(|p| (p.available_time() + task.cost, ()))).unwrap();
            debug!(
                "scheduling [greedy] task {} on processor {} on time {:.3}-{:.3}",
                task.id,
                best_proc,
                best_finish - task.cost,
                best_finish
            );
            processors[best_proc].assign(task.id, best_finish, std::iter::empty());
            on_assign(task, &processors);
        }
        processors
    }
}

impl Scheduler for GreedyScheduler {
    fn name(&self) -> &str {
        "Greedy"
    }

    fn get_schedule(&self, batch: &TaskBatch) -> Schedule {
        let processors = self.plan(batch, |_, _| {});

        let longest_time = processors.iter().map(|p| p.available_time()).fold(0., f64::max);
        info!("expected makespan: {:.3}", longest_time);

        Schedule::from_lists(self.num_proc, processors.into_iter().map(|p| p.into_tasks()).collect())
            .with_expected_makespan(longest_time)
    }
}
