//! Scheduler interface.

use crate::schedule::Schedule;
use crate::task::TaskBatch;

pub use crate::scheduler_resolver::{default_scheduler_resolver, SchedulerParams};

/// Static scheduling strategy.
///
/// Implementations are configured on construction and keep no state between calls: all processor state and
/// packages live inside one [`get_schedule`](Scheduler::get_schedule) call. The batch is only borrowed, so several
/// schedulers can plan the same batch independently.
pub trait Scheduler {
    /// Short name used in logs and reports.
    fn name(&self) -> &str;

    /// Assigns every task of the batch to exactly one processor.
    ///
    /// Panics if an internal invariant is violated; a partial schedule is never returned.
    fn get_schedule(&self, batch: &TaskBatch) -> Schedule;
}
