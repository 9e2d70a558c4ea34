use std::collections::BTreeSet;

use log::{debug, info};

use crate::block::BlockMapper;
use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::package::Bin;
use crate::schedule::Schedule;
use crate::scheduler::Scheduler;
use crate::schedulers::clustering::cluster;
use crate::task::{TaskBatch, TaskId};

/// Share of the average load a processor may exceed before rebalancing kicks in.
pub const LOAD_SLACK: f64 = 1.2;

/// Hierarchical fair packing for tasks of different cost.
///
/// Uses the same clustering as [`HfpScheduler`](crate::schedulers::hfp::HfpScheduler), but balances packages
/// by their summed task runtime. Tasks are never split: when the next task to move does not fit into the
/// transfer budget, the heavy package is left as is.
pub struct HfpHeterScheduler {
    num_proc: usize,
    mapper: BlockMapper,
    max_mem: Option<usize>,
}

impl HfpHeterScheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(HfpHeterScheduler {
            num_proc: config.num_proc,
            mapper: config.block_mapper(),
            max_mem: config.max_mem,
        })
    }
}

/// One step of [`balance_by_load`]: tail tasks of the heaviest bin offered to the lightest one.
#[derive(Debug)]
pub struct Transfer<'a> {
    /// Heaviest bin after giving its tasks away.
    pub from: &'a Bin,
    /// Load of the receiving bin before the transfer, `None` if no other bin was left.
    pub to_load: Option<f64>,
    /// Moved tasks with their runtimes, in pull order.
    pub moved: &'a [(TaskId, f64)],
    /// Part of the transfer budget that was not used.
    pub budget_left: f64,
    /// Runtime of the tail task that did not fit into the remaining budget.
    pub blocked_by: Option<f64>,
    /// Whether `from` is final and takes no further part.
    pub finalized: bool,
}

/// Moves tail tasks from the heaviest to the lightest bin until no bin exceeds
/// `LOAD_SLACK * total_load / num_proc`, or no further move is possible.
///
/// Each step may move `min(heaviest - bound, bound - lightest)` worth of runtime. A heaviest bin whose tail task
/// does not fit into this budget, or that gives away nothing, is finalized and takes no further part.
/// The result is ordered by (load, count, tasks).
pub fn balance_by_load(bins: Vec<Bin>, batch: &TaskBatch, num_proc: usize) -> Vec<Bin> {
    balance_by_load_with(bins, batch, num_proc, |_| {})
}

/// Same as [`balance_by_load`], calling `on_transfer` after every step.
pub fn balance_by_load_with<F: FnMut(&Transfer)>(
    bins: Vec<Bin>,
    batch: &TaskBatch,
    num_proc: usize,
    mut on_transfer: F,
) -> Vec<Bin> {
    let total_load: f64 = bins.iter().map(|b| b.load).sum();
    let bound = total_load / num_proc as f64 * LOAD_SLACK;

    let mut bins: BTreeSet<Bin> = bins.into_iter().collect();
    let mut finalized = Vec::new();
    while let Some(mut heaviest) = bins.pop_last() {
        if heaviest.load <= bound {
            bins.insert(heaviest);
            break;
        }
        let Some(mut lightest) = bins.pop_first() else {
            on_transfer(&Transfer {
                from: &heaviest,
                to_load: None,
                moved: &[],
                budget_left: 0.,
                blocked_by: None,
                finalized: true,
            });
            finalized.push(heaviest);
            break;
        };

        let mut budget = (heaviest.load - bound).min(bound - lightest.load);
        let mut pulled = Vec::new();
        let mut blocked_by = None;
        while budget > 0. {
            let Some(&task) = heaviest.tasks.last() else {
                break;
            };
            let runtime = batch
                .get(task)
                .unwrap_or_else(|| panic!("bin {:?} holds task {} which is not in the batch", heaviest.tasks, task))
                .cost;
            if runtime > budget {
                blocked_by = Some(runtime);
                break;
            }
            heaviest.tasks.pop();
            heaviest.load -= runtime;
            budget -= runtime;
            pulled.push((task, runtime));
        }

        debug!(
            "moving {} tasks from bin with load {:.3} to bin with load {:.3}",
            pulled.len(),
            heaviest.load,
            lightest.load
        );
        let is_final = blocked_by.is_some() || pulled.is_empty();
        on_transfer(&Transfer {
            from: &heaviest,
            to_load: Some(lightest.load),
            moved: &pulled,
            budget_left: budget,
            blocked_by,
            finalized: is_final,
        });
        for (task, runtime) in pulled {
            lightest.tasks.push(task);
            lightest.load += runtime;
        }
        bins.insert(lightest);
        if is_final {
            finalized.push(heaviest);
        } else {
            bins.insert(heaviest);
        }
    }

    bins.extend(finalized);
    bins.into_iter().collect()
}

impl Scheduler for HfpHeterScheduler {
    fn name(&self) -> &str {
        "HfpHeter"
    }

    fn get_schedule(&self, batch: &TaskBatch) -> Schedule {
        let packages = cluster(batch, &self.mapper, self.num_proc, self.max_mem);
        let bins = balance_by_load(packages.into_iter().map(Bin::from).collect(), batch, self.num_proc);
        info!(
            "package loads after balancing: {:?}",
            bins.iter().map(|b| b.load).collect::<Vec<_>>()
        );
        Schedule::from_lists(self.num_proc, bins.into_iter().map(|b| b.tasks).collect())
    }
}
