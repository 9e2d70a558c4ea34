//! Scheduler configuration.

use serde::{Deserialize, Serialize};

use crate::block::BlockMapper;
use crate::error::{Error, Result};
use crate::fetch_cost::DEFAULT_FETCH_COST;

fn default_num_proc() -> usize {
    4
}
fn default_cache_block_size() -> u64 {
    8
}
fn default_max_mem() -> Option<usize> {
    Some(10)
}
fn default_fetch_cost() -> f64 {
    DEFAULT_FETCH_COST
}

/// Parameters shared by all schedulers.
///
/// Fields missing from a deserialized config fall back to the defaults of [`SchedulerConfig::default`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Number of processors.
    #[serde(default = "default_num_proc")]
    pub num_proc: usize,
    /// Size of a cache block in data-id units.
    #[serde(default = "default_cache_block_size")]
    pub cache_block_size: u64,
    /// Maximum number of distinct blocks in a package during the capacity-bounded merge
    /// of the clustering schedulers. `None` means unbounded.
    #[serde(default = "default_max_mem")]
    pub max_mem: Option<usize>,
    /// Cost of fetching one block, used by the locality-aware greedy scheduler.
    #[serde(default = "default_fetch_cost")]
    pub fetch_cost: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            num_proc: default_num_proc(),
            cache_block_size: default_cache_block_size(),
            max_mem: default_max_mem(),
            fetch_cost: default_fetch_cost(),
        }
    }
}

impl SchedulerConfig {
    pub fn new(num_proc: usize, cache_block_size: u64) -> Self {
        Self {
            num_proc,
            cache_block_size,
            ..Default::default()
        }
    }

    pub fn with_max_mem(mut self, max_mem: Option<usize>) -> Self {
        self.max_mem = max_mem;
        self
    }

    pub fn with_fetch_cost(mut self, fetch_cost: f64) -> Self {
        self.fetch_cost = fetch_cost;
        self
    }

    /// Checks the configuration before any scheduling state is built.
    pub fn validate(&self) -> Result<()> {
        if self.num_proc == 0 {
            return Err(Error::InvalidConfig("processor count must be positive".to_string()));
        }
        if self.cache_block_size == 0 {
            return Err(Error::InvalidConfig("cache block size must be positive".to_string()));
        }
        if self.max_mem == Some(0) {
            return Err(Error::InvalidConfig("package capacity must be positive".to_string()));
        }
        if !self.fetch_cost.is_finite() || self.fetch_cost < 0. {
            return Err(Error::InvalidConfig(format!(
                "fetch cost must be a non-negative number, got {}",
                self.fetch_cost
            )));
        }
        Ok(())
    }

    pub fn block_mapper(&self) -> BlockMapper {
        BlockMapper::new(self.cache_block_size)
    }
}
