//! Cost of bringing a cache block to a processor.

use crate::block::BlockId;

pub const DEFAULT_FETCH_COST: f64 = 400.;

/// Fetch-cost model consulted by the locality-aware greedy scheduler.
pub trait FetchCostModel {
    /// Cost of moving `block` to processor `dest`.
    fn fetch_cost(&self, block: BlockId, dest: usize) -> f64;
}

/// Flat cost for every block and destination.
#[derive(Clone, Copy, Debug)]
pub struct ConstantFetchCost {
    cost: f64,
}

impl ConstantFetchCost {
    pub fn new(cost: f64) -> Self {
        Self { cost }
    }
}

impl Default for ConstantFetchCost {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_COST)
    }
}

impl FetchCostModel for ConstantFetchCost {
    fn fetch_cost(&self, _block: BlockId, _dest: usize) -> f64 {
        self.cost
    }
}
