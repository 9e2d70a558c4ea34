//! Affinity clustering shared by the HFP schedulers.

use std::collections::BTreeSet;

use log::{debug, warn};

use crate::block::BlockMapper;
use crate::package::Package;
use crate::task::TaskBatch;

/// Groups the tasks of the batch into at most `num_proc` packages.
///
/// Starts with one package per task and repeatedly merges the smallest package with a partner.
/// In the first round merges are only allowed while the merged block set fits into `max_mem`; a package that
/// finds no such partner is put aside and reduces the number of packages still to form. The put-aside packages
/// then rejoin and a second, unbounded round merges until exactly `num_proc` packages remain.
///
/// Returns fewer than `num_proc` packages only when the batch has fewer tasks than processors.
pub fn cluster(batch: &TaskBatch, mapper: &BlockMapper, num_proc: usize, max_mem: Option<usize>) -> Vec<Package> {
    let mut packages: BTreeSet<Package> = batch.tasks().iter().map(|t| Package::from_task(t, mapper)).collect();
    if packages.len() < num_proc {
        warn!("{} tasks for {} processors, some processors stay idle", packages.len(), num_proc);
    }

    let mut to_form = num_proc;
    let mut held = Vec::new();
    while !packages.is_empty() && packages.len() > to_form {
        if let Some(smallest) = merge_smallest(&mut packages, max_mem) {
            debug!(
                "package {:?} has no partner within {:?} blocks, holding it",
                smallest.tasks(),
                max_mem
            );
            held.push(smallest);
            to_form = to_form.saturating_sub(1);
        }
    }
    packages.extend(held);

    while packages.len() > num_proc {
        if let Some(smallest) = merge_smallest(&mut packages, None) {
            panic!(
                "unbounded merge found no partner for package {:?} (blocks {:?}) among {} packages",
                smallest.tasks(),
                smallest.blocks(),
                packages.len()
            );
        }
    }

    for package in packages.iter() {
        assert!(
            package.blocks_consistent(batch, mapper),
            "block set of package {:?} differs from the union of its tasks' blocks: {:?}",
            package.tasks(),
            package.blocks()
        );
    }
    packages.into_iter().collect()
}

/// Merges the smallest package with the eligible partner sharing the fewest blocks.
///
/// A partner is eligible if the merged block set has at most `max_mem` blocks (any partner if `None`).
/// Among partners with equally few shared blocks the first one in package order wins.
/// Returns the smallest package back, already removed from the set, if no partner is eligible.
fn merge_smallest(packages: &mut BTreeSet<Package>, max_mem: Option<usize>) -> Option<Package> {
    let smallest = packages.pop_first().expect("merge requested on an empty package set");
    let partner = packages
        .iter()
        .filter(|other| max_mem.map_or(true, |cap| smallest.merged_block_count(other) <= cap))
        .min_by_key(|other| smallest.shared_blocks(other))
        .cloned();

    match partner {
        Some(partner) => {
            packages.remove(&partner);
            debug!(
                "merging package {:?} with {:?} ({} shared blocks)",
                smallest.tasks(),
                partner.tasks(),
                smallest.shared_blocks(&partner)
            );
            packages.insert(smallest.merge(partner));
            None
        }
        None => Some(smallest),
    }
}
