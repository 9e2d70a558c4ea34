//! Locality-ordering heuristic for a single processor queue.

use std::collections::HashSet;

use log::trace;

use crate::error::Result;
use crate::task::{DataId, TaskBatch, TaskId};

/// Orders tasks so that each next task brings in as few new data items as possible.
///
/// Starting with no local data, repeatedly picks the task with the fewest data items not yet local
/// (ties go to the lowest task id) and makes all of its data local. The result depends only on the set of
/// tasks, not on their input order, so applying it to its own output is a no-op.
///
/// Fails with [`Error::MissingData`](crate::error::Error::MissingData) if a task is not in the batch.
pub fn order_by_locality(tasks: &[TaskId], batch: &TaskBatch) -> Result<Vec<TaskId>> {
    let mut pending = tasks
        .iter()
        .map(|&id| Ok((id, batch.lookup(id)?.data.iter().copied().collect::<HashSet<DataId>>())))
        .collect::<Result<Vec<_>>>()?;

    let mut local: HashSet<DataId> = HashSet::new();
    let mut order = Vec::with_capacity(pending.len());
    while let Some((pos, missing)) = pending
        .iter()
        .enumerate()
        .map(|(pos, (id, data))| (pos, (data.difference(&local).count(), *id)))
        .min_by_key(|&(_, key)| key)
        .map(|(pos, (missing, _))| (pos, missing))
    {
        let (id, data) = pending.swap_remove(pos);
        trace!("ordering: task {} fetches {} new items", id, missing);
        local.extend(data);
        order.push(id);
    }
    Ok(order)
}
