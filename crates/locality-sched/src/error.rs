//! Errors reported to callers before any scheduling state is built.

use thiserror::Error;

use crate::task::TaskId;

/// Rejected input or configuration.
///
/// Internal invariant violations inside the schedulers are not represented here: they abort the run with a panic
/// carrying the offending state, so that no partial schedule is ever returned.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Scheduler configuration is invalid (non-positive processor count, block size, capacity, unknown scheduler...).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A task refers to a runtime or data lookup entry that does not exist.
    #[error("missing runtime or data entry for task {0}")]
    MissingData(TaskId),

    /// The same task id was submitted twice in one batch.
    #[error("duplicate task id {0}")]
    DuplicateTask(TaskId),

    /// Task has an unusable cost.
    #[error("invalid task {id}: {reason}")]
    InvalidTask { id: TaskId, reason: String },

    /// Malformed trace text.
    #[error("can't parse trace line {line}: {message}")]
    Parse { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
