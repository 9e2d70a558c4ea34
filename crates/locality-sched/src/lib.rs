#![doc = include_str!("../README.md")]

pub mod block;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch_cost;
pub mod ordering;
pub mod package;
pub mod parsers;
pub mod processor;
pub mod report;
pub mod schedule;
pub mod scheduler;
pub mod scheduler_resolver;
pub mod schedulers;
pub mod task;

pub use config::SchedulerConfig;
pub use error::{Error, Result};
pub use schedule::Schedule;
pub use scheduler::{default_scheduler_resolver, Scheduler, SchedulerParams};
pub use task::{Task, TaskBatch};
