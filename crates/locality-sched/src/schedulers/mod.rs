//! Scheduler implementations.

pub mod clustering;
pub mod dmda;
pub mod greedy;
pub mod hfp;
pub mod hfp_heter;
