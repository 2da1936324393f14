//! Threaded machinery: the worker pool and the timeout scheduler.

pub mod scheduler;
pub mod worker_pool;

pub use scheduler::TimeoutScheduler;
pub use worker_pool::{QueueState, WorkQueue, WorkerPool};
