//! Task scheduling.
//!
//! - [`Scheduler`] runs CPU-bound [`Task`] bodies on a fixed pool of worker
//!   threads, with `init`/`join` phases on the owning thread.
//! - [`GpuTaskQueue`] pipelines work that must stay on the graphics thread:
//!   submit in one tick, complete in a later one.

pub mod gpu;
pub mod scheduler;
pub mod task;

mod worker;
