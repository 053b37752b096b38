//! # frametask
//!
//! Frame-driven task scheduling and transient memory for real-time render
//! loops.
//!
//! ## Features
//!
//! - Persistent worker threads fed from a FIFO queue, with `init`/`join`
//!   phases on the owning thread and a `can_start` readiness predicate
//! - Two-stage GPU task queue: submit in one tick, complete in a later one
//! - Per-frame bump arena built from a growable chain of fixed blocks
//! - Fixed-block pool allocator with generation-checked handles and
//!   lock-free deferred frees from worker threads
//! - Runtime diagnostics with stable codes and a strict mode for CI
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use frametask::{FnTask, FrameArena, GpuTask, GpuTaskQueue, Scheduler, SchedulerConfig};
//!
//! let mut scheduler = Scheduler::start(SchedulerConfig::default()).unwrap();
//! let mut gpu = GpuTaskQueue::new();
//! let mut arena = FrameArena::default();
//!
//! scheduler.append(FnTask::new(|| { /* build a chunk mesh */ }));
//! gpu.append(GpuTask::new(|| { /* upload a buffer */ }));
//!
//! loop {
//!     scheduler.update();
//!     gpu.tick();
//!
//!     let visible = arena.alloc_slice_fill_with(64, |i| i as u32);
//!     // ... draw ...
//!     let _ = visible;
//!
//!     arena.clear();
//!     # break;
//! }
//! ```

pub mod api;
pub mod diagnostics;
pub mod tasks;

mod allocators;
mod sync;
mod util;

pub use util::size;

// Configuration and statistics
pub use api::config::{ArenaConfig, SchedulerConfig};
pub use api::stats::{ArenaStats, PoolStats, Progress, SchedulerStats};

// Frame memory
pub use allocators::frame::{ArenaError, FrameArena};
pub use api::frame_collections::FrameVec;

// Pools
pub use allocators::deferred::RemoteFree;
pub use allocators::pool::{PoolAllocator, PoolSlot};
pub use api::pool::{Pool, PoolKey};

// Tasks
pub use tasks::gpu::{GpuTask, GpuTaskQueue};
pub use tasks::scheduler::{Scheduler, SchedulerError};
pub use tasks::task::{FnTask, Task, TaskBuilder};

// Diagnostics - Core types and predefined codes
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use diagnostics::{set_strict_mode, StrictMode, StrictModeGuard};
pub use diagnostics::{FT001, FT002, FT101, FT201, FT202, FT301, FT901};
