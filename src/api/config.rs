//! Scheduler and arena configuration.

use crate::util::size::mb;

/// Number of workers the scheduler starts by default.
pub const DEFAULT_WORKER_COUNT: usize = 3;

/// Environment variable read by [`SchedulerConfig::from_env`].
pub const WORKERS_ENV: &str = "FRAMETASK_WORKERS";

/// Default size of one frame arena block.
pub const DEFAULT_BLOCK_SIZE: usize = mb(1);

/// Configuration for the task scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Number of persistent worker threads (default: 3)
    pub worker_count: usize,

    /// Worker threads are named `"{prefix}-{index}"`
    pub thread_name_prefix: String,

    /// Stack size for worker threads (None = platform default)
    pub stack_size: Option<usize>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            thread_name_prefix: String::from("frametask-worker"),
            stack_size: None,
        }
    }
}

impl SchedulerConfig {
    /// Default config with the worker count overridden by `FRAMETASK_WORKERS`.
    ///
    /// Also applies `FRAMETASK_STRICT` to the process-wide strict mode, see
    /// [`init_from_env`](crate::diagnostics::init_from_env). Unparseable
    /// worker counts are ignored.
    pub fn from_env() -> Self {
        crate::diagnostics::init_from_env();
        Self::default().with_env_workers(std::env::var(WORKERS_ENV).ok().as_deref())
    }

    fn with_env_workers(self, val: Option<&str>) -> Self {
        match val.map(|v| v.trim().parse::<usize>()) {
            Some(Ok(n)) => self.with_workers(n),
            _ => self,
        }
    }

    /// Builder pattern: set the worker count.
    pub fn with_workers(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Builder pattern: set the worker thread name prefix.
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Builder pattern: set the worker stack size.
    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }
}

/// Configuration for a frame arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Capacity of each block; also the largest single allocation (default: 1 MB)
    pub block_size: usize,

    /// Blocks allocated up front (default: 1)
    pub initial_blocks: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            initial_blocks: 1,
        }
    }
}

impl ArenaConfig {
    /// Builder pattern: set the block size.
    pub fn with_block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    /// Builder pattern: set the number of blocks allocated up front.
    pub fn with_initial_blocks(mut self, count: usize) -> Self {
        self.initial_blocks = count;
        self
    }
}
