//! Scheduler and allocator statistics.

use crate::util::size::format_bytes;

/// Progress of the current batch of scheduled tasks.
///
/// Both counters return to zero once every appended task has been joined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Tasks joined since the counters last reset.
    pub completed: usize,

    /// Tasks appended since the counters last reset.
    pub total: usize,
}

impl Progress {
    /// Fraction of the batch that has completed, in `0.0..=1.0`.
    ///
    /// An idle scheduler reports 1.0.
    pub fn ratio(&self) -> f32 {
        if self.total == 0 {
            return 1.0;
        }
        self.completed as f32 / self.total as f32
    }

    /// True when no batch is in flight.
    pub fn is_idle(&self) -> bool {
        self.total == 0
    }
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.completed, self.total)
    }
}

/// Lifetime statistics of a scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Tasks handed to a worker.
    pub dispatched: u64,

    /// Tasks reaped from a worker (panicked ones included).
    pub completed: u64,

    /// Tasks whose run body panicked.
    pub panicked: u64,

    /// Times a task was rotated to the back because it could not start.
    pub requeued: u64,
}

impl std::fmt::Display for SchedulerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Scheduler Statistics:")?;
        writeln!(f, "  Dispatched: {}", self.dispatched)?;
        writeln!(f, "  Completed:  {}", self.completed)?;
        writeln!(f, "  Panicked:   {}", self.panicked)?;
        writeln!(f, "  Requeued:   {}", self.requeued)?;
        Ok(())
    }
}

/// Frame arena statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Blocks in the chain.
    pub blocks: usize,

    /// Capacity of each block in bytes.
    pub block_size: usize,

    /// Bytes handed out since the last clear.
    pub allocated: usize,

    /// Largest `allocated` value observed.
    pub high_water: usize,

    /// Blocks ever requested from the system allocator.
    pub block_allocations: u64,

    /// Number of clears performed.
    pub clears: u64,
}

impl std::fmt::Display for ArenaStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Frame Arena Statistics:")?;
        writeln!(f, "  Blocks:     {} x {}", self.blocks, format_bytes(self.block_size))?;
        writeln!(f, "  Allocated:  {}", format_bytes(self.allocated))?;
        writeln!(f, "  High water: {}", format_bytes(self.high_water))?;
        writeln!(f, "  Clears:     {}", self.clears)?;
        Ok(())
    }
}

/// Pool allocator statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Blocks allocated so far.
    pub blocks: usize,

    /// Total slots across all blocks.
    pub capacity: usize,

    /// Slots currently handed out.
    pub live: usize,

    /// Slot size after rounding to 16 bytes.
    pub item_size: usize,
}

impl PoolStats {
    /// Slots available without allocating a new block.
    pub fn free(&self) -> usize {
        self.capacity - self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_ratio() {
        let idle = Progress::default();
        assert!(idle.is_idle());
        assert_eq!(idle.ratio(), 1.0);

        let half = Progress { completed: 1, total: 2 };
        assert!(!half.is_idle());
        assert_eq!(half.ratio(), 0.5);
        assert_eq!(half.to_string(), "1/2");
    }

    #[test]
    fn test_pool_stats_free() {
        let stats = PoolStats { blocks: 1, capacity: 8, live: 3, item_size: 16 };
        assert_eq!(stats.free(), 5);
    }
}
