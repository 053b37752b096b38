//! Public API for frametask.
//!
//! Configuration, statistics and the typed wrappers built on the raw
//! allocators.

pub mod config;
pub mod frame_collections;
pub mod pool;
pub mod stats;
