//! Synchronization primitives.
//!
//! Provides thin wrappers over std or parking_lot mutexes and condition variables.

pub(crate) mod mutex;
