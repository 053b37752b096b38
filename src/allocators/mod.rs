//! Allocation backends.
//!
//! **These are the only modules that should contain `unsafe` code**, apart
//! from the typed wrappers in `api` that place values in their memory.

pub(crate) mod deferred;
pub(crate) mod frame;
pub(crate) mod pool;
