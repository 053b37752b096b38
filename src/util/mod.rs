//! Small helpers shared by the allocators and configuration.

pub(crate) mod layout;
pub mod size;
