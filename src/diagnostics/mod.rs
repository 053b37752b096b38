//! Diagnostics and logging.
//!
//! Runtime diagnostics carry a stable code, a message and optional
//! note/help lines, and are written to stderr (debug builds or the
//! `diagnostics` feature) or routed to the `log` crate (`log` feature).
//!
//! ## Diagnostic Codes
//!
//! | Code  | Meaning                      |
//! |-------|------------------------------|
//! | FT0xx | Frame arena issues           |
//! | FT1xx | Scheduler configuration      |
//! | FT2xx | Task execution               |
//! | FT3xx | Pool allocator misuse        |
//! | FT9xx | Internal errors              |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use frametask::ft_emit;
//!
//! ft_emit!(FT301);
//! ```

pub mod emit;
pub mod kind;
pub mod macros;
pub mod strict;

pub use emit::{
    emit, emit_with_context, set_sink, set_verbose, suppress_diagnostics, CollectingSink,
    DiagnosticSink,
};
pub use kind::{Diagnostic, DiagnosticKind};
pub use strict::{
    init_from_env, set_strict_mode, strict_mode, StrictMode, StrictModeGuard, STRICT_ENV,
};

pub use kind::{FT001, FT002, FT101, FT201, FT202, FT301, FT901};
