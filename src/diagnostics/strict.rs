//! Strict mode: which diagnostic kinds abort the caller.
//!
//! CI runs set `FRAMETASK_STRICT` so that scheduler or allocator misuse fails
//! the build instead of scrolling past in the log. The variable is applied by
//! [`SchedulerConfig::from_env`](crate::SchedulerConfig::from_env) or by
//! calling [`init_from_env`] directly.

use std::sync::atomic::{AtomicU8, Ordering};

use super::kind::DiagnosticKind;

/// Environment variable read by [`init_from_env`].
pub const STRICT_ENV: &str = "FRAMETASK_STRICT";

/// How emitted diagnostics are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum StrictMode {
    /// Report only.
    #[default]
    Warn = 0,
    /// Errors panic after being reported.
    PanicOnError = 1,
    /// Errors and warnings panic after being reported.
    PanicOnWarning = 2,
}

impl StrictMode {
    /// Parse a `FRAMETASK_STRICT` value. Unknown values mean [`StrictMode::Warn`].
    ///
    /// - `"1"`, `"error"`, `"true"` -> `PanicOnError`
    /// - `"2"`, `"warning"`, `"all"` -> `PanicOnWarning`
    pub fn parse(val: &str) -> Self {
        match val.trim().to_ascii_lowercase().as_str() {
            "1" | "error" | "true" => StrictMode::PanicOnError,
            "2" | "warning" | "all" => StrictMode::PanicOnWarning,
            _ => StrictMode::Warn,
        }
    }

    /// Mode requested by the environment, if `FRAMETASK_STRICT` is set.
    pub fn from_env() -> Option<Self> {
        std::env::var(STRICT_ENV).ok().map(|val| Self::parse(&val))
    }

    /// Whether a diagnostic of `kind` panics under this mode.
    pub fn is_fatal(self, kind: DiagnosticKind) -> bool {
        match kind {
            DiagnosticKind::Error => self != StrictMode::Warn,
            DiagnosticKind::Warning => self == StrictMode::PanicOnWarning,
            DiagnosticKind::Note | DiagnosticKind::Help => false,
        }
    }

    const fn decode(raw: u8) -> Self {
        match raw {
            1 => StrictMode::PanicOnError,
            2 => StrictMode::PanicOnWarning,
            _ => StrictMode::Warn,
        }
    }
}

static STRICT_MODE: AtomicU8 = AtomicU8::new(StrictMode::Warn as u8);

/// Set the process-wide strict mode, returning the previous one.
pub fn set_strict_mode(mode: StrictMode) -> StrictMode {
    StrictMode::decode(STRICT_MODE.swap(mode as u8, Ordering::Relaxed))
}

/// Current process-wide strict mode.
pub fn strict_mode() -> StrictMode {
    StrictMode::decode(STRICT_MODE.load(Ordering::Relaxed))
}

/// Apply `FRAMETASK_STRICT` if it is set. Returns the mode now in effect.
pub fn init_from_env() -> StrictMode {
    match StrictMode::from_env() {
        Some(mode) => {
            set_strict_mode(mode);
            mode
        }
        None => strict_mode(),
    }
}

/// Sets a strict mode for a scope and restores the previous one on drop.
#[must_use = "strict mode is restored as soon as the guard is dropped"]
pub struct StrictModeGuard {
    previous: StrictMode,
}

impl StrictModeGuard {
    pub fn new(mode: StrictMode) -> Self {
        Self {
            previous: set_strict_mode(mode),
        }
    }
}

impl Drop for StrictModeGuard {
    fn drop(&mut self) {
        set_strict_mode(self.previous);
    }
}
