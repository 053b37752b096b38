//! Diagnostic kinds and core types.
//!
//! Mirrors rustc's diagnostic levels for familiar UX.

/// The severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A hard error - something is definitely wrong.
    Error,
    /// A warning - something is probably wrong or suboptimal.
    Warning,
    /// Additional context about another diagnostic.
    Note,
    /// Actionable suggestion to fix the issue.
    Help,
}

impl DiagnosticKind {
    /// Get the display prefix for this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            DiagnosticKind::Error => "error",
            DiagnosticKind::Warning => "warning",
            DiagnosticKind::Note => "note",
            DiagnosticKind::Help => "help",
        }
    }
}

/// A diagnostic message with code, message, and optional context.
///
/// Diagnostic codes follow the pattern:
/// - `FT0xx` - Frame arena issues
/// - `FT1xx` - Scheduler configuration
/// - `FT2xx` - Task execution
/// - `FT3xx` - Pool allocator misuse
/// - `FT9xx` - Internal errors
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity level.
    pub kind: DiagnosticKind,
    /// Diagnostic code (e.g., "FT001").
    pub code: &'static str,
    /// Primary message.
    pub message: &'static str,
    /// Optional additional context.
    pub note: Option<&'static str>,
    /// Optional fix suggestion.
    pub help: Option<&'static str>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub const fn error(code: &'static str, message: &'static str) -> Self {
        Self {
            kind: DiagnosticKind::Error,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Create a new warning diagnostic.
    pub const fn warning(code: &'static str, message: &'static str) -> Self {
        Self {
            kind: DiagnosticKind::Warning,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Add a note to this diagnostic.
    pub const fn with_note(mut self, note: &'static str) -> Self {
        self.note = Some(note);
        self
    }

    /// Add a help message to this diagnostic.
    pub const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }

    /// Check if this is an error.
    pub fn is_error(&self) -> bool {
        self.kind == DiagnosticKind::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.kind.prefix(), self.message)
    }
}

// =============================================================================
// Predefined diagnostics (FT0xx - Frame arena)
// =============================================================================

/// FT001: Frame allocation larger than one arena block.
pub const FT001: Diagnostic = Diagnostic::error(
    "FT001",
    "frame allocation can never be satisfied"
).with_note("a single frame allocation must fit inside one arena block")
 .with_help("split the data into smaller allocations or raise ArenaConfig::block_size");

/// FT002: Frame allocation with an unsupported alignment.
pub const FT002: Diagnostic = Diagnostic::error(
    "FT002",
    "frame allocation requires alignment above 16 bytes"
).with_note("arena blocks only guarantee 16-byte alignment")
 .with_help("store over-aligned types in a pool or on the heap");

// =============================================================================
// Predefined diagnostics (FT1xx - Scheduler configuration)
// =============================================================================

/// FT101: Scheduler started without workers.
pub const FT101: Diagnostic = Diagnostic::warning(
    "FT101",
    "scheduler started with zero workers"
).with_note("appended tasks will stay pending forever")
 .with_help("use SchedulerConfig::with_workers(n) with n > 0");

// =============================================================================
// Predefined diagnostics (FT2xx - Task execution)
// =============================================================================

/// FT201: A task's run body panicked on its worker.
pub const FT201: Diagnostic = Diagnostic::error(
    "FT201",
    "task run body panicked"
).with_note("the task counts as completed but its join phase is skipped")
 .with_help("handle failures inside the run body and report them through join");

/// FT202: A panicked task was discarded at shutdown.
pub const FT202: Diagnostic = Diagnostic::warning(
    "FT202",
    "panicked task discarded during shutdown"
).with_note("its join phase was not executed");

// =============================================================================
// Predefined diagnostics (FT3xx - Pool allocator)
// =============================================================================

/// FT301: Stale or foreign pool handle.
pub const FT301: Diagnostic = Diagnostic::warning(
    "FT301",
    "pool slot freed twice or freed into the wrong pool"
).with_note("the slot's generation does not match the handle")
 .with_help("free each slot exactly once, into the pool that issued it");

// =============================================================================
// Predefined diagnostics (FT9xx - Internal)
// =============================================================================

/// FT901: Worker thread could not be spawned.
pub const FT901: Diagnostic = Diagnostic::error(
    "FT901",
    "failed to spawn worker thread"
).with_note("the operating system refused to create another thread")
 .with_help("lower SchedulerConfig::worker_count or the thread stack size");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predefined_kinds() {
        assert!(FT001.is_error());
        assert!(!FT301.is_error());
        assert_eq!(FT201.code, "FT201");
    }

    #[test]
    fn test_display() {
        assert_eq!(
            FT101.to_string(),
            "[FT101] warning: scheduler started with zero workers"
        );
    }
}
