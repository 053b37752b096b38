//! Diagnostic emission backend.
//!
//! Handles outputting diagnostics to stderr, the `log` crate, or a custom sink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use super::kind::Diagnostic;
use super::strict::strict_mode;
use crate::sync::mutex::Mutex;

/// Global flag to suppress diagnostic output (for testing).
static DIAGNOSTICS_SUPPRESSED: AtomicBool = AtomicBool::new(false);

/// Global flag to enable verbose diagnostics.
static VERBOSE_DIAGNOSTICS: AtomicBool = AtomicBool::new(false);

/// Optional sink that receives every diagnostic, suppressed or not.
static SINK: RwLock<Option<Arc<dyn DiagnosticSink>>> = RwLock::new(None);

/// Suppress all diagnostic output.
pub fn suppress_diagnostics(suppress: bool) {
    DIAGNOSTICS_SUPPRESSED.store(suppress, Ordering::Relaxed);
}

/// Enable verbose diagnostic output.
pub fn set_verbose(verbose: bool) {
    VERBOSE_DIAGNOSTICS.store(verbose, Ordering::Relaxed);
}

/// Check if diagnostics are suppressed.
pub fn is_suppressed() -> bool {
    DIAGNOSTICS_SUPPRESSED.load(Ordering::Relaxed)
}

/// Install a sink that observes every emitted diagnostic.
///
/// Returns the previously installed sink, if any.
pub fn set_sink(sink: Option<Arc<dyn DiagnosticSink>>) -> Option<Arc<dyn DiagnosticSink>> {
    let mut slot = SINK.write().unwrap_or_else(|e| e.into_inner());
    std::mem::replace(&mut *slot, sink)
}

/// Emit a diagnostic.
///
/// Output goes to the `log` crate when the `log` feature is enabled,
/// otherwise to stderr in debug builds or with the `diagnostics` feature.
pub fn emit(diag: &Diagnostic) {
    dispatch(diag, None);
}

/// Emit a diagnostic with additional runtime context.
pub fn emit_with_context(diag: &Diagnostic, context: &str) {
    dispatch(diag, Some(context));
}

fn dispatch(diag: &Diagnostic, context: Option<&str>) {
    if let Some(sink) = SINK.read().unwrap_or_else(|e| e.into_inner()).as_ref() {
        sink.emit(diag, context);
    }

    if !is_suppressed() {
        #[cfg(feature = "log")]
        emit_to_log(diag, context);

        #[cfg(all(not(feature = "log"), any(debug_assertions, feature = "diagnostics")))]
        emit_to_stderr(diag, context);
    }

    if strict_mode().is_fatal(diag.kind) {
        panic!(
            "[frametask][{}] {}\nStrict mode enabled - diagnostics are fatal.",
            diag.code, diag.message
        );
    }
}

/// Internal: emit to stderr.
#[cfg(all(not(feature = "log"), any(debug_assertions, feature = "diagnostics")))]
fn emit_to_stderr(diag: &Diagnostic, context: Option<&str>) {
    use super::kind::DiagnosticKind;
    use std::io::Write;

    let mut stderr = std::io::stderr().lock();
    let verbose = VERBOSE_DIAGNOSTICS.load(Ordering::Relaxed);

    let _ = writeln!(
        stderr,
        "[frametask][{}] {}: {}",
        diag.code,
        diag.kind.prefix(),
        diag.message
    );

    if let Some(context) = context {
        let _ = writeln!(stderr, "  context: {}", context);
    }
    if let Some(note) = diag.note {
        let _ = writeln!(stderr, "  note: {}", note);
    }
    if let Some(help) = diag.help {
        let _ = writeln!(stderr, "  help: {}", help);
    }

    if verbose && diag.kind == DiagnosticKind::Error {
        let _ = writeln!(stderr, "  hint: set RUST_BACKTRACE=1 for a backtrace");
    }

    let _ = writeln!(stderr);
}

/// Emit a diagnostic using the log crate.
#[cfg(feature = "log")]
fn emit_to_log(diag: &Diagnostic, context: Option<&str>) {
    use super::kind::DiagnosticKind;

    let context = context.unwrap_or("");
    match diag.kind {
        DiagnosticKind::Error => {
            log::error!("[{}] {} {}", diag.code, diag.message, context);
        }
        DiagnosticKind::Warning => {
            log::warn!("[{}] {} {}", diag.code, diag.message, context);
        }
        DiagnosticKind::Note | DiagnosticKind::Help => {
            log::info!("[{}] {} {}", diag.code, diag.message, context);
        }
    }

    if let Some(note) = diag.note {
        log::info!("  note: {}", note);
    }
    if let Some(help) = diag.help {
        log::info!("  help: {}", help);
    }
}

/// A diagnostic sink trait for custom output.
pub trait DiagnosticSink: Send + Sync {
    /// Handle a diagnostic and its optional runtime context.
    fn emit(&self, diag: &Diagnostic, context: Option<&str>);
}

/// A simple sink that collects diagnostics.
#[derive(Default)]
pub struct CollectingSink {
    records: Mutex<Vec<(Diagnostic, Option<String>)>>,
}

impl CollectingSink {
    /// Create a new collecting sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected diagnostics.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.records.lock().iter().map(|(d, _)| d.clone()).collect()
    }

    /// Check whether a diagnostic with the given code was collected.
    pub fn has_code(&self, code: &str) -> bool {
        self.records.lock().iter().any(|(d, _)| d.code == code)
    }

    /// Context string of the first diagnostic with the given code.
    pub fn context_for(&self, code: &str) -> Option<String> {
        self.records
            .lock()
            .iter()
            .find(|(d, _)| d.code == code)
            .and_then(|(_, ctx)| ctx.clone())
    }

    /// Clear collected diagnostics.
    pub fn clear(&self) {
        self.records.lock().clear();
    }

    /// Check if any errors were collected.
    pub fn has_errors(&self) -> bool {
        self.records.lock().iter().any(|(d, _)| d.is_error())
    }
}

impl DiagnosticSink for CollectingSink {
    fn emit(&self, diag: &Diagnostic, context: Option<&str>) {
        self.records
            .lock()
            .push((diag.clone(), context.map(str::to_owned)));
    }
}
