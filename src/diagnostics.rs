//! Non-fatal diagnostics
//!
//! Lossy wire intake, enum shortcut shadowing and deprecated API use are
//! reported through a [`DiagnosticSink`] instead of failing the operation.
//! The default sink forwards to `tracing`. A process-wide sink can be
//! installed with [`install_sink`], and [`capture`] collects everything
//! reported on the current thread while a closure runs.

use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

/// Kind of non-fatal condition that was reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Information was dropped while reading a wire message.
    LossyIntake,
    /// A generated shortcut was not installed because the name was taken.
    Shadowed,
    /// A deprecated construct was used.
    Deprecated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Receiver for non-fatal diagnostics.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: &Diagnostic);
}

/// Default sink: one `warn` line per diagnostic.
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: &Diagnostic) {
        tracing::warn!(kind = ?diagnostic.kind, "{}", diagnostic.message);
    }
}

/// Sink that discards everything.
#[derive(Debug, Clone, Default)]
pub struct NoOpSink;

impl DiagnosticSink for NoOpSink {
    fn report(&self, _diagnostic: &Diagnostic) {}
}

static GLOBAL_SINK: Lazy<RwLock<Arc<dyn DiagnosticSink>>> =
    Lazy::new(|| RwLock::new(Arc::new(TracingSink)));

thread_local! {
    static CAPTURE: RefCell<Vec<Vec<Diagnostic>>> = const { RefCell::new(Vec::new()) };
}

/// Replace the process-wide sink.
pub fn install_sink(sink: Arc<dyn DiagnosticSink>) {
    match GLOBAL_SINK.write() {
        Ok(mut guard) => *guard = sink,
        Err(poisoned) => *poisoned.into_inner() = sink,
    }
}

/// Report a diagnostic to the innermost capture on this thread, or to the
/// process-wide sink when nothing is capturing.
pub fn report(kind: DiagnosticKind, message: impl Into<String>) {
    let diagnostic = Diagnostic {
        kind,
        message: message.into(),
    };
    let captured = CAPTURE.with(|stack| match stack.borrow_mut().last_mut() {
        Some(frame) => {
            frame.push(diagnostic.clone());
            true
        }
        None => false,
    });
    if captured {
        return;
    }
    let sink = match GLOBAL_SINK.read() {
        Ok(guard) => Arc::clone(&guard),
        Err(poisoned) => Arc::clone(&poisoned.into_inner()),
    };
    sink.report(&diagnostic);
}

/// Run `f` and return its result together with all diagnostics it reported
/// on the current thread.
pub fn capture<R>(f: impl FnOnce() -> R) -> (R, Vec<Diagnostic>) {
    CAPTURE.with(|stack| stack.borrow_mut().push(Vec::new()));
    let result = f();
    let diagnostics = CAPTURE.with(|stack| stack.borrow_mut().pop().unwrap_or_default());
    (result, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_collects_reports() {
        let ((), diagnostics) = capture(|| {
            report(DiagnosticKind::Shadowed, "first");
            report(DiagnosticKind::LossyIntake, "second");
        });
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::Shadowed);
        assert_eq!(diagnostics[1].message, "second");
    }

    #[test]
    fn test_nested_capture_is_scoped() {
        let (inner, outer) = capture(|| {
            report(DiagnosticKind::Deprecated, "outer");
            let ((), inner) = capture(|| report(DiagnosticKind::Deprecated, "inner"));
            inner
        });
        assert_eq!(inner.len(), 1);
        assert_eq!(inner[0].message, "inner");
        assert_eq!(outer.len(), 1);
        assert_eq!(outer[0].message, "outer");
    }
}
