//! Diagnostics sink for non-fatal conversion errors.
//!
//! Decoding a script result never fails outright because of one bad field.
//! Instead the field keeps its prior value and a [`Diagnostic`] is handed to
//! the injected [`DiagnosticsSink`]. The default sink logs through `tracing`;
//! tests and callers that need counts use [`CollectingSink`].

use crate::codec::ConversionError;
use std::sync::{Mutex, PoisonError};

/// A non-fatal conversion error together with where it happened.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Path into the dynamic tree, e.g. `resourceMetrics[0].resource.attributes.host`.
    pub path: String,
    /// What went wrong.
    pub error: ConversionError,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.error)
    }
}

/// Receives diagnostics produced while decoding.
pub trait DiagnosticsSink: Send + Sync {
    /// Records one diagnostic.
    fn report(&self, diagnostic: Diagnostic);
}

/// Sink that emits every diagnostic as a `tracing` warning.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn report(&self, diagnostic: Diagnostic) {
        tracing::warn!(
            path = %diagnostic.path,
            error = %diagnostic.error,
            "Ignored unconvertible field in script result"
        );
    }
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    fn report(&self, _diagnostic: Diagnostic) {}
}

/// Sink that keeps diagnostics in memory.
///
/// # Example
///
/// ```
/// use shared::diagnostics::{CollectingSink, Diagnostic, DiagnosticsSink};
/// use shared::codec::ConversionError;
///
/// let sink = CollectingSink::new();
/// sink.report(Diagnostic {
///     path: "value".to_string(),
///     error: ConversionError::UnsupportedScalarType { found: "string" },
/// });
/// assert_eq!(sink.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct CollectingSink {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of collected diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Removes and returns everything collected so far.
    #[must_use]
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Diagnostic>> {
        // A panic while holding the lock cannot leave the Vec half-written.
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl DiagnosticsSink for CollectingSink {
    fn report(&self, diagnostic: Diagnostic) {
        self.lock().push(diagnostic);
    }
}
