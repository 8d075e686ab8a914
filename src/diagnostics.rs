use std::io::Write;

use crate::error::DeliveryError;

/// Fallback channel that receives delivery failures.
///
/// Implementations must not panic. They may log through `tracing`: the
/// dispatcher's re-entrancy guard stops such reports from looping back
/// into delivery.
pub trait Diagnostics: Send + Sync {
    fn report(&self, target: &str, error: &DeliveryError);
}

/// Writes failures to the process' standard error.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrDiagnostics;

impl Diagnostics for StderrDiagnostics {
    fn report(&self, target: &str, error: &DeliveryError) {
        // `eprintln!` panics if stderr is gone, a failed write is ignored instead.
        let _ = writeln!(std::io::stderr().lock(), "error in send to {}. e: {}", target, error);
    }
}

/// Emits failures as `tracing` warnings so other layers (console, fmt)
/// can display them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn report(&self, target: &str, error: &DeliveryError) {
        tracing::warn!(target: "envelope_log_sink::diagnostics", sink = target, error = %error, "log delivery failed");
    }
}
