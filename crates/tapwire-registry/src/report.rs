//! Error reporting seam.
//!
//! Structural failures (a broken unwrap accessor, a runaway decorator chain)
//! are reported exactly once through this seam and returned to the caller;
//! they are never retried and never fatal to the process. A missing registry
//! entry is a normal outcome and is never reported.

use std::error::Error;

/// Sink for structural resolution failures.
///
/// Implementations must record the failure and return; they must never block
/// or panic back into the caller.
pub trait ErrorReporter: Send + Sync {
    /// Record one failure with the context it occurred in.
    fn report(&self, context: &str, error: &(dyn Error + 'static));
}

/// Reporter that forwards failures to the active `tracing` subscriber.
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, context: &str, error: &(dyn Error + 'static)) {
        tracing::error!(context, error = %error, "connection resolution failure");
    }
}
