use std::time::Duration;

use bulwark_common::ContextError;

/// Everything that can stop a protected call from producing its primary result.
///
/// All variants except [`ResilienceError::FallbackFailed`] are absorbed by
/// [`crate::ResilientExecutor`] and handed to the fallback instead of the caller.
#[derive(Debug, thiserror::Error)]
pub enum ResilienceError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("bulkhead '{dependency}' rejected work: {workers} workers and {queue_capacity} queue slots in use")]
    BulkheadRejected {
        dependency: String,
        workers: usize,
        queue_capacity: usize,
    },

    #[error("call to '{dependency}' timed out after {}ms", timeout.as_millis())]
    CallTimeout {
        dependency: String,
        timeout: Duration,
    },

    #[error("call to '{dependency}' failed: {message}")]
    DependencyFailure { dependency: String, message: String },

    #[error("circuit for '{dependency}' is open")]
    CircuitOpen { dependency: String },

    #[error("fallback for '{dependency}' failed after {cause}: {message}")]
    FallbackFailed {
        dependency: String,
        cause: Box<ResilienceError>,
        message: String,
    },
}

impl ResilienceError {
    pub fn dependency(&self) -> Option<&str> {
        match self {
            ResilienceError::Context(_) => None,
            ResilienceError::BulkheadRejected { dependency, .. }
            | ResilienceError::CallTimeout { dependency, .. }
            | ResilienceError::DependencyFailure { dependency, .. }
            | ResilienceError::CircuitOpen { dependency }
            | ResilienceError::FallbackFailed { dependency, .. } => Some(dependency),
        }
    }

    /// Short machine-readable label, used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ResilienceError::Context(_) => "invalid_context",
            ResilienceError::BulkheadRejected { .. } => "bulkhead_rejected",
            ResilienceError::CallTimeout { .. } => "timeout",
            ResilienceError::DependencyFailure { .. } => "failure",
            ResilienceError::CircuitOpen { .. } => "circuit_open",
            ResilienceError::FallbackFailed { .. } => "fallback_failed",
        }
    }
}
