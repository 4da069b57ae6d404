//! Limits and cancellation shared by one backend's evaluations

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Call depth allowed when nothing else is configured
pub const DEFAULT_MAX_CALL_DEPTH: usize = 1000;

/// What every evaluation run by a backend is allowed to do.
///
/// Clones share the cancellation flag: an [`EagerExecutor`] hands a clone to
/// each evaluation it starts, and cancelling through the executor stops all
/// of them at their next node.
///
/// [`EagerExecutor`]: crate::EagerExecutor
#[derive(Debug, Clone)]
pub struct EvalContext {
    /// Closure calls allowed to be active at once
    pub max_call_depth: usize,

    /// Emit a `trace!` event per evaluated node
    pub trace: bool,

    cancelled: Arc<AtomicBool>,
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::with_max_call_depth(DEFAULT_MAX_CALL_DEPTH)
    }
}

impl EvalContext {
    /// Default limits, not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit nested closure calls to `max_call_depth`.
    pub fn with_max_call_depth(max_call_depth: usize) -> Self {
        Self {
            max_call_depth,
            trace: false,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Turn per-node tracing on or off.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Whether evaluations should stop.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Stop running evaluations and refuse new ones until [`resume`](Self::resume).
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Allow evaluations again.
    pub fn resume(&self) {
        self.cancelled.store(false, Ordering::Relaxed);
    }
}
