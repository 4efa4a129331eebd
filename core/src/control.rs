//! Central shutdown token (spec §5 "Cancellation", §4.18 of SPEC_FULL).
//!
//! Every long-lived loop — gateway, shard, network reactor, LFQ worker,
//! price-feed/statistics timers — checks this at the top of each iteration
//! and at suspension points. No component blocks indefinitely: every wait
//! is either timer-bounded or futex-bounded to a wakeup.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop flag. Cheap to clone (wraps an `Arc`); clone once per
/// component at startup.
#[derive(Clone, Default)]
pub struct StopToken {
    stopped: Arc<AtomicBool>,
}

impl StopToken {
    /// Creates a fresh, unset token.
    pub fn new() -> Self {
        Self {
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Requests shutdown. Idempotent.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// True once `stop` has been called by any holder.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_is_visible_to_clones() {
        let token = StopToken::new();
        let clone = token.clone();
        assert!(!clone.is_stopped());
        token.stop();
        assert!(clone.is_stopped());
    }
}
