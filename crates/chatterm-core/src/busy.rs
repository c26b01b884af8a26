//! Busy/idle heuristic.
//!
//! "Busy" means "do not release queued input yet". There is no exact
//! completion signal available from the agent, so the default detector
//! approximates one: a pending permission request, or any log activity
//! within a recency window, counts as busy.
//!
//! This is a timing heuristic, deliberately kept behind a trait with an
//! injectable window so embedders can tune or replace it. Consumers must
//! tolerate false positives (queued input held a little long) and false
//! negatives (input released a little late). Whether brief unrelated log
//! bursts can falsely report busy is a known open question; the heuristic
//! is preserved as-is rather than patched around.

use std::time::{Duration, SystemTime};

/// Replaceable busy signal.
pub trait BusySignal {
    /// Whether queued input should be held back right now.
    fn is_busy(
        &self,
        permission_pending: bool,
        log_modified: Option<SystemTime>,
        now: SystemTime,
    ) -> bool;
}

/// Default detector: pending permission OR log modified within `window`.
#[derive(Debug, Clone)]
pub struct RecencyBusy {
    window: Duration,
}

impl RecencyBusy {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

impl BusySignal for RecencyBusy {
    fn is_busy(
        &self,
        permission_pending: bool,
        log_modified: Option<SystemTime>,
        now: SystemTime,
    ) -> bool {
        if permission_pending {
            return true;
        }
        match log_modified {
            // A clock skew that puts the mtime in the future still reads
            // as recent activity.
            Some(modified) => match now.duration_since(modified) {
                Ok(elapsed) => elapsed < self.window,
                Err(_) => true,
            },
            None => false,
        }
    }
}
