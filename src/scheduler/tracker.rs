//! Outstanding-unit accounting
//!
//! [`Outstanding`] counts units between dispatch and completion. Each unit
//! holds a [`Tracked`] guard; dropping the guard is the only way to
//! decrement, so a unit can never be released twice. The transition to zero
//! wakes the drain wait.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Notify, OwnedSemaphorePermit};

#[derive(Debug, Default)]
pub struct Outstanding {
    count: AtomicUsize,
    signals: AtomicUsize,
    idle: Notify,
}

impl Outstanding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one more outstanding unit
    pub fn track(self: &Arc<Self>) -> Tracked {
        self.count.fetch_add(1, Ordering::AcqRel);
        Tracked {
            tracker: Arc::clone(self),
        }
    }

    /// Units currently outstanding
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// How many times the count has dropped to zero
    pub fn signals(&self) -> usize {
        self.signals.load(Ordering::Acquire)
    }

    /// Wait until no unit is outstanding
    pub async fn wait_idle(&self) {
        loop {
            // Register interest before checking so a release in between is not lost
            let notified = self.idle.notified();
            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn release(&self) {
        let previous = self.count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "outstanding count underflow");
        if previous == 1 {
            self.signals.fetch_add(1, Ordering::AcqRel);
            self.idle.notify_one();
        }
    }
}

/// Guard for one outstanding unit, released on drop
#[derive(Debug)]
pub struct Tracked {
    tracker: Arc<Outstanding>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.tracker.release();
    }
}

/// Everything a dispatched unit holds until it completes
///
/// Dropping it returns the concurrency permit and then releases the unit's
/// share of the outstanding count.
#[derive(Debug)]
pub struct InFlight {
    _permit: OwnedSemaphorePermit,
    _tracked: Tracked,
}

impl InFlight {
    pub fn new(permit: OwnedSemaphorePermit, tracked: Tracked) -> Self {
        Self {
            _permit: permit,
            _tracked: tracked,
        }
    }
}
