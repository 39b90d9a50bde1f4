//! Explicit fan-in barrier

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Countdown over a fixed number of branch arrivals
///
/// Each branch arrives exactly once, after writing its result slot. The
/// arrival uses release ordering and the waiter acquire ordering, so every
/// slot written before an arrival is visible once [`wait`](Self::wait)
/// returns.
#[derive(Debug)]
pub struct FanInBarrier {
    expected: usize,
    remaining: AtomicUsize,
    notify: Notify,
}

impl FanInBarrier {
    /// Barrier expecting `expected` arrivals
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            remaining: AtomicUsize::new(expected),
            notify: Notify::new(),
        }
    }

    /// Total arrivals expected
    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Arrivals still outstanding
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Record one arrival
    ///
    /// Returns `true` for the last arrival. Extra arrivals are ignored.
    pub fn arrive(&self) -> bool {
        let previous = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        match previous {
            Ok(1) => {
                self.notify.notify_waiters();
                true
            }
            Ok(_) => false,
            Err(_) => {
                tracing::warn!(expected = self.expected, "Barrier arrival after completion ignored");
                false
            }
        }
    }

    /// Arrival that fires when dropped, including during a panic unwind
    pub fn arrival(self: &Arc<Self>) -> ArrivalGuard {
        ArrivalGuard {
            barrier: Arc::clone(self),
        }
    }

    /// Wait until every branch arrived
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.remaining.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Arrives at its barrier on drop
#[derive(Debug)]
pub struct ArrivalGuard {
    barrier: Arc<FanInBarrier>,
}

impl Drop for ArrivalGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            tracing::error!("Branch task panicked before recording a result");
        }
        self.barrier.arrive();
    }
}
