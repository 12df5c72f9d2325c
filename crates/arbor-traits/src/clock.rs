//! Clock collaborators.
//!
//! Maturity is a logical precondition evaluated against whatever clock the
//! engine was built with. Production uses [`SystemClock`]; tests and
//! simulations drive a [`ManualClock`] forward deterministically.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use arbor_core::Timestamp;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time from the system, in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_datetime(chrono::Utc::now())
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same reading, so a test can keep a handle and advance
/// time after moving a clone into the engine.
///
/// # Example
///
/// ```rust
/// use arbor_core::Timestamp;
/// use arbor_traits::{Clock, ManualClock};
///
/// let clock = ManualClock::new(Timestamp::from_secs(1_000));
/// let handle = clock.clone();
/// handle.advance_days(1);
/// assert_eq!(clock.now().as_secs(), 1_000 + 86_400);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    /// Creates a clock reading `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start.as_secs())),
        }
    }

    /// Sets the current time.
    pub fn set(&self, now: Timestamp) {
        self.now.store(now.as_secs(), Ordering::SeqCst);
    }

    /// Moves time forward (or backward, for negative values) by `secs`.
    ///
    /// Saturates at the ends of the `i64` range.
    pub fn advance_secs(&self, secs: i64) {
        let _ = self
            .now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
                Some(now.saturating_add(secs))
            });
    }

    /// Moves time forward by whole days.
    pub fn advance_days(&self, days: i64) {
        self.advance_secs(days.saturating_mul(arbor_core::types::SECONDS_PER_DAY));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_secs(self.now.load(Ordering::SeqCst))
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}
