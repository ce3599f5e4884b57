//! A strictly-increasing, thread-safe nanosecond clock.
//!
//! # Modes
//!
//! - **Real-time:** syncs with wall-clock time via [`std::time::SystemTime::now`].
//!   A compare-and-exchange loop guarantees that every timestamp observed
//!   from any thread is at least one nanosecond greater than the last, which
//!   is what gives the event envelope's `published_at` its monotonic-per-publisher
//!   guarantee even under concurrent publishers.
//! - **Static:** manually advanced, for deterministic tests.

use std::{
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

use crate::UnixNanos;

/// A monotonic nanosecond clock usable from real-time or static mode.
#[derive(Debug)]
pub struct AtomicClock {
    timestamp_ns: AtomicU64,
    is_realtime: AtomicBool,
}

impl AtomicClock {
    /// Creates a new real-time [`AtomicClock`].
    #[must_use]
    pub fn realtime() -> Self {
        Self {
            timestamp_ns: AtomicU64::new(system_time_ns()),
            is_realtime: AtomicBool::new(true),
        }
    }

    /// Creates a new static [`AtomicClock`] initialized to `time`, useful in tests.
    #[must_use]
    pub fn static_at(time: UnixNanos) -> Self {
        Self {
            timestamp_ns: AtomicU64::new(time.as_u64()),
            is_realtime: AtomicBool::new(false),
        }
    }

    /// Returns the current time, advancing the internal counter at least one
    /// nanosecond past the last value returned by this clock.
    #[must_use]
    pub fn get_time_ns(&self) -> UnixNanos {
        if self.is_realtime.load(Ordering::Relaxed) {
            loop {
                let now = system_time_ns();
                let prev = self.timestamp_ns.load(Ordering::Acquire);
                let next = now.max(prev + 1);
                if self
                    .timestamp_ns
                    .compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    return UnixNanos::from(next);
                }
            }
        } else {
            UnixNanos::from(self.timestamp_ns.load(Ordering::Acquire))
        }
    }

    /// Advances a static clock to `time`. No-op on a real-time clock.
    pub fn set_time(&self, time: UnixNanos) {
        if !self.is_realtime.load(Ordering::Relaxed) {
            self.timestamp_ns.store(time.as_u64(), Ordering::Release);
        }
    }
}

impl Default for AtomicClock {
    fn default() -> Self {
        Self::realtime()
    }
}

fn system_time_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the UNIX epoch")
        .as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_realtime_strictly_increases() {
        let clock = AtomicClock::realtime();
        let first = clock.get_time_ns();
        let second = clock.get_time_ns();
        assert!(second > first);
    }

    #[rstest]
    fn test_static_clock_holds_until_set() {
        let clock = AtomicClock::static_at(UnixNanos::from(10));
        assert_eq!(clock.get_time_ns(), UnixNanos::from(10));
        clock.set_time(UnixNanos::from(20));
        assert_eq!(clock.get_time_ns(), UnixNanos::from(20));
    }

    #[rstest]
    fn test_concurrent_reads_stay_monotonic() {
        let clock = Arc::new(AtomicClock::realtime());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let clock = Arc::clone(&clock);
                thread::spawn(move || {
                    let mut last = UnixNanos::from(0);
                    for _ in 0..200 {
                        let now = clock.get_time_ns();
                        assert!(now > last);
                        last = now;
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
