//! The retry scheduler: computes backoff delays for failed deliveries and
//! holds them until they come due, handing exhausted attempts off to the
//! dead-letter path instead of scheduling another round.
//!
//! The backoff shape (base interval, factor-free fixed-vs-exponential
//! split, capped max interval, bounded jitter) follows the same contract as
//! the corpus's own exponential-backoff helper for reconnect delays, adapted
//! here to per-delivery retry rather than per-connection retry and to the
//! two strategies this bus exposes in its configuration.

use std::{cmp::Ordering, collections::BinaryHeap, time::Duration};

use rand::Rng;
use tokio::sync::OwnedMutexGuard;

use crate::{
    config::BackoffStrategy,
    envelope::Envelope,
    handler::{SubscriberHandle, SubscriberId},
};

/// One envelope still owed a delivery attempt to one subscriber.
///
/// Carries the ordering gate it was handed on its first dispatch attempt;
/// it stays held across every retry and is only dropped on a terminal
/// outcome (success, dead, or dead-lettered here on exhaustion).
pub struct RetryItem {
    pub envelope: Envelope,
    pub subscriber_id: SubscriberId,
    pub subscriber: SubscriberHandle,
    pub attempts_so_far: u32,
    pub last_error: Option<String>,
    pub gate: OwnedMutexGuard<()>,
}

struct Pending {
    next_attempt_at_ns: u64,
    sequence: u64,
    item: RetryItem,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.next_attempt_at_ns == other.next_attempt_at_ns && self.sequence == other.sequence
    }
}
impl Eq for Pending {}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so `BinaryHeap` (a max-heap) pops the earliest-due item first.
        other
            .next_attempt_at_ns
            .cmp(&self.next_attempt_at_ns)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}
impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The decision the scheduler makes when asked to schedule a failed attempt.
pub enum ScheduleDecision {
    /// Another attempt was queued for `next_attempt_at_ns`.
    Scheduled { next_attempt_at_ns: u64 },
    /// `attempts_so_far` had already reached the configured maximum; the
    /// item was handed to the dead-letter path instead.
    DeadLettered(RetryItem),
}

/// Time-ordered queue of retries awaiting their next attempt.
pub struct RetryScheduler {
    strategy: BackoffStrategy,
    base_interval_ms: u64,
    max_interval_ms: u64,
    max_attempts: u32,
    queue: BinaryHeap<Pending>,
    sequence: u64,
}

impl RetryScheduler {
    #[must_use]
    pub fn new(
        strategy: BackoffStrategy,
        base_interval_ms: u64,
        max_interval_ms: u64,
        max_attempts: u32,
    ) -> Self {
        Self {
            strategy,
            base_interval_ms,
            max_interval_ms,
            max_attempts,
            queue: BinaryHeap::new(),
            sequence: 0,
        }
    }

    /// Computes the base delay (before jitter) for a retry counted by
    /// `attempts_so_far` attempts already made (1 for the first retry),
    /// per `delay = base * 2^(attempts_so_far - 1)`, capped at
    /// `max_interval_ms`.
    #[must_use]
    pub fn base_delay(&self, attempts_so_far: u32) -> Duration {
        let base_ms = match self.strategy {
            BackoffStrategy::Fixed => self.base_interval_ms,
            BackoffStrategy::Exponential => {
                let exponent = attempts_so_far.saturating_sub(1).min(32);
                let factor = 2u64.saturating_pow(exponent);
                self.base_interval_ms.saturating_mul(factor)
            }
        };
        Duration::from_millis(base_ms.min(self.max_interval_ms))
    }

    /// Applies up to ±20% jitter to `base`, never returning a negative delay.
    fn jittered(base: Duration) -> Duration {
        let base_ms = base.as_millis() as i64;
        let spread = (base_ms / 5).max(1);
        let offset = rand::rng().random_range(-spread..=spread);
        let jittered_ms = (base_ms + offset).max(0);
        Duration::from_millis(jittered_ms as u64)
    }

    /// Schedules the next attempt for `item`, or dead-letters it if
    /// `item.attempts_so_far` has already reached the configured maximum.
    ///
    /// `now_ns` is the current time; the caller (the dispatcher) owns the
    /// clock so this scheduler stays independently testable.
    pub fn schedule(&mut self, item: RetryItem, now_ns: u64) -> ScheduleDecision {
        if item.attempts_so_far >= self.max_attempts {
            return ScheduleDecision::DeadLettered(item);
        }

        let delay = Self::jittered(self.base_delay(item.attempts_so_far));
        let next_attempt_at_ns = now_ns.saturating_add(delay.as_nanos() as u64);

        self.sequence += 1;
        self.queue.push(Pending {
            next_attempt_at_ns,
            sequence: self.sequence,
            item,
        });

        ScheduleDecision::Scheduled {
            next_attempt_at_ns,
        }
    }

    /// Removes and returns every item whose `next_attempt_at_ns <= now_ns`,
    /// in ascending due-time order.
    pub fn drain_due(&mut self, now_ns: u64) -> Vec<RetryItem> {
        let mut due = Vec::new();
        while let Some(top) = self.queue.peek() {
            if top.next_attempt_at_ns > now_ns {
                break;
            }
            due.push(self.queue.pop().expect("peeked Some above").item);
        }
        due
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}
