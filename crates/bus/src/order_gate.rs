//! Per-`(publisher, topic, subscriber)` ordering gates.
//!
//! A gate is a single-slot async mutex keyed by delivery triple. Whoever
//! holds the guard owns the right to be "the in-flight item" for that
//! triple; the guard travels with the item from its first dispatch attempt
//! through every retry and is only dropped once the item reaches a
//! terminal outcome. That is what gives `(publisher, topic, subscriber)`
//! in-order delivery even across retries: a fresh publish for the same
//! triple cannot be attempted until the previous one's guard is released.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, TryLockError};
use ustr::Ustr;

use crate::handler::SubscriberId;

pub type GateKey = (Option<String>, Ustr, SubscriberId);

#[derive(Default)]
pub struct OrderGates {
    slots: DashMap<GateKey, Arc<Mutex<()>>>,
}

impl OrderGates {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: GateKey) -> Arc<Mutex<()>> {
        self.slots.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Attempts to claim the gate for `key` without waiting. Used on the
    /// common, uncontended publish path so `Overloaded` can still be
    /// reported synchronously to the caller.
    pub fn try_acquire(&self, key: GateKey) -> Result<OwnedMutexGuard<()>, TryLockError> {
        self.slot(key).try_lock_owned()
    }

    /// Waits for the gate for `key`, however long an earlier item for the
    /// same triple takes to reach a terminal outcome.
    pub async fn acquire(&self, key: GateKey) -> OwnedMutexGuard<()> {
        self.slot(key).lock_owned().await
    }
}
