//! The storage adapter seam: a narrow trait the bus calls through for
//! durability, mirroring the corpus's own database-facade trait but shaped
//! around this bus's three actual persistence needs instead of a generic
//! key/payload store.
//!
//! Ships with two implementations: an in-memory one good enough for tests
//! and single-process deployments that still want crash visibility into
//! pending/dead events, and a no-op one for when persistence is switched
//! off entirely.

use std::sync::Mutex;

use async_trait::async_trait;
use eventbus_core::EventId;

use crate::{envelope::Envelope, error::EventBusError};

/// A durability seam for the bus. Implementations back this onto whatever
/// store fits the deployment; the bus itself only ever calls these three
/// methods.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Persists `envelope` before it is handed to subscribers.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PersistFailed`] if the write could not be
    /// durably completed. A failure here must fail the publish that
    /// triggered it with no fan-out, per this bus's persistence contract.
    async fn persist_event(&self, envelope: &Envelope) -> Result<(), EventBusError>;

    /// Loads envelopes that were persisted but never reached a terminal
    /// delivery outcome before the process last stopped.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PersistFailed`] if the backing store could
    /// not be read.
    async fn load_pending(&self) -> Result<Vec<Envelope>, EventBusError>;

    /// Records that `event_id` was moved to the dead-letter path for
    /// `subscriber_id` after exhausting its retry budget.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PersistFailed`] if the write could not be
    /// durably completed.
    async fn record_dead_letter(
        &self,
        event_id: EventId,
        subscriber_id: &str,
        reason: &str,
    ) -> Result<(), EventBusError>;
}

/// A non-durable [`StorageAdapter`] for deployments that never enable
/// persistence: every call succeeds and reports nothing pending.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStorage;

#[async_trait]
impl StorageAdapter for NoopStorage {
    async fn persist_event(&self, _envelope: &Envelope) -> Result<(), EventBusError> {
        Ok(())
    }

    async fn load_pending(&self) -> Result<Vec<Envelope>, EventBusError> {
        Ok(Vec::new())
    }

    async fn record_dead_letter(
        &self,
        _event_id: EventId,
        _subscriber_id: &str,
        _reason: &str,
    ) -> Result<(), EventBusError> {
        Ok(())
    }
}

struct DeadLetterRecord {
    event_id: EventId,
    subscriber_id: String,
    reason: String,
}

/// A process-local [`StorageAdapter`] backed by plain `Vec`s behind a
/// mutex. Pending events are retained until the caller drains them via
/// [`InMemoryStorage::take_pending`]; dead letters are retained for
/// inspection via [`InMemoryStorage::dead_letters`].
#[derive(Default)]
pub struct InMemoryStorage {
    pending: Mutex<Vec<Envelope>>,
    dead_letters: Mutex<Vec<DeadLetterRecord>>,
}

impl InMemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns everything currently marked pending, intended
    /// for use right after a successful or dead-lettered terminal outcome.
    pub fn clear_pending(&self, event_id: EventId) {
        self.pending
            .lock()
            .expect("pending events mutex poisoned")
            .retain(|envelope| envelope.event_id != event_id);
    }

    #[must_use]
    pub fn dead_letter_count(&self) -> usize {
        self.dead_letters
            .lock()
            .expect("dead letter mutex poisoned")
            .len()
    }
}

#[async_trait]
impl StorageAdapter for InMemoryStorage {
    async fn persist_event(&self, envelope: &Envelope) -> Result<(), EventBusError> {
        self.pending
            .lock()
            .expect("pending events mutex poisoned")
            .push(envelope.clone());
        Ok(())
    }

    async fn load_pending(&self) -> Result<Vec<Envelope>, EventBusError> {
        Ok(self
            .pending
            .lock()
            .expect("pending events mutex poisoned")
            .clone())
    }

    async fn record_dead_letter(
        &self,
        event_id: EventId,
        subscriber_id: &str,
        reason: &str,
    ) -> Result<(), EventBusError> {
        self.dead_letters
            .lock()
            .expect("dead letter mutex poisoned")
            .push(DeadLetterRecord {
                event_id,
                subscriber_id: subscriber_id.to_string(),
                reason: reason.to_string(),
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use eventbus_core::UnixNanos;
    use ustr::Ustr;

    use super::*;
    use crate::envelope::{DeliveryPolicy, Payload};

    fn envelope() -> Envelope {
        Envelope::new(
            Ustr::from("order.placed"),
            Payload::new(1u64),
            UnixNanos::from(1u64),
            DeliveryPolicy::new(true, 5, true),
        )
    }

    #[tokio::test]
    async fn test_noop_storage_never_retains_anything() {
        let storage = NoopStorage;
        storage.persist_event(&envelope()).await.unwrap();
        assert!(storage.load_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_storage_tracks_pending_until_cleared() {
        let storage = InMemoryStorage::new();
        let envelope = envelope();
        storage.persist_event(&envelope).await.unwrap();

        let pending = storage.load_pending().await.unwrap();
        assert_eq!(pending.len(), 1);

        storage.clear_pending(envelope.event_id);
        assert!(storage.load_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_storage_records_dead_letters() {
        let storage = InMemoryStorage::new();
        storage
            .record_dead_letter(EventId::new(), "sub-1", "exhausted retries")
            .await
            .unwrap();
        assert_eq!(storage.dead_letter_count(), 1);
    }
}
