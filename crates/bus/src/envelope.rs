//! The event envelope: the full record the bus owns from publish until
//! every matching subscriber reaches a terminal outcome and the entry is
//! evicted from history.

use std::{any::Any, collections::HashMap, fmt, sync::Arc};

use eventbus_core::{EventId, UnixNanos};
use ustr::Ustr;

/// Per-event overrides for retry/persistence behavior. Defaults to whatever
/// the bus-wide [`crate::config::EventBusConfig`] specifies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeliveryPolicy {
    pub retry_enabled: bool,
    pub max_attempts: u32,
    pub persistent: bool,
}

impl DeliveryPolicy {
    #[must_use]
    pub const fn new(retry_enabled: bool, max_attempts: u32, persistent: bool) -> Self {
        Self {
            retry_enabled,
            max_attempts,
            persistent,
        }
    }
}

/// An opaque, black-box payload. The bus never inspects it beyond moving it
/// around; subscribers downcast it back to their own expected type.
#[derive(Clone)]
pub struct Payload(Arc<dyn Any + Send + Sync>);

impl Payload {
    /// Wraps `value` as an opaque payload.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Attempts to downcast the payload back to `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Payload(..)")
    }
}

/// The full event record, owned exclusively by the bus.
///
/// Subscribers receive a read-only [`crate::handler::DeliveryMessage`] view
/// derived from this, never the envelope itself.
#[derive(Clone, Debug)]
pub struct Envelope {
    pub event_id: EventId,
    pub topic: Ustr,
    pub payload: Payload,
    pub metadata: HashMap<String, serde_json::Value>,
    pub published_at: UnixNanos,
    pub scope: String,
    pub publisher_id: Option<String>,
    pub delivery_policy: DeliveryPolicy,
}

impl Envelope {
    /// Creates a new envelope for `topic` carrying `payload`, stamping
    /// `published_at` from `clock` and generating a fresh [`EventId`].
    ///
    /// Assumes `topic` has already been validated by the caller (the
    /// coordinator validates before constructing an envelope).
    pub fn new(
        topic: Ustr,
        payload: Payload,
        published_at: UnixNanos,
        delivery_policy: DeliveryPolicy,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            topic,
            payload,
            metadata: HashMap::new(),
            published_at,
            scope: "global".to_string(),
            publisher_id: None,
            delivery_policy,
        }
    }

    /// Overrides the auto-generated event id with one supplied by the caller.
    #[must_use]
    pub fn with_event_id(mut self, event_id: EventId) -> Self {
        self.event_id = event_id;
        self
    }

    /// Attaches metadata, replacing any previous metadata map.
    #[must_use]
    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Sets a single metadata entry.
    #[must_use]
    pub fn with_metadata_entry(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    #[must_use]
    pub fn with_publisher(mut self, publisher_id: impl Into<String>) -> Self {
        self.publisher_id = Some(publisher_id.into());
        self
    }
}
