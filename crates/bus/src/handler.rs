//! Subscriber-facing types: the delivery contract, the message subscribers
//! actually receive, and the identity/address split called out in the
//! design notes — identity is what the Registry dedupes on, address is
//! where deliveries actually go.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use eventbus_core::EventId;
use serde::{Deserialize, Serialize};
use ustr::Ustr;

use crate::envelope::{Envelope, Payload};

/// Uniquely identifies a subscriber in the Registry, independent of where
/// deliveries for it are currently addressed.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriberId(Ustr);

impl SubscriberId {
    pub fn new<T: AsRef<str>>(value: T) -> Self {
        Self(Ustr::from(value.as_ref()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriberId({})", self.0)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<T: AsRef<str>> From<T> for SubscriberId {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

/// The structured message a subscriber actually receives. No additional
/// framing is imposed beyond these four fields.
#[derive(Clone, Debug)]
pub struct DeliveryMessage {
    pub topic: Ustr,
    pub payload: Payload,
    pub metadata: std::collections::HashMap<String, serde_json::Value>,
    pub event_id: EventId,
}

impl DeliveryMessage {
    #[must_use]
    pub fn from_envelope(envelope: &Envelope) -> Self {
        Self {
            topic: envelope.topic,
            payload: envelope.payload.clone(),
            metadata: envelope.metadata.clone(),
            event_id: envelope.event_id,
        }
    }

    /// Tags this message as a history replay delivery, per the
    /// `replay: true` metadata flag the coordinator adds on subscribe.
    #[must_use]
    pub fn mark_replay(mut self) -> Self {
        self.metadata
            .insert("replay".to_string(), serde_json::Value::Bool(true));
        self
    }
}

/// The outcome of one delivery attempt, as classified by the dispatcher.
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// The runtime reports the send completed and the subscriber is alive.
    Success,
    /// The runtime reports the subscriber is no longer alive. Never retried;
    /// cleanup happens via the subscriber's liveness watch.
    Dead,
    /// Timeout or any other recoverable failure; eligible for retry.
    Transient(String),
}

/// The address side of a subscription: something deliveries can actually be
/// sent to. Implemented by whatever runtime primitive the host uses —
/// an async task's channel, an actor mailbox, a test stub.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Attempts one delivery. Must not block beyond its own internal logic;
    /// the dispatcher applies the per-attempt timeout externally.
    async fn deliver(&self, message: DeliveryMessage) -> DeliveryOutcome;
}

/// A shareable, clonable handle to a subscriber's address.
#[derive(Clone)]
pub struct SubscriberHandle(pub Arc<dyn Subscriber>);

impl fmt::Debug for SubscriberHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberHandle").finish_non_exhaustive()
    }
}

impl<T: Subscriber + 'static> From<Arc<T>> for SubscriberHandle {
    fn from(value: Arc<T>) -> Self {
        Self(value)
    }
}
