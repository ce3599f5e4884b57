//! An in-process publish/subscribe event bus.
//!
//! `EventBus` is a thin facade over five collaborating pieces: a
//! [`pattern`] matcher, a [`history`] ring buffer, a subscription
//! [`registry`], a [`retry`] scheduler, and a [`dispatcher`] worker pool,
//! all serialized through a single [`coordinator::BusCoordinator`]. None of
//! it crosses a process boundary — subscribers live in this address space,
//! identified by a [`handler::SubscriberId`] and reached through a
//! [`handler::Subscriber`] implementation the caller supplies.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use eventbus::{
//!     config::EventBusConfig,
//!     handler::{DeliveryMessage, DeliveryOutcome, Subscriber, SubscriberId},
//!     EventBus, SubscribeOptions,
//! };
//!
//! struct Printer;
//!
//! #[async_trait]
//! impl Subscriber for Printer {
//!     async fn deliver(&self, message: DeliveryMessage) -> DeliveryOutcome {
//!         println!("got an event on {}", message.topic);
//!         DeliveryOutcome::Success
//!     }
//! }
//!
//! # async fn run() {
//! let bus = EventBus::new(EventBusConfig::default());
//! bus.subscribe(
//!     "order.*",
//!     SubscriberId::new("printer"),
//!     Arc::new(Printer),
//!     SubscribeOptions::default(),
//! )
//! .await
//! .unwrap();
//! bus.publish("order.placed", 42i32).await.unwrap();
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod history;
pub mod order_gate;
pub mod pattern;
pub mod registry;
pub mod retry;
pub mod runtime;
pub mod storage;
pub mod telemetry;

use std::sync::Arc;

pub use config::EventBusConfig;
pub use coordinator::{PublishOptions, PublishOutcome, SubscribeOptions};
pub use envelope::{DeliveryPolicy, Payload};
pub use error::EventBusError;
pub use history::ReplayOptions;

use coordinator::BusCoordinator;
use handler::{Subscriber, SubscriberHandle, SubscriberId};
use storage::{InMemoryStorage, StorageAdapter};

/// The public entry point: construct one `EventBus` per process (or per
/// logical namespace) and share it behind an [`Arc`].
pub struct EventBus {
    coordinator: BusCoordinator,
}

impl EventBus {
    /// Builds a bus with an in-memory, non-durable storage adapter.
    #[must_use]
    pub fn new(config: EventBusConfig) -> Self {
        Self::with_storage(config, Arc::new(InMemoryStorage::new()))
    }

    /// Builds a bus backed by a caller-supplied [`StorageAdapter`].
    #[must_use]
    pub fn with_storage(config: EventBusConfig, storage: Arc<dyn StorageAdapter>) -> Self {
        Self {
            coordinator: BusCoordinator::new(config, storage),
        }
    }

    /// Publishes `payload` on `topic` with default delivery options.
    ///
    /// # Errors
    ///
    /// See [`BusCoordinator::publish`].
    pub async fn publish<T: std::any::Any + Send + Sync>(
        &self,
        topic: &str,
        payload: T,
    ) -> Result<PublishOutcome, EventBusError> {
        self.coordinator
            .publish(topic, Payload::new(payload), PublishOptions::default())
            .await
    }

    /// Publishes with full control over metadata, scope, publisher
    /// attribution, and per-event delivery policy.
    ///
    /// # Errors
    ///
    /// See [`BusCoordinator::publish`].
    pub async fn publish_with_options(
        &self,
        topic: &str,
        payload: Payload,
        options: PublishOptions,
    ) -> Result<PublishOutcome, EventBusError> {
        self.coordinator.publish(topic, payload, options).await
    }

    /// Subscribes `subscriber` under `pattern`.
    ///
    /// # Errors
    ///
    /// See [`BusCoordinator::subscribe`].
    pub async fn subscribe<S: Subscriber + 'static>(
        &self,
        pattern: &str,
        id: SubscriberId,
        subscriber: Arc<S>,
        options: SubscribeOptions,
    ) -> Result<(), EventBusError> {
        self.coordinator
            .subscribe(pattern, id, SubscriberHandle::from(subscriber), options)
            .await
    }

    /// Removes `id`'s subscription to `pattern`.
    pub async fn unsubscribe(&self, pattern: &str, id: SubscriberId) {
        self.coordinator.unsubscribe(pattern, id).await;
    }

    /// Removes every subscription `id` holds.
    pub async fn unsubscribe_all(&self, id: SubscriberId) {
        self.coordinator.unsubscribe_all(id).await;
    }

    /// Returns buffered history for `topic`.
    ///
    /// # Errors
    ///
    /// See [`BusCoordinator::get_history`].
    pub async fn get_history(
        &self,
        topic: &str,
        options: ReplayOptions,
    ) -> Result<Vec<envelope::Envelope>, EventBusError> {
        self.coordinator.get_history(topic, options).await
    }

    #[must_use]
    pub fn config(&self) -> &EventBusConfig {
        self.coordinator.config()
    }
}
