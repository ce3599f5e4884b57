//! The bus coordinator: the single owner of the subscription registry and
//! history buffer, and the only thing that ever mutates them.
//!
//! Every public operation takes the same `tokio::sync::Mutex` before
//! touching shared state, so registry and history mutations are always
//! serialized relative to each other even though dispatch itself runs fully
//! in parallel on the worker pool behind it. A background task drains the
//! dispatcher's result channel and feeds transient failures back into the
//! retry scheduler or dead-letters them; a second task polls the scheduler
//! for attempts that have come due and resubmits them.

use std::{collections::HashMap, sync::Arc, time::Duration};

use eventbus_core::{AtomicClock, EventId, UnixNanos};
use tokio::sync::{oneshot, Mutex};
use ustr::Ustr;

use crate::{
    config::EventBusConfig,
    dispatcher::{DispatchRequest, DispatchResult, Dispatcher},
    envelope::{DeliveryPolicy, Envelope, Payload},
    error::EventBusError,
    handler::{DeliveryMessage, SubscriberHandle, SubscriberId},
    history::{HistoryBuffer, ReplayOptions},
    order_gate::OrderGates,
    pattern::validate_topic,
    registry::{Registry, SubscriptionOptions},
    retry::{RetryItem, RetryScheduler, ScheduleDecision},
    runtime, telemetry,
};

/// Per-publish overrides layered on top of the bus-wide configuration.
#[derive(Default)]
pub struct PublishOptions {
    pub metadata: HashMap<String, serde_json::Value>,
    pub scope: Option<String>,
    pub publisher_id: Option<String>,
    pub delivery_policy: Option<DeliveryPolicy>,
    /// Overrides the auto-generated event id.
    pub event_id: Option<EventId>,
    /// Overrides the publish-time timestamp otherwise taken from the bus clock.
    pub timestamp: Option<UnixNanos>,
    /// Overall deadline for this call, in milliseconds from acceptance. If
    /// the call has not reached the dispatch stage before the deadline
    /// elapses, it returns [`EventBusError::Timeout`] and the event is not
    /// enqueued.
    pub deadline_ms: Option<u64>,
}

/// What a successful `publish` call reports back to the caller.
#[derive(Debug)]
pub struct PublishOutcome {
    pub event_id: EventId,
    pub matched_subscribers: usize,
}

/// Options accompanying a `subscribe` call.
pub struct SubscribeOptions {
    pub replay_on_subscribe: bool,
    pub max_replay: usize,
    /// When provided, the coordinator installs a liveness watch on this
    /// subscriber's first subscription: once this receiver resolves (either
    /// an explicit signal or the paired sender being dropped), every
    /// subscription this subscriber holds is removed automatically.
    pub liveness: Option<oneshot::Receiver<()>>,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            replay_on_subscribe: false,
            max_replay: 0,
            liveness: None,
        }
    }
}

struct Inner {
    registry: Registry,
    history: HistoryBuffer,
    retry: RetryScheduler,
}

/// The serializing owner of registry, history, and the retry queue.
pub struct BusCoordinator {
    inner: Arc<Mutex<Inner>>,
    dispatcher: Arc<Dispatcher>,
    storage: Arc<dyn crate::storage::StorageAdapter>,
    clock: Arc<AtomicClock>,
    gates: Arc<OrderGates>,
    config: EventBusConfig,
    _pump: tokio::task::JoinHandle<()>,
    _ticker: tokio::task::JoinHandle<()>,
}

impl BusCoordinator {
    #[must_use]
    pub fn new(config: EventBusConfig, storage: Arc<dyn crate::storage::StorageAdapter>) -> Self {
        let clock = Arc::new(AtomicClock::realtime());
        let dispatcher = Arc::new(Dispatcher::new(
            config.dispatcher_pool_size,
            config.work_queue_capacity,
            Duration::from_millis(config.delivery_timeout_ms),
        ));
        let inner = Arc::new(Mutex::new(Inner {
            registry: Registry::new(),
            history: HistoryBuffer::new(config.history_enabled, config.history_limit_per_topic),
            retry: RetryScheduler::new(
                config.retry_backoff_strategy,
                config.retry_base_interval_ms,
                config.retry_max_interval_ms,
                config.retry_max_attempts,
            ),
        }));

        let pump = runtime::get_runtime().spawn(Self::run_result_pump(
            inner.clone(),
            dispatcher.clone(),
            storage.clone(),
            clock.clone(),
            config.retry_enabled,
            config.dlq_enabled,
        ));
        let ticker = runtime::get_runtime().spawn(Self::run_retry_ticker(
            inner.clone(),
            dispatcher.clone(),
            clock.clone(),
        ));

        Self {
            inner,
            dispatcher,
            storage,
            clock,
            gates: Arc::new(OrderGates::new()),
            config,
            _pump: pump,
            _ticker: ticker,
        }
    }

    async fn run_result_pump(
        inner: Arc<Mutex<Inner>>,
        dispatcher: Arc<Dispatcher>,
        storage: Arc<dyn crate::storage::StorageAdapter>,
        clock: Arc<AtomicClock>,
        retry_enabled: bool,
        dlq_enabled: bool,
    ) {
        while let Some(result) = dispatcher.next_result().await {
            match result {
                DispatchResult::Success {
                    subscriber_id,
                    event_id,
                } => {
                    telemetry::delivery_success(subscriber_id.as_str(), event_id, 1);
                }
                DispatchResult::Dead {
                    subscriber_id,
                    event_id,
                } => {
                    telemetry::delivery_failure(subscriber_id.as_str(), event_id, "subscriber gone");
                    if dlq_enabled {
                        let _ = storage
                            .record_dead_letter(event_id, subscriber_id.as_str(), "subscriber no longer alive")
                            .await;
                    }
                }
                DispatchResult::Transient {
                    envelope,
                    subscriber_id,
                    subscriber,
                    attempts_so_far,
                    error,
                    gate,
                } => {
                    telemetry::delivery_failure(subscriber_id.as_str(), envelope.event_id, &error);
                    let event_id = envelope.event_id;

                    if !retry_enabled {
                        drop(gate);
                        if dlq_enabled {
                            let _ = storage
                                .record_dead_letter(event_id, subscriber_id.as_str(), &error)
                                .await;
                        }
                        continue;
                    }

                    let item = RetryItem {
                        envelope,
                        subscriber_id,
                        subscriber,
                        attempts_so_far: attempts_so_far + 1,
                        last_error: Some(error.clone()),
                        gate,
                    };

                    let decision = {
                        let now_ns = clock.get_time_ns().as_u64();
                        let mut guard = inner.lock().await;
                        guard.retry.schedule(item, now_ns)
                    };
                    match decision {
                        ScheduleDecision::Scheduled {
                            next_attempt_at_ns,
                        } => {
                            telemetry::delivery_retry(
                                subscriber_id.as_str(),
                                event_id,
                                next_attempt_at_ns.into(),
                            );
                        }
                        ScheduleDecision::DeadLettered(dead) => {
                            telemetry::delivery_dead_lettered(
                                subscriber_id.as_str(),
                                event_id,
                                "retry attempts exhausted",
                            );
                            if dlq_enabled {
                                let _ = storage
                                    .record_dead_letter(
                                        event_id,
                                        subscriber_id.as_str(),
                                        "retry attempts exhausted",
                                    )
                                    .await;
                            }
                            let _ = dead;
                        }
                    }
                }
            }
        }
    }

    async fn run_retry_ticker(
        inner: Arc<Mutex<Inner>>,
        dispatcher: Arc<Dispatcher>,
        clock: Arc<AtomicClock>,
    ) {
        let mut interval = tokio::time::interval(Duration::from_millis(50));
        loop {
            interval.tick().await;
            let now_ns = clock.get_time_ns().as_u64();
            let due = {
                let mut guard = inner.lock().await;
                guard.retry.drain_due(now_ns)
            };
            for item in due {
                let _ = dispatcher.submit(DispatchRequest {
                    envelope: item.envelope,
                    subscriber_id: item.subscriber_id,
                    subscriber: item.subscriber,
                    attempts_so_far: item.attempts_so_far,
                    gate: item.gate,
                });
            }
        }
    }

    /// Publishes `payload` on `topic`, fanning it out to every subscriber
    /// whose pattern currently matches.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::Disabled`] if the bus is disabled,
    /// [`EventBusError::InvalidTopic`] if `topic` is not well-formed,
    /// [`EventBusError::Timeout`] if `opts.deadline_ms` elapsed before the
    /// event reached dispatch, [`EventBusError::Overloaded`] if the
    /// dispatcher's work queue has no free slot, or
    /// [`EventBusError::PersistFailed`] if the event required persistence
    /// and the configured storage adapter could not durably write it.
    pub async fn publish(
        &self,
        topic: &str,
        payload: Payload,
        opts: PublishOptions,
    ) -> Result<PublishOutcome, EventBusError> {
        if !self.config.enabled {
            return Err(EventBusError::Disabled);
        }
        validate_topic(topic)?;

        let accepted_at_ns = self.clock.get_time_ns().as_u64();
        let deadline_ns = opts.deadline_ms.map(|ms| ms.saturating_mul(1_000_000));

        let policy = opts.delivery_policy.unwrap_or(DeliveryPolicy::new(
            self.config.retry_enabled,
            self.config.retry_max_attempts,
            false,
        ));
        let published_at = opts.timestamp.unwrap_or(self.clock.get_time_ns());
        let mut envelope = Envelope::new(Ustr::from(topic), payload, published_at, policy)
            .with_metadata(opts.metadata);
        if let Some(event_id) = opts.event_id {
            envelope = envelope.with_event_id(event_id);
        }
        if let Some(scope) = opts.scope {
            envelope = envelope.with_scope(scope);
        }
        if let Some(publisher_id) = opts.publisher_id {
            envelope = envelope.with_publisher(publisher_id);
        }

        telemetry::publish_start(envelope.topic, envelope.event_id);

        if policy.persistent {
            if let Err(err) = self.storage.persist_event(&envelope).await {
                telemetry::publish_exception(envelope.topic, &err.to_string());
                return Err(err);
            }
        }

        if let Some(deadline_ns) = deadline_ns {
            let elapsed_ns = self.clock.get_time_ns().as_u64().saturating_sub(accepted_at_ns);
            if elapsed_ns >= deadline_ns {
                telemetry::publish_exception(envelope.topic, "publish deadline expired before acceptance");
                return Err(EventBusError::Timeout);
            }
        }

        if !self.dispatcher.has_capacity() {
            telemetry::publish_exception(envelope.topic, "dispatcher overloaded: work queue is at capacity");
            return Err(EventBusError::Overloaded);
        }

        let matched = {
            let mut guard = self.inner.lock().await;
            guard.history.record(envelope.clone());
            guard.registry.snapshot(topic)
        };

        telemetry::dispatch_start(envelope.topic, envelope.event_id, matched.len());

        for matched_subscriber in &matched {
            let key = (
                envelope.publisher_id.clone(),
                envelope.topic,
                matched_subscriber.id,
            );
            match self.gates.try_acquire(key.clone()) {
                Ok(gate) => {
                    let request = DispatchRequest {
                        envelope: envelope.clone(),
                        subscriber_id: matched_subscriber.id,
                        subscriber: matched_subscriber.handle.clone(),
                        attempts_so_far: 0,
                        gate,
                    };
                    self.dispatcher.submit(request)?;
                }
                Err(_) => {
                    // An earlier item for this (publisher, topic, subscriber)
                    // triple is still in flight, possibly mid-retry. Wait for
                    // it off the publish path so this one is dispatched only
                    // once that item reaches a terminal outcome, preserving
                    // delivery order for the triple.
                    let dispatcher = self.dispatcher.clone();
                    let gates = self.gates.clone();
                    let envelope = envelope.clone();
                    let subscriber_id = matched_subscriber.id;
                    let subscriber = matched_subscriber.handle.clone();
                    runtime::get_runtime().spawn(async move {
                        let gate = gates.acquire(key).await;
                        let topic = envelope.topic;
                        let event_id = envelope.event_id;
                        if let Err(err) = dispatcher.submit(DispatchRequest {
                            envelope,
                            subscriber_id,
                            subscriber,
                            attempts_so_far: 0,
                            gate,
                        }) {
                            telemetry::publish_exception(topic, &format!("{err}: {event_id}"));
                        }
                    });
                }
            }
        }

        telemetry::dispatch_stop(envelope.topic, envelope.event_id);
        telemetry::publish_stop(envelope.topic, envelope.event_id, matched.len());

        Ok(PublishOutcome {
            event_id: envelope.event_id,
            matched_subscribers: matched.len(),
        })
    }

    /// Registers `handle` under `pattern` for `id`. Idempotent: resubscribing
    /// to a pattern already held by `id` is a no-op beyond replay.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::InvalidPattern`] if `pattern` does not
    /// compile.
    pub async fn subscribe(
        &self,
        pattern: &str,
        id: SubscriberId,
        handle: SubscriberHandle,
        opts: SubscribeOptions,
    ) -> Result<(), EventBusError> {
        let is_first = {
            let mut guard = self.inner.lock().await;
            match guard.registry.add(
                pattern,
                id,
                handle.clone(),
                SubscriptionOptions {
                    replay_on_subscribe: opts.replay_on_subscribe,
                    max_replay: opts.max_replay,
                },
            ) {
                Ok(is_first) => is_first,
                Err(err) => {
                    telemetry::subscribe_failure(pattern, &err.to_string());
                    return Err(err);
                }
            }
        };
        telemetry::subscribe_success(pattern, id.as_str());

        if is_first {
            if let Some(liveness) = opts.liveness {
                let inner = self.inner.clone();
                runtime::get_runtime().spawn(async move {
                    let _ = liveness.await;
                    let mut guard = inner.lock().await;
                    guard.registry.on_liveness_signal(id);
                    drop(guard);
                    telemetry::liveness_cleanup(id.as_str());
                });
            }
        }

        if opts.replay_on_subscribe {
            let compiled = crate::pattern::Pattern::compile(pattern)?;
            let mut replayed: Vec<Envelope> = {
                let guard = self.inner.lock().await;
                let mut collected = Vec::new();
                for topic in guard.history.topics() {
                    if compiled.matches(topic.as_str()) {
                        if let Ok(entries) = guard.history.replay(topic.as_str(), ReplayOptions::default())
                        {
                            collected.extend(entries);
                        }
                    }
                }
                collected
            };
            replayed.sort_by_key(|envelope| envelope.published_at);
            if opts.max_replay > 0 && replayed.len() > opts.max_replay {
                let drop_count = replayed.len() - opts.max_replay;
                replayed.drain(0..drop_count);
            }
            for envelope in replayed {
                let message = DeliveryMessage::from_envelope(&envelope).mark_replay();
                let _ = handle.0.deliver(message).await;
            }
        }

        Ok(())
    }

    /// Removes `id`'s subscription to `pattern`. Idempotent.
    pub async fn unsubscribe(&self, pattern: &str, id: SubscriberId) {
        let mut guard = self.inner.lock().await;
        guard.registry.remove(pattern, id);
    }

    /// Removes every subscription `id` holds.
    pub async fn unsubscribe_all(&self, id: SubscriberId) {
        let mut guard = self.inner.lock().await;
        guard.registry.remove_all(id);
    }

    /// Returns buffered history for `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::HistoryDisabled`] if history is off, or
    /// [`EventBusError::UnknownTopic`] if nothing has ever been published on
    /// `topic`.
    pub async fn get_history(
        &self,
        topic: &str,
        opts: ReplayOptions,
    ) -> Result<Vec<Envelope>, EventBusError> {
        let guard = self.inner.lock().await;
        guard.history.replay(topic, opts)
    }

    #[must_use]
    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }
}
