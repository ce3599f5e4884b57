//! The dispatcher: a bounded worker pool that performs delivery attempts,
//! enforces a per-attempt timeout, and classifies the outcome.
//!
//! Ordering across retries is not this module's concern: each
//! [`DispatchRequest`] carries an [`OwnedMutexGuard`] (see [`order_gate`])
//! that was claimed before the request was built and is only released once
//! the item reaches a terminal outcome. A worker here just runs one attempt
//! and, on [`DispatchResult::Transient`], hands the same guard back out so
//! the retry path can keep holding it.
//!
//! [`order_gate`]: crate::order_gate

use std::{sync::Arc, time::Duration};

use eventbus_core::EventId;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};

use crate::{
    envelope::Envelope,
    error::EventBusError,
    handler::{DeliveryMessage, DeliveryOutcome, SubscriberHandle, SubscriberId},
};

/// One delivery attempt queued for a worker, already holding the ordering
/// gate for its `(publisher, topic, subscriber)` triple.
pub struct DispatchRequest {
    pub envelope: Envelope,
    pub subscriber_id: SubscriberId,
    pub subscriber: SubscriberHandle,
    pub attempts_so_far: u32,
    pub gate: OwnedMutexGuard<()>,
}

/// The classified result of one delivery attempt, ready for the coordinator
/// to route to history, the retry scheduler, or the dead-letter path.
pub enum DispatchResult {
    Success {
        subscriber_id: SubscriberId,
        event_id: EventId,
    },
    Dead {
        subscriber_id: SubscriberId,
        event_id: EventId,
    },
    Transient {
        envelope: Envelope,
        subscriber_id: SubscriberId,
        subscriber: SubscriberHandle,
        attempts_so_far: u32,
        error: String,
        gate: OwnedMutexGuard<()>,
    },
}

/// A bounded pool of workers performing delivery attempts.
pub struct Dispatcher {
    work_tx: mpsc::Sender<DispatchRequest>,
    results_rx: Mutex<mpsc::UnboundedReceiver<DispatchResult>>,
    _workers: Vec<tokio::task::JoinHandle<()>>,
}

impl Dispatcher {
    /// Spawns `pool_size` workers draining a queue of capacity
    /// `queue_capacity`, each applying `delivery_timeout` to every attempt.
    #[must_use]
    pub fn new(pool_size: usize, queue_capacity: usize, delivery_timeout: Duration) -> Self {
        let (work_tx, work_rx) = mpsc::channel::<DispatchRequest>(queue_capacity.max(1));
        let work_rx = Arc::new(Mutex::new(work_rx));
        let (results_tx, results_rx) = mpsc::unbounded_channel::<DispatchResult>();

        let mut workers = Vec::with_capacity(pool_size.max(1));
        for _ in 0..pool_size.max(1) {
            let work_rx = work_rx.clone();
            let results_tx = results_tx.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    let request = {
                        let mut guard = work_rx.lock().await;
                        guard.recv().await
                    };
                    let Some(request) = request else {
                        break;
                    };
                    Self::run_one(request, delivery_timeout, &results_tx).await;
                }
            }));
        }

        Self {
            work_tx,
            results_rx: Mutex::new(results_rx),
            _workers: workers,
        }
    }

    async fn run_one(
        request: DispatchRequest,
        delivery_timeout: Duration,
        results_tx: &mpsc::UnboundedSender<DispatchResult>,
    ) {
        let DispatchRequest {
            envelope,
            subscriber_id,
            subscriber,
            attempts_so_far,
            gate,
        } = request;

        let message = DeliveryMessage::from_envelope(&envelope);
        let event_id = envelope.event_id;
        let outcome = tokio::time::timeout(delivery_timeout, subscriber.0.deliver(message))
            .await
            .unwrap_or_else(|_| DeliveryOutcome::Transient("delivery timed out".to_string()));

        let result = match outcome {
            DeliveryOutcome::Success => {
                drop(gate);
                DispatchResult::Success {
                    subscriber_id,
                    event_id,
                }
            }
            DeliveryOutcome::Dead => {
                drop(gate);
                DispatchResult::Dead {
                    subscriber_id,
                    event_id,
                }
            }
            DeliveryOutcome::Transient(error) => DispatchResult::Transient {
                envelope,
                subscriber_id,
                subscriber,
                attempts_so_far,
                error,
                gate,
            },
        };

        let _ = results_tx.send(result);
    }

    /// Enqueues `request`, returning [`EventBusError::Overloaded`] if the
    /// work queue is at capacity. The caller must already hold `request`'s
    /// ordering gate.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::Overloaded`] when the queue is full.
    pub fn submit(&self, request: DispatchRequest) -> Result<(), EventBusError> {
        self.work_tx
            .try_send(request)
            .map_err(|_| EventBusError::Overloaded)
    }

    /// Reports whether the work queue currently has at least one free slot.
    /// A cheap, racy pre-check: capacity can be consumed by another
    /// submitter between this call and the next `submit`.
    #[must_use]
    pub fn has_capacity(&self) -> bool {
        self.work_tx.capacity() > 0
    }

    /// Awaits the next completed delivery result.
    pub async fn next_result(&self) -> Option<DispatchResult> {
        let mut guard = self.results_rx.lock().await;
        guard.recv().await
    }
}
