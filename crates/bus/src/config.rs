//! Configuration consumed from whatever external config store the host uses.
//!
//! Every tunable carries a default so that nothing is required at startup.
//! The bus only defines this struct and its defaults; loading it from a
//! particular source (file, env, remote config service) is the host's job.

use serde::{Deserialize, Serialize};

/// Backoff strategy used by the retry scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    Exponential,
    Fixed,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential
    }
}

/// Configuration for an [`crate::EventBus`] instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventBusConfig {
    /// Master switch. When `false`, every operation fails with `Disabled`.
    pub enabled: bool,
    /// Turns on per-topic ring buffers.
    pub history_enabled: bool,
    /// Ring capacity, per topic.
    pub history_limit_per_topic: usize,
    /// Default retry policy, used when an event's `delivery_policy` doesn't
    /// override it.
    pub retry_enabled: bool,
    /// Maximum delivery attempts per `(event, subscriber)` pair.
    #[serde(alias = "max_attempts")]
    pub retry_max_attempts: u32,
    /// Base interval, in milliseconds, for backoff calculation.
    pub retry_base_interval_ms: u64,
    /// Cap on backoff delay, in milliseconds, for the exponential strategy.
    pub retry_max_interval_ms: u64,
    /// Backoff strategy.
    pub retry_backoff_strategy: BackoffStrategy,
    /// Number of dispatcher workers.
    pub dispatcher_pool_size: usize,
    /// Back-pressure threshold: the bounded capacity of the dispatch work queue.
    pub work_queue_capacity: usize,
    /// Per-attempt delivery timeout, in milliseconds.
    pub delivery_timeout_ms: u64,
    /// Whether exhausted retries are routed to the dead-letter sink (vs. simply dropped).
    pub dlq_enabled: bool,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            history_enabled: false,
            history_limit_per_topic: 100,
            retry_enabled: true,
            retry_max_attempts: 5,
            retry_base_interval_ms: 1_000,
            retry_max_interval_ms: 60_000,
            retry_backoff_strategy: BackoffStrategy::Exponential,
            dispatcher_pool_size: default_pool_size(),
            work_queue_capacity: 10_000,
            delivery_timeout_ms: 5_000,
            dlq_enabled: false,
        }
    }
}

/// Environment variable used to override the default dispatcher pool size,
/// mirroring how the teacher's shared Tokio runtime is sized.
pub(crate) const EVENTBUS_WORKER_THREADS: &str = "EVENTBUS_WORKER_THREADS";

fn default_pool_size() -> usize {
    std::env::var(EVENTBUS_WORKER_THREADS)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or_else(|| std::thread::available_parallelism().map_or(2, |n| n.get() * 2))
}
