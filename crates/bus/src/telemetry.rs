//! Named telemetry call sites.
//!
//! Plain `log` macro calls, the same way the rest of this stack logs —
//! nothing here opens a span or owns a subscriber. With the
//! `tracing-bridge` feature enabled, a [`tracing_subscriber`] layer that
//! forwards `log` records into `tracing` can be installed by the host
//! process; these functions don't change either way.

use eventbus_core::{EventId, UnixNanos};
use ustr::Ustr;

pub fn publish_start(topic: Ustr, event_id: EventId) {
    log::debug!("publish.start topic={topic} event_id={event_id}");
}

pub fn publish_stop(topic: Ustr, event_id: EventId, subscriber_count: usize) {
    log::debug!("publish.stop topic={topic} event_id={event_id} subscribers={subscriber_count}");
}

pub fn publish_exception(topic: Ustr, error: &str) {
    log::error!("publish.exception topic={topic} error={error}");
}

pub fn subscribe_success(topic_pattern: &str, subscriber_id: &str) {
    log::debug!("subscribe.success pattern={topic_pattern} subscriber={subscriber_id}");
}

pub fn subscribe_failure(topic_pattern: &str, error: &str) {
    log::warn!("subscribe.failure pattern={topic_pattern} error={error}");
}

pub fn dispatch_start(topic: Ustr, event_id: EventId, subscriber_count: usize) {
    log::debug!("dispatch.start topic={topic} event_id={event_id} subscribers={subscriber_count}");
}

pub fn dispatch_stop(topic: Ustr, event_id: EventId) {
    log::debug!("dispatch.stop topic={topic} event_id={event_id}");
}

pub fn delivery_success(subscriber_id: &str, event_id: EventId, attempts: u32) {
    log::debug!("delivery.success subscriber={subscriber_id} event_id={event_id} attempts={attempts}");
}

pub fn delivery_failure(subscriber_id: &str, event_id: EventId, error: &str) {
    log::warn!("delivery.failure subscriber={subscriber_id} event_id={event_id} error={error}");
}

pub fn delivery_retry(subscriber_id: &str, event_id: EventId, next_attempt_at_ns: UnixNanos) {
    log::debug!(
        "delivery.retry subscriber={subscriber_id} event_id={event_id} next_attempt_at={next_attempt_at_ns}"
    );
}

pub fn delivery_dead_lettered(subscriber_id: &str, event_id: EventId, reason: &str) {
    log::warn!("delivery.dead_lettered subscriber={subscriber_id} event_id={event_id} reason={reason}");
}

pub fn liveness_cleanup(subscriber_id: &str) {
    log::debug!("liveness.cleanup subscriber={subscriber_id}");
}
