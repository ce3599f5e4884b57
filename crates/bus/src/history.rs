//! The per-topic bounded history buffer.
//!
//! A collaborator for late subscribers and diagnostics, not a durable log:
//! entries are silently evicted oldest-first once a topic's ring fills, and
//! none of it survives a process restart unless a [`crate::storage`]
//! adapter is configured to persist it separately.

use std::collections::VecDeque;

use eventbus_core::EventId;
use indexmap::IndexMap;
use ustr::Ustr;

use crate::{envelope::Envelope, error::EventBusError};

/// Options for a [`HistoryBuffer::replay`] query.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReplayOptions {
    pub limit: Option<usize>,
    pub since_event_id: Option<EventId>,
}

/// Per-topic bounded rings of recently published envelopes, in publish order.
#[derive(Debug, Default)]
pub struct HistoryBuffer {
    enabled: bool,
    limit_per_topic: usize,
    rings: IndexMap<Ustr, VecDeque<Envelope>>,
}

impl HistoryBuffer {
    #[must_use]
    pub fn new(enabled: bool, limit_per_topic: usize) -> Self {
        Self {
            enabled,
            limit_per_topic,
            rings: IndexMap::new(),
        }
    }

    /// Appends `envelope` to its topic's ring, evicting the oldest entry on
    /// overflow. No-op when history is globally disabled.
    pub fn record(&mut self, envelope: Envelope) {
        if !self.enabled || self.limit_per_topic == 0 {
            return;
        }
        let ring = self.rings.entry(envelope.topic).or_default();
        ring.push_back(envelope);
        while ring.len() > self.limit_per_topic {
            ring.pop_front();
        }
    }

    /// Returns buffered envelopes for `topic` in publish order, optionally
    /// truncated to `opts.limit` and/or starting strictly after
    /// `opts.since_event_id`.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::HistoryDisabled`] if history is off, or
    /// [`EventBusError::UnknownTopic`] if `topic` has never been published
    /// to.
    pub fn replay(
        &self,
        topic: &str,
        opts: ReplayOptions,
    ) -> Result<Vec<Envelope>, EventBusError> {
        if !self.enabled {
            return Err(EventBusError::HistoryDisabled);
        }
        let ring = self
            .rings
            .get(&Ustr::from(topic))
            .ok_or_else(|| EventBusError::UnknownTopic(topic.to_string()))?;

        let mut iter: Box<dyn Iterator<Item = &Envelope>> = Box::new(ring.iter());
        if let Some(since) = opts.since_event_id {
            iter = Box::new(
                ring.iter()
                    .skip_while(move |envelope| envelope.event_id != since)
                    .skip(1),
            );
        }

        let mut out: Vec<Envelope> = iter.cloned().collect();
        if let Some(limit) = opts.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Iterates the topics currently holding buffered history, in first-seen
    /// order. Used to resolve a wildcard replay-on-subscribe request across
    /// every topic it matches.
    pub fn topics(&self) -> impl Iterator<Item = &Ustr> {
        self.rings.keys()
    }
}

#[cfg(test)]
mod tests {
    use eventbus_core::UnixNanos;
    use rstest::rstest;

    use super::*;
    use crate::envelope::{DeliveryPolicy, Payload};

    fn envelope(topic: &str, ts: u64) -> Envelope {
        Envelope::new(
            Ustr::from(topic),
            Payload::new(ts),
            UnixNanos::from(ts),
            DeliveryPolicy::new(true, 5, false),
        )
    }

    #[rstest]
    fn test_record_and_replay_in_order() {
        let mut history = HistoryBuffer::new(true, 10);
        history.record(envelope("t", 1));
        history.record(envelope("t", 2));
        history.record(envelope("t", 3));

        let replayed = history.replay("t", ReplayOptions::default()).unwrap();
        let timestamps: Vec<u64> = replayed.iter().map(|e| e.published_at.as_u64()).collect();
        assert_eq!(timestamps, vec![1, 2, 3]);
    }

    #[rstest]
    fn test_overflow_evicts_oldest() {
        let mut history = HistoryBuffer::new(true, 2);
        history.record(envelope("t", 1));
        history.record(envelope("t", 2));
        history.record(envelope("t", 3));

        let replayed = history.replay("t", ReplayOptions::default()).unwrap();
        let timestamps: Vec<u64> = replayed.iter().map(|e| e.published_at.as_u64()).collect();
        assert_eq!(timestamps, vec![2, 3]);
    }

    #[rstest]
    fn test_disabled_is_a_noop_and_errors_on_replay() {
        let mut history = HistoryBuffer::new(false, 10);
        history.record(envelope("t", 1));
        assert!(matches!(
            history.replay("t", ReplayOptions::default()),
            Err(EventBusError::HistoryDisabled)
        ));
    }

    #[rstest]
    fn test_unknown_topic() {
        let history = HistoryBuffer::new(true, 10);
        assert!(matches!(
            history.replay("never-seen", ReplayOptions::default()),
            Err(EventBusError::UnknownTopic(_))
        ));
    }

    #[rstest]
    fn test_limit_and_since_event_id() {
        let mut history = HistoryBuffer::new(true, 10);
        history.record(envelope("t", 1));
        history.record(envelope("t", 2));
        history.record(envelope("t", 3));
        let all = history.replay("t", ReplayOptions::default()).unwrap();
        let since_id = all[0].event_id;

        let replayed = history
            .replay(
                "t",
                ReplayOptions {
                    limit: Some(1),
                    since_event_id: Some(since_id),
                },
            )
            .unwrap();
        assert_eq!(replayed.len(), 1);
        assert_eq!(replayed[0].published_at.as_u64(), 2);
    }
}
