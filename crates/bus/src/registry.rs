//! The subscription registry: pattern → subscribers, and the reverse index
//! needed to clean up a subscriber's entries in one shot, whether that
//! cleanup comes from an explicit `unsubscribe_all` or a liveness signal.
//!
//! The registry itself is a plain, synchronous data structure — it has no
//! opinion on *how* mutations are serialized. That discipline is the bus
//! coordinator's job (see `crate::coordinator`); tests here exercise the
//! registry directly, single-threaded, which is also how the coordinator
//! uses it once it owns the only `&mut` reference.

use ahash::AHashMap;
use ahash::AHashSet;
use indexmap::IndexMap;

use crate::{
    error::EventBusError,
    handler::{SubscriberHandle, SubscriberId},
    pattern::Pattern,
};

/// Per-subscription options.
#[derive(Clone, Copy, Debug, Default)]
pub struct SubscriptionOptions {
    pub replay_on_subscribe: bool,
    pub max_replay: usize,
}

struct SubscriberEntry {
    handle: SubscriberHandle,
    patterns: AHashSet<String>,
}

/// One live `(pattern, subscriber)` registration, as returned by
/// [`Registry::snapshot`].
#[derive(Clone)]
pub struct MatchedSubscriber {
    pub id: SubscriberId,
    pub handle: SubscriberHandle,
}

/// The subscription table.
#[derive(Default)]
pub struct Registry {
    by_pattern: IndexMap<String, Pattern>,
    /// pattern -> subscribers registered under it, preserving registration order.
    subscribers_by_pattern: IndexMap<String, Vec<SubscriberId>>,
    subscribers: AHashMap<SubscriberId, SubscriberEntry>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `subscriber` under `pattern`. Idempotent on `(pattern, subscriber.id)`.
    ///
    /// Returns `true` if this is the subscriber's first subscription in the
    /// registry (the coordinator should install a liveness watch), `false`
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::InvalidPattern`] if `pattern` fails to compile.
    pub fn add(
        &mut self,
        pattern: &str,
        id: SubscriberId,
        handle: SubscriberHandle,
        options: SubscriptionOptions,
    ) -> Result<bool, EventBusError> {
        let compiled = Pattern::compile(pattern)?;
        self.by_pattern
            .entry(pattern.to_string())
            .or_insert(compiled);

        let is_first = !self.subscribers.contains_key(&id);
        let entry = self.subscribers.entry(id).or_insert_with(|| SubscriberEntry {
            handle: handle.clone(),
            patterns: AHashSet::new(),
        });
        entry.handle = handle;

        if entry.patterns.insert(pattern.to_string()) {
            let subs = self
                .subscribers_by_pattern
                .entry(pattern.to_string())
                .or_default();
            if !subs.contains(&id) {
                subs.push(id);
            }
        }
        let _ = options; // per-subscription options are stored for replay bookkeeping by the coordinator

        Ok(is_first)
    }

    /// Removes `(pattern, id)`. Idempotent.
    ///
    /// Returns `true` if, after removal, `id` has no remaining subscriptions
    /// (the coordinator should abort its liveness watch).
    pub fn remove(&mut self, pattern: &str, id: SubscriberId) -> bool {
        if let Some(subs) = self.subscribers_by_pattern.get_mut(pattern) {
            subs.retain(|existing| *existing != id);
            if subs.is_empty() {
                self.subscribers_by_pattern.shift_remove(pattern);
            }
        }

        let mut now_empty = false;
        if let Some(entry) = self.subscribers.get_mut(&id) {
            entry.patterns.remove(pattern);
            if entry.patterns.is_empty() {
                self.subscribers.remove(&id);
                now_empty = true;
            }
        }
        now_empty
    }

    /// Removes every subscription held by `id`.
    pub fn remove_all(&mut self, id: SubscriberId) {
        if let Some(entry) = self.subscribers.remove(&id) {
            for pattern in entry.patterns {
                if let Some(subs) = self.subscribers_by_pattern.get_mut(&pattern) {
                    subs.retain(|existing| *existing != id);
                    if subs.is_empty() {
                        self.subscribers_by_pattern.shift_remove(&pattern);
                    }
                }
            }
        }
    }

    /// Invoked when the runtime reports a subscriber terminated. Equivalent
    /// to `remove_all`, named separately to mirror the liveness-signal
    /// entry point in the specification.
    pub fn on_liveness_signal(&mut self, id: SubscriberId) {
        self.remove_all(id);
    }

    /// Returns the set of unique subscribers whose at least one pattern
    /// matches `topic`, evaluated against the registry as of this call.
    #[must_use]
    pub fn snapshot(&self, topic: &str) -> Vec<MatchedSubscriber> {
        let mut seen = AHashSet::new();
        let mut out = Vec::new();

        for (raw_pattern, compiled) in &self.by_pattern {
            if !compiled.matches(topic) {
                continue;
            }
            let Some(subs) = self.subscribers_by_pattern.get(raw_pattern) else {
                continue;
            };
            for id in subs {
                if seen.insert(*id) {
                    if let Some(entry) = self.subscribers.get(id) {
                        out.push(MatchedSubscriber {
                            id: *id,
                            handle: entry.handle.clone(),
                        });
                    }
                }
            }
        }
        out
    }

    #[must_use]
    pub fn is_subscribed(&self, pattern: &str, id: SubscriberId) -> bool {
        self.subscribers
            .get(&id)
            .is_some_and(|entry| entry.patterns.contains(pattern))
    }

    #[must_use]
    pub fn patterns(&self) -> Vec<&str> {
        self.by_pattern.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.snapshot(topic).len()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use rstest::rstest;

    use super::*;
    use crate::handler::{DeliveryMessage, DeliveryOutcome, Subscriber};

    struct Stub;

    #[async_trait]
    impl Subscriber for Stub {
        async fn deliver(&self, _message: DeliveryMessage) -> DeliveryOutcome {
            DeliveryOutcome::Success
        }
    }

    fn handle() -> SubscriberHandle {
        SubscriberHandle(std::sync::Arc::new(Stub))
    }

    #[rstest]
    fn test_add_is_idempotent_and_first_flag() {
        let mut registry = Registry::new();
        let id = SubscriberId::new("sub-1");

        let first = registry
            .add("order.placed", id, handle(), SubscriptionOptions::default())
            .unwrap();
        assert!(first);

        let second = registry
            .add("order.placed", id, handle(), SubscriptionOptions::default())
            .unwrap();
        assert!(!second);

        assert_eq!(registry.snapshot("order.placed").len(), 1);
    }

    #[rstest]
    fn test_invalid_pattern_rejected() {
        let mut registry = Registry::new();
        let id = SubscriberId::new("sub-1");
        let result = registry.add("a.**.b", id, handle(), SubscriptionOptions::default());
        assert!(matches!(result, Err(EventBusError::InvalidPattern(_, _))));
    }

    #[rstest]
    fn test_dedup_across_multiple_matching_patterns() {
        let mut registry = Registry::new();
        let id = SubscriberId::new("sub-1");
        registry
            .add("user.*", id, handle(), SubscriptionOptions::default())
            .unwrap();
        registry
            .add("user.created", id, handle(), SubscriptionOptions::default())
            .unwrap();

        let matched = registry.snapshot("user.created");
        assert_eq!(matched.len(), 1);
    }

    #[rstest]
    fn test_remove_is_idempotent() {
        let mut registry = Registry::new();
        let id = SubscriberId::new("sub-1");
        registry
            .add("order.placed", id, handle(), SubscriptionOptions::default())
            .unwrap();

        let now_empty = registry.remove("order.placed", id);
        assert!(now_empty);
        let still_empty = registry.remove("order.placed", id);
        assert!(still_empty);
        assert!(registry.snapshot("order.placed").is_empty());
    }

    #[rstest]
    fn test_unsubscribe_all_then_publish_delivers_nothing() {
        let mut registry = Registry::new();
        let id = SubscriberId::new("sub-1");
        registry
            .add("x.*", id, handle(), SubscriptionOptions::default())
            .unwrap();
        registry
            .add("y.*", id, handle(), SubscriptionOptions::default())
            .unwrap();

        registry.remove_all(id);

        assert!(registry.snapshot("x.anything").is_empty());
        assert!(registry.snapshot("y.anything").is_empty());
    }

    #[rstest]
    fn test_liveness_signal_cleans_up() {
        let mut registry = Registry::new();
        let id = SubscriberId::new("sub-1");
        registry
            .add("x.*", id, handle(), SubscriptionOptions::default())
            .unwrap();

        registry.on_liveness_signal(id);

        assert!(registry.snapshot("x.y").is_empty());
    }

    #[rstest]
    fn test_two_subscribers_both_receive_exact_topic() {
        let mut registry = Registry::new();
        let a = SubscriberId::new("a");
        let b = SubscriberId::new("b");
        registry
            .add("order.placed", a, handle(), SubscriptionOptions::default())
            .unwrap();
        registry
            .add("order.placed", b, handle(), SubscriptionOptions::default())
            .unwrap();

        let matched = registry.snapshot("order.placed");
        assert_eq!(matched.len(), 2);
    }
}
