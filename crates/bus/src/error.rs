//! The closed taxonomy of caller-visible errors.
//!
//! The bus never panics or unwinds into caller context (see the propagation
//! policy in the specification's error-handling section); every public
//! operation that can fail returns one of these kinds instead. Delivery
//! failures (transient, dead subscriber, timeout) are *not* represented
//! here — those are handled internally by the dispatcher/retry pipeline and
//! never surface to a publisher.

use thiserror::Error;

/// Errors returned by the public facade.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventBusError {
    /// The topic string on a `publish` call was empty or ill-formed.
    #[error("invalid topic '{0}': topic must be a non-empty dotted string")]
    InvalidTopic(String),

    /// The pattern string on a `subscribe` call was ill-formed.
    #[error("invalid pattern '{0}': {1}")]
    InvalidPattern(String, String),

    /// The dispatcher's work queue was full at publish time.
    #[error("dispatcher overloaded: work queue is at capacity")]
    Overloaded,

    /// The publish call's deadline expired before the event could be accepted.
    #[error("publish deadline expired before the event was accepted")]
    Timeout,

    /// A `persistent: true` event could not be written to the storage adapter.
    #[error("failed to persist event: {0}")]
    PersistFailed(String),

    /// A history query arrived while the history feature is globally disabled.
    #[error("history is disabled")]
    HistoryDisabled,

    /// A history query named a topic that has never been published to.
    #[error("unknown topic '{0}': no history has been recorded for it")]
    UnknownTopic(String),

    /// The bus's master switch (`enabled`) is off.
    #[error("the event bus is disabled")]
    Disabled,
}
