//! A unique identifier for bus events.

use std::fmt::{Debug, Display};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Uniquely identifies one event as it travels through the bus.
///
/// Generated with UUID v4 when the caller omits one on publish. Subscribers
/// can use it for their own deduplication across retried deliveries.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new, randomly-generated [`EventId`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an externally supplied identifier, e.g. one the caller passed
    /// on publish.
    #[must_use]
    pub const fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Parses an [`EventId`] from its string form.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is not a valid UUID string.
    pub fn parse<T: AsRef<str>>(value: T) -> Result<Self, uuid::Error> {
        Uuid::parse_str(value.as_ref()).map(Self)
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Debug for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EventId({})", self.0)
    }
}

impl From<Uuid> for EventId {
    fn from(value: Uuid) -> Self {
        Self::from_uuid(value)
    }
}
