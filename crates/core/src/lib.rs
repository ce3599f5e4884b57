//! Core primitives shared across the event bus crate.
//!
//! This crate has no knowledge of topics, subscriptions, or dispatch — it
//! only provides the small set of building blocks that are useful to any
//! consumer of the bus: a unique event identifier, a strictly-increasing
//! nanosecond clock, and design-by-contract style precondition checks.

#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]
#![deny(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]

pub mod correctness;
pub mod event_id;
pub mod nanos;
pub mod time;

pub use event_id::EventId;
pub use nanos::UnixNanos;
pub use time::AtomicClock;
