//! # Scheduler observability: events and the broadcast bus.
//!
//! The scheduler publishes a lifecycle event for every interesting state
//! change (task scheduled, sub-producer discovered/retired, error latched,
//! shutdown). Consumers that care subscribe via
//! [`BufferedMap::subscribe`](crate::BufferedMap::subscribe); consumers
//! that don't pay only the cost of a failed broadcast send.

mod bus;
mod event;

#[cfg(feature = "logging")]
mod log;

pub use bus::Bus;
pub use event::{Event, EventKind};

#[cfg(feature = "logging")]
pub use log::LogWriter;
