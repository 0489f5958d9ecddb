//! # Producer abstraction.
//!
//! This module defines the [`Produce`] trait — the pull-based contract every
//! input sequence and every nested sub-sequence must satisfy — and the
//! shared handle type the scheduler uses to let worker tasks and the
//! lifecycle controller touch the same producer.
//!
//! A producer yields items one at a time via [`advance`](Produce::advance)
//! and is told to release its resources via [`close`](Produce::close).
//!
//! # Example
//! ```
//! use async_trait::async_trait;
//! use bufmap::{MapError, Produce};
//!
//! struct Countdown(u32);
//!
//! #[async_trait]
//! impl Produce<u32> for Countdown {
//!     async fn advance(&mut self) -> Result<Option<u32>, MapError> {
//!         if self.0 == 0 {
//!             return Ok(None);
//!         }
//!         self.0 -= 1;
//!         Ok(Some(self.0))
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::MapError;

/// # Pull-based asynchronous producer.
///
/// [`advance`](Produce::advance) suspends until the producer settles on a
/// step: `Ok(Some(item))` for a value, `Ok(None)` for exhaustion, `Err` for
/// failure. A producer that reported exhaustion or failure should keep
/// answering `Ok(None)` if advanced again.
///
/// [`close`](Produce::close) is best-effort and idempotent; the scheduler
/// never propagates close failures and may call it while an `advance` it
/// issued earlier is still settling in the background.
#[async_trait]
pub trait Produce<T>: Send + 'static {
    /// Pulls the next step from the producer.
    async fn advance(&mut self) -> Result<Option<T>, MapError>;

    /// Releases the producer's resources.
    ///
    /// The default implementation is a no-op for producers with nothing to
    /// release.
    async fn close(&mut self) -> Result<(), MapError> {
        Ok(())
    }
}

/// Shared handle to a producer.
///
/// The fair FIFO [`tokio::sync::Mutex`] serializes concurrent `advance`
/// calls issued by racing worker tasks, so each producer observes a strict
/// sequence of pulls in scheduling order.
pub type SharedProducer<T> = Arc<Mutex<Box<dyn Produce<T>>>>;

/// Wraps a boxed producer into a shared handle.
pub(crate) fn shared<T>(producer: Box<dyn Produce<T>>) -> SharedProducer<T> {
    Arc::new(Mutex::new(producer))
}
