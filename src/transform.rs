//! # Transform outcomes and the flattening distinction.
//!
//! A transform is a plain function `T -> Mapped<R>` invoked once per input
//! item. The variant it returns **synchronously** decides what happens to
//! the eventual result:
//!
//! - [`Mapped::Value`] — a deferred value; awaited and emitted to the
//!   consumer as **one opaque item**, even if the resolved value happens to
//!   be producer-shaped.
//! - [`Mapped::Sequence`] — a live producer handle; registered as a
//!   sub-producer and **flattened** into the output item by item.
//!
//! The classification is taken at call time, never from what a future later
//! resolves to. This mirrors the host-language distinction between a
//! generator call (returns a live handle before its body runs) and an async
//! function call (returns a deferred value).
//!
//! # Example
//! ```
//! use bufmap::{IterSource, Mapped, MapError};
//!
//! // Flattened: each of the three numbers appears individually downstream.
//! let fanout = |item: i32| Mapped::sequence(IterSource::new(vec![item, item + 1, item + 2]));
//!
//! // Opaque: the whole Vec is one downstream item.
//! let batch = |item: i32| Mapped::future(async move { Ok::<_, MapError>(vec![item; 3]) });
//! # let _ = (fanout(1), batch(1));
//! ```

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::MapError;
use crate::sources::Produce;

/// Outcome of a single transform invocation, classified at call time.
pub enum Mapped<R> {
    /// A deferred value, emitted to the consumer as one opaque item.
    Value(BoxFuture<'static, Result<R, MapError>>),
    /// A nested sequence, flattened into the output item by item.
    Sequence(Box<dyn Produce<R>>),
}

impl<R: Send + 'static> Mapped<R> {
    /// Classifies a deferred value (not flattened).
    pub fn future<F>(fut: F) -> Self
    where
        F: std::future::Future<Output = Result<R, MapError>> + Send + 'static,
    {
        Mapped::Value(Box::pin(fut))
    }

    /// Classifies an already-computed value (not flattened).
    pub fn ready(value: R) -> Self {
        Mapped::Value(Box::pin(futures::future::ready(Ok(value))))
    }

    /// Classifies a nested sequence (flattened).
    pub fn sequence(producer: impl Produce<R>) -> Self {
        Mapped::Sequence(Box::new(producer))
    }
}

/// Shared handle to the user-supplied transform.
pub type Transform<T, R> = Arc<dyn Fn(T) -> Mapped<R> + Send + Sync>;
