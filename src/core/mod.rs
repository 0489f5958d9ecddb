//! # Scheduler internals.
//!
//! - [`scheduler`] — the consumer-facing [`BufferedMap`] pull loop.
//! - [`worker`] — spawned tasks performing one advancement (+ transform).
//! - [`fairness`] — least-debt producer selection for unordered mode.
//! - [`lifecycle`] — best-effort concurrent close of tracked producers.

mod fairness;
mod lifecycle;
mod scheduler;
mod worker;

pub use scheduler::{merge, BufferedMap};
