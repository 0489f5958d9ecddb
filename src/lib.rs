//! # bufmap
//!
//! **bufmap** is a buffered concurrent mapping primitive for async
//! sequences.
//!
//! Given a pull-based producer and an async transform, it keeps up to N
//! transform invocations in flight at once (bounded fan-out), optionally
//! flattens transforms whose outcome is itself a nested sequence, and
//! emits results either in completion order (throughput-optimized,
//! default) or strict input order (deterministic).
//!
//! ## Architecture
//! ```text
//!     ┌──────────────┐      ┌─────────────────┐
//!     │ caller input │─────►│ Source (Finite │
//!     │ (Vec / impl  │      │  or Pull)       │
//!     │  Produce)    │      └────────┬────────┘
//!     └──────────────┘               ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │  BufferedMap (sequence scheduler)                         │
//! │  - task buffer (≤ capacity spawned workers)               │
//! │  - live sub-producer list (discovered at runtime)         │
//! │  - fairness selector (unordered) / head-of-line (ordered) │
//! │  - latched first error, cancellation token, event bus     │
//! └──────┬─────────────────┬──────────────────┬───────────────┘
//!        ▼                 ▼                  ▼
//!   root worker       root worker        sub worker
//!   advance+transform advance+transform  advance
//!        │                 │                  │
//!        └────────► settled StepOutcome ◄─────┘
//!                          │
//!                          ▼
//!        Item → consumer   Sequence → new sub-producer
//!        Done → retire     Failed → latch / drain / surface once
//! ```
//!
//! ## Delivery modes
//! | Mode          | Racing               | Target selection                  |
//! |---------------|----------------------|-----------------------------------|
//! | unordered     | all buffered workers | fairness: fewest buffered tasks   |
//! | ordered       | head worker only     | most-recently-registered sub first|
//!
//! ## Flattening
//! The transform returns a [`Mapped`] variant **synchronously**:
//! [`Mapped::Sequence`] registers a sub-producer whose items are flattened
//! into the output; [`Mapped::Value`] is awaited and emitted as one opaque
//! item — even when the resolved value happens to be producer-shaped.
//! Classification is by invocation shape, never by resolved-value shape.
//!
//! ## Lifecycle guarantees
//! Every producer the scheduler ever registered is closed on every exit
//! path: normal exhaustion, early cancellation ([`BufferedMap::close`]),
//! caller abort ([`BufferedMap::fail`]), or failure. The first error is
//! latched and surfaced exactly once; later pulls yield clean exhaustion.
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference
//!   only)_ that drains the scheduler's event bus to stdout.
//!
//! ## Example
//! ```rust
//! use bufmap::{BufferedMap, IterSource, MapConfig, MapError, Mapped};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), MapError> {
//!     // Fan each number out into a nested sequence; sub-sequences are
//!     // flattened into the shared output under one concurrency budget.
//!     let mut map = BufferedMap::new(
//!         vec![0, 10, 20],
//!         |item: i32| Mapped::sequence(IterSource::new(vec![item, item + 1])),
//!         MapConfig::default(),
//!     )?;
//!
//!     let mut seen = Vec::new();
//!     while let Some(value) = map.advance().await? {
//!         seen.push(value);
//!     }
//!     seen.sort_unstable();
//!     assert_eq!(seen, vec![0, 1, 10, 11, 20, 21]);
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod sources;
mod transform;

// ---- Public re-exports ----

pub use config::MapConfig;
pub use core::{merge, BufferedMap};
pub use error::MapError;
pub use events::{Bus, Event, EventKind};
pub use sources::{IterSource, Produce, SharedProducer, Source};
pub use transform::{Mapped, Transform};

// Optional: expose a simple built-in event logger (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use events::LogWriter;
