//! # Input capability layer: producers and input normalization.
//!
//! - [`Produce`] — the pull-based producer contract (`advance`/`close`).
//! - [`IterSource`] — trivial one-shot producer over a finite collection.
//! - [`Source`] — sum type normalizing caller input into a producer.

mod iter;
mod produce;
mod source;

pub use iter::IterSource;
pub use produce::{Produce, SharedProducer};
pub use source::Source;

pub(crate) use produce::shared;
