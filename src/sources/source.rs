//! # Input normalization.
//!
//! [`Source`] is the sum type the scheduler accepts as input: either a
//! plain finite collection (wrapped in an [`IterSource`] one-shot producer)
//! or a value that already satisfies the pull-based [`Produce`] contract.
//! Anything else is unrepresentable — the type system takes the place of
//! the duck-typed capability checks of dynamic runtimes.

use crate::sources::iter::IterSource;
use crate::sources::produce::{shared, Produce, SharedProducer};

/// Caller input to a [`BufferedMap`](crate::BufferedMap).
pub enum Source<T> {
    /// A finite collection, yielded element by element then exhausted.
    Finite(Box<dyn Produce<T>>),
    /// A live pull-based producer, used directly.
    Pull(Box<dyn Produce<T>>),
}

impl<T: Send + 'static> Source<T> {
    /// Normalizes a finite collection into a one-shot producer.
    pub fn finite<I>(input: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        Source::Finite(Box::new(IterSource::new(input)))
    }

    /// Uses a pull-based producer directly.
    pub fn pull(producer: impl Produce<T>) -> Self {
        Source::Pull(Box::new(producer))
    }

    /// Hands the normalized producer to the scheduler.
    pub(crate) fn into_shared(self) -> SharedProducer<T> {
        match self {
            Source::Finite(producer) | Source::Pull(producer) => shared(producer),
        }
    }
}

impl<T: Send + 'static> From<Vec<T>> for Source<T> {
    fn from(input: Vec<T>) -> Self {
        Source::finite(input)
    }
}

impl<T: Send + 'static, const N: usize> From<[T; N]> for Source<T> {
    fn from(input: [T; N]) -> Self {
        Source::finite(input)
    }
}

impl<T> From<Box<dyn Produce<T>>> for Source<T> {
    fn from(producer: Box<dyn Produce<T>>) -> Self {
        Source::Pull(producer)
    }
}
