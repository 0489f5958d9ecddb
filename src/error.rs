//! Error types used by the buffered map scheduler and its producers.
//!
//! A single enum, [`MapError`], covers every failure the crate can surface:
//!
//! - construction-time validation (`InvalidCapacity`),
//! - producer advancement failures (`Source`),
//! - transform failures (`Transform`),
//! - protocol violations (`InvalidStep`),
//! - caller-injected aborts (`Aborted`).
//!
//! The scheduler latches the **first** non-construction error it sees and
//! surfaces it to the consumer exactly once; later errors observed while
//! draining are discarded. `as_label` provides a short stable label for
//! logs/metrics.

use thiserror::Error;

/// # Errors produced by the buffered map.
///
/// Producer implementations report advancement failures as
/// [`MapError::Source`]; transforms report theirs as [`MapError::Transform`].
/// The remaining variants are raised by the scheduler itself.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum MapError {
    /// Buffer capacity was zero at construction.
    #[error("buffer capacity must be a positive number")]
    InvalidCapacity,

    /// A producer failed to advance.
    #[error("source failed to advance: {error}")]
    Source {
        /// The underlying error message.
        error: String,
    },

    /// A transform invocation failed.
    #[error("transform failed: {error}")]
    Transform {
        /// The underlying error message.
        error: String,
    },

    /// A worker settled without producing a valid step (e.g. it panicked).
    #[error("worker settled without a valid step")]
    InvalidStep,

    /// The consumer aborted the sequence via [`fail`](crate::BufferedMap::fail).
    #[error("aborted by caller: {error}")]
    Aborted {
        /// The caller-supplied reason.
        error: String,
    },
}

impl MapError {
    /// Builds a [`MapError::Source`] from any displayable error.
    pub fn source(error: impl std::fmt::Display) -> Self {
        MapError::Source {
            error: error.to_string(),
        }
    }

    /// Builds a [`MapError::Transform`] from any displayable error.
    pub fn transform(error: impl std::fmt::Display) -> Self {
        MapError::Transform {
            error: error.to_string(),
        }
    }

    /// Builds a [`MapError::Aborted`] from any displayable reason.
    pub fn aborted(error: impl std::fmt::Display) -> Self {
        MapError::Aborted {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use bufmap::MapError;
    ///
    /// let err = MapError::source("connection reset");
    /// assert_eq!(err.as_label(), "source_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            MapError::InvalidCapacity => "invalid_capacity",
            MapError::Source { .. } => "source_failed",
            MapError::Transform { .. } => "transform_failed",
            MapError::InvalidStep => "invalid_step",
            MapError::Aborted { .. } => "aborted",
        }
    }
}
