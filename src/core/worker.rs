//! # Worker tasks: one outstanding advancement per buffer slot.
//!
//! A worker is one spawned task bound to exactly one producer. It pulls one
//! step from its producer and, for root workers, runs the transform on the
//! pulled item. Its settled value is a [`StepOutcome`] the scheduler
//! dispatches on.
//!
//! ## Flow
//! ```text
//! Root worker:
//!   lock(root) → advance() → unlock
//!     Ok(Some(item)) → transform(item)
//!         Mapped::Value(fut)   → await fut → Item(v) | Failed(e)
//!         Mapped::Sequence(p)  → Sequence(p)           (no await)
//!     Ok(None) → Done
//!     Err(e)   → Failed(e)
//!
//! Sub worker:
//!   lock(sub) → advance() → unlock
//!     Ok(Some(item)) → Item(item)
//!     Ok(None)       → Done
//!     Err(e)         → Failed(e)
//! ```
//!
//! ## Rules
//! - The producer lock is held only across `advance()`, never across the
//!   transform, so slow transforms do not serialize other pulls.
//! - Every suspension point (lock, advance, transform future) is raced
//!   against the shutdown [`CancellationToken`]; a cancelled worker settles
//!   as [`StepOutcome::Cancelled`] and touches nothing further.
//! - Only root workers can settle as `Sequence`.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::MapError;
use crate::sources::{Produce, SharedProducer};
use crate::transform::{Mapped, Transform};

/// Identifier of a live sub-producer.
pub(crate) type SubId = u64;

/// Which producer a buffered task is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Owner {
    /// The single root producer created at construction.
    Root,
    /// A sub-producer discovered from a sequence-valued transform.
    Sub(SubId),
}

/// Settled value of one worker task.
pub(crate) enum StepOutcome<R> {
    /// A plain value, ready for the consumer.
    Item(R),
    /// A nested sequence discovered by a root worker.
    Sequence(Box<dyn Produce<R>>),
    /// The owning producer signalled exhaustion.
    Done,
    /// The advancement or the transform failed.
    Failed(MapError),
    /// Shutdown cancelled the worker before it settled.
    Cancelled,
}

/// One buffered task: its owner plus the handle to the spawned worker.
pub(crate) struct TaskEntry<R> {
    pub(crate) owner: Owner,
    pub(crate) handle: JoinHandle<StepOutcome<R>>,
}

/// Spawns a root worker: one root advancement plus the attached transform.
pub(crate) fn spawn_root<T, R>(
    root: SharedProducer<T>,
    transform: Transform<T, R>,
    cancel: CancellationToken,
) -> JoinHandle<StepOutcome<R>>
where
    T: Send + 'static,
    R: Send + 'static,
{
    tokio::spawn(async move {
        let step = {
            let mut guard = tokio::select! {
                biased;
                _ = cancel.cancelled() => return StepOutcome::Cancelled,
                guard = root.lock() => guard,
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return StepOutcome::Cancelled,
                step = guard.advance() => step,
            }
        };

        match step {
            Ok(Some(item)) => match (transform)(item) {
                Mapped::Value(fut) => tokio::select! {
                    biased;
                    _ = cancel.cancelled() => StepOutcome::Cancelled,
                    res = fut => match res {
                        Ok(value) => StepOutcome::Item(value),
                        Err(e) => StepOutcome::Failed(e),
                    },
                },
                Mapped::Sequence(producer) => StepOutcome::Sequence(producer),
            },
            Ok(None) => StepOutcome::Done,
            Err(e) => StepOutcome::Failed(e),
        }
    })
}

/// Spawns a sub worker: one advancement of a live sub-producer.
pub(crate) fn spawn_sub<R>(
    sub: SharedProducer<R>,
    cancel: CancellationToken,
) -> JoinHandle<StepOutcome<R>>
where
    R: Send + 'static,
{
    tokio::spawn(async move {
        let step = {
            let mut guard = tokio::select! {
                biased;
                _ = cancel.cancelled() => return StepOutcome::Cancelled,
                guard = sub.lock() => guard,
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return StepOutcome::Cancelled,
                step = guard.advance() => step,
            }
        };

        match step {
            Ok(Some(item)) => StepOutcome::Item(item),
            Ok(None) => StepOutcome::Done,
            Err(e) => StepOutcome::Failed(e),
        }
    })
}
