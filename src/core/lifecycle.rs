//! # Lifecycle controller: best-effort close of every tracked producer.
//!
//! Invoked exactly once per scheduler, on the first of exhaustion,
//! cancellation, or failure. Closes the root (unless it already exhausted
//! itself) and every live sub-producer **concurrently**, swallowing
//! individual close failures so they never mask the primary outcome; each
//! swallowed failure is published as a [`EventKind::CloseFailed`] event.
//!
//! Close runs under the producer mutex, so a close issued while a worker's
//! advancement is still settling simply queues behind it; shutdown has
//! already cancelled the workers, so the lock frees promptly.

use futures::future::{join_all, BoxFuture};

use crate::events::{Bus, Event, EventKind};
use crate::sources::SharedProducer;

/// Closes the root (if any) and every live sub-producer concurrently.
///
/// Never fails; close errors are swallowed and published to `bus`.
pub(crate) async fn close_all<T, R>(
    root: Option<SharedProducer<T>>,
    subs: Vec<(u64, SharedProducer<R>)>,
    bus: &Bus,
) where
    T: Send + 'static,
    R: Send + 'static,
{
    let mut closes: Vec<BoxFuture<'static, (Option<u64>, Result<(), crate::MapError>)>> =
        Vec::with_capacity(subs.len() + 1);

    if let Some(root) = root {
        closes.push(Box::pin(async move {
            (None, root.lock().await.close().await)
        }));
    }
    for (id, sub) in subs {
        closes.push(Box::pin(async move {
            (Some(id), sub.lock().await.close().await)
        }));
    }

    for (id, res) in join_all(closes).await {
        if let Err(e) = res {
            let mut ev = Event::new(EventKind::CloseFailed).with_error(e.to_string());
            if let Some(id) = id {
                ev = ev.with_sub(id);
            }
            bus.publish(ev);
        }
    }
}

/// Closes a single retired producer on a detached task.
///
/// Used when a sub-producer fails mid-stream: it leaves the live set
/// immediately, but its close still has to be issued.
pub(crate) fn close_detached<R>(id: u64, sub: SharedProducer<R>, bus: &Bus)
where
    R: Send + 'static,
{
    let bus = bus.clone();
    tokio::spawn(async move {
        if let Err(e) = sub.lock().await.close().await {
            bus.publish(
                Event::new(EventKind::CloseFailed)
                    .with_sub(id)
                    .with_error(e.to_string()),
            );
        }
    });
}
