//! # BufferedMap: the sequence scheduler.
//!
//! Owns the task buffer and the producer set, drains completed worker
//! tasks, discovers and retires sub-producers, and exposes the
//! consumer-facing pull surface.
//!
//! ## Architecture
//! ```text
//!   consumer ──► advance() ─────────────────────────────┐
//!                   │                                   │
//!                   ▼                                   │
//!           ┌───────────────┐   race (all tasks, or     │
//!           │  task buffer  │   head task when ordered) │
//!           │ [w1 w2 .. wN] │◄──────────────────────────┘
//!           └──┬───────┬────┘
//!              │       │ spawn up to `capacity` workers
//!              ▼       ▼
//!          root producer    sub-producers (discovered at
//!          (+ transform)    runtime, flattened into output)
//! ```
//!
//! ## Drain dispatch
//! ```text
//! settled worker ──► Item(v)      → top up buffer, hand v to consumer
//!                    Sequence(p)  → register sub, schedule task for it,
//!                                   continue without emitting
//!                    Done (root)  → mark root exhausted, top up from subs
//!                    Done (sub)   → retire sub, top up per policy
//!                    Failed(e)    → latch first error, retire failed sub,
//!                                   keep draining; surface once the
//!                                   buffer empties
//!                    Cancelled    → discard (shutdown already ran)
//! ```
//!
//! ## Rules
//! - At most `capacity` worker tasks are buffered, unless no eligible
//!   producer remains.
//! - Unordered mode races every buffered task and picks targets with the
//!   fairness selector; ordered mode awaits the head task only and always
//!   targets the most-recently-registered live sub-producer.
//! - The first error is latched and surfaced to the consumer exactly once;
//!   every later pull yields clean exhaustion. Once latched, no new root
//!   tasks are scheduled: in-flight tasks settle and live subs drain, but
//!   the root is not pulled further.
//! - Every producer the scheduler ever touched is closed on every exit
//!   path: exhaustion, cancellation, or failure.
//!
//! ## Example
//! ```rust
//! use bufmap::{BufferedMap, MapConfig, MapError, Mapped};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), MapError> {
//!     let mut map = BufferedMap::new(
//!         vec![1, 2, 3],
//!         |item: i32| Mapped::future(async move { Ok(item * 10) }),
//!         MapConfig::default(),
//!     )?;
//!
//!     let mut seen = Vec::new();
//!     while let Some(value) = map.advance().await? {
//!         seen.push(value);
//!     }
//!     seen.sort_unstable();
//!     assert_eq!(seen, vec![10, 20, 30]);
//!     Ok(())
//! }
//! ```

use std::collections::VecDeque;
use std::future::{poll_fn, Future};
use std::pin::Pin;
use std::sync::Arc;
use std::task::Poll;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::MapConfig;
use crate::core::fairness;
use crate::core::lifecycle;
use crate::core::worker::{self, Owner, StepOutcome, SubId, TaskEntry};
use crate::error::MapError;
use crate::events::{Bus, Event, EventKind};
use crate::sources::{shared, Produce, SharedProducer, Source};
use crate::transform::{Mapped, Transform};

/// Buffered concurrent map over an async sequence.
///
/// Pulls items from a root producer, applies the transform with up to
/// `capacity` invocations in flight, flattens sequence-valued outcomes,
/// and delivers results in completion order (default) or strict input
/// order. Implements [`Produce`] itself, so instances compose: one map's
/// output is a valid input for another.
///
/// Consumer pulls are serialized by `&mut self`; overlapping pulls are a
/// compile error rather than a runtime race.
pub struct BufferedMap<T, R> {
    transform: Transform<T, R>,
    root: SharedProducer<T>,
    root_exhausted: bool,
    terminated: bool,
    latched: Option<MapError>,
    subs: VecDeque<(SubId, SharedProducer<R>)>,
    buffer: VecDeque<TaskEntry<R>>,
    capacity: usize,
    ordered: bool,
    next_sub: SubId,
    cancel: CancellationToken,
    bus: Bus,
}

impl<T, R> BufferedMap<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    /// Creates the scheduler and primes the buffer up to capacity.
    ///
    /// Accepts anything convertible into a [`Source`]: a finite collection
    /// or a live [`Produce`] handle. Returns
    /// [`MapError::InvalidCapacity`] when `config.capacity` is zero.
    ///
    /// Must be called within a tokio runtime; worker tasks are spawned
    /// immediately.
    pub fn new<F>(
        input: impl Into<Source<T>>,
        transform: F,
        config: MapConfig,
    ) -> Result<Self, MapError>
    where
        F: Fn(T) -> Mapped<R> + Send + Sync + 'static,
    {
        config.validate()?;

        let mut map = Self {
            transform: Arc::new(transform),
            root: input.into().into_shared(),
            root_exhausted: false,
            terminated: false,
            latched: None,
            subs: VecDeque::new(),
            buffer: VecDeque::new(),
            capacity: config.capacity,
            ordered: config.ordered,
            next_sub: 0,
            cancel: CancellationToken::new(),
            bus: Bus::new(config.bus_capacity),
        };
        map.fill_buffer();
        Ok(map)
    }

    /// Pulls the next mapped value.
    ///
    /// Returns `Ok(Some(value))` for each result, `Ok(None)` on clean
    /// exhaustion, and `Err` exactly once when an error was latched; pulls
    /// after the terminal outcome keep yielding `Ok(None)`.
    pub async fn advance(&mut self) -> Result<Option<R>, MapError> {
        loop {
            if self.terminated {
                return Ok(None);
            }
            if self.buffer.is_empty() {
                return self.shutdown(true).await;
            }

            let (owner, outcome) = self.race().await;
            match outcome {
                StepOutcome::Item(value) => {
                    self.fill_buffer();
                    self.bus.publish(Event::new(EventKind::ItemDelivered));
                    return Ok(Some(value));
                }
                StepOutcome::Sequence(producer) => {
                    let id = self.register_sub(producer);
                    self.schedule(Owner::Sub(id));
                    self.fill_buffer();
                }
                StepOutcome::Done => {
                    match owner {
                        Owner::Root => {
                            if !self.root_exhausted {
                                self.root_exhausted = true;
                                self.bus.publish(Event::new(EventKind::RootExhausted));
                            }
                        }
                        Owner::Sub(id) => self.retire_sub(id, false),
                    }
                    self.fill_buffer();
                    if self.buffer.is_empty() {
                        return self.shutdown(true).await;
                    }
                }
                StepOutcome::Failed(e) => {
                    if self.latched.is_none() {
                        self.bus
                            .publish(Event::new(EventKind::ErrorLatched).with_error(e.to_string()));
                        self.latched = Some(e);
                    }
                    let was_sub = matches!(owner, Owner::Sub(_));
                    if let Owner::Sub(id) = owner {
                        self.retire_sub(id, true);
                    }
                    if was_sub || !self.subs.is_empty() {
                        self.fill_buffer();
                    }
                    if self.buffer.is_empty() {
                        return self.shutdown(true).await;
                    }
                }
                StepOutcome::Cancelled => {}
            }
        }
    }

    /// Cancels the sequence.
    ///
    /// Idempotent: closes every tracked producer best-effort; later pulls
    /// yield `Ok(None)` without surfacing any latched error.
    pub async fn close(&mut self) {
        let _ = self.shutdown(false).await;
    }

    /// Aborts the sequence with a caller-supplied error.
    ///
    /// Runs the same shutdown as [`close`](Self::close), discards any
    /// latched error, and resolves as a failure carrying `error`.
    pub async fn fail(&mut self, error: MapError) -> Result<Option<R>, MapError> {
        let _ = self.shutdown(false).await;
        self.latched = None;
        Err(error)
    }

    /// Creates a receiver observing subsequent scheduler events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Awaits the next settled worker and removes it from the buffer.
    ///
    /// Unordered mode races every buffered task; ordered mode awaits the
    /// head task only, for strict head-of-line delivery.
    async fn race(&mut self) -> (Owner, StepOutcome<R>) {
        let ordered = self.ordered;
        let buffer = &mut self.buffer;

        let (idx, owner, joined) = poll_fn(|cx| {
            let span = if ordered { 1 } else { buffer.len() };
            for i in 0..span {
                if let Poll::Ready(res) = Pin::new(&mut buffer[i].handle).poll(cx) {
                    return Poll::Ready((i, buffer[i].owner, res));
                }
            }
            Poll::Pending
        })
        .await;

        let _ = self.buffer.remove(idx);

        // A worker that panicked settles as a protocol violation.
        let outcome = joined.unwrap_or(StepOutcome::Failed(MapError::InvalidStep));
        (owner, outcome)
    }

    /// Tops up the buffer until capacity or until no producer is eligible.
    fn fill_buffer(&mut self) {
        if self.terminated {
            return;
        }
        while self.buffer.len() < self.capacity {
            let Some(owner) = self.pick_target() else {
                break;
            };
            self.schedule(owner);
        }
    }

    /// Chooses the producer the next task should target.
    ///
    /// Ordered mode: the most-recently-registered live sub-producer, then
    /// the root. Unordered mode: the fairness selector over live subs
    /// (enumerated first) plus the root.
    ///
    /// A latched error removes the root from eligibility: live subs keep
    /// draining, but no further items are pulled from the root, so the
    /// error surfaces as soon as the in-flight tasks settle.
    fn pick_target(&self) -> Option<Owner> {
        let root_eligible = !self.root_exhausted && self.latched.is_none();
        if self.ordered {
            return self
                .subs
                .front()
                .map(|(id, _)| Owner::Sub(*id))
                .or_else(|| root_eligible.then_some(Owner::Root));
        }

        let mut eligible: Vec<Owner> = self.subs.iter().map(|(id, _)| Owner::Sub(*id)).collect();
        if root_eligible {
            eligible.push(Owner::Root);
        }
        fairness::pick_least_loaded(&eligible, self.buffer.iter().map(|e| e.owner))
    }

    /// Spawns one worker against `owner` and inserts it into the buffer.
    fn schedule(&mut self, owner: Owner) {
        let handle = match owner {
            Owner::Root => worker::spawn_root(
                self.root.clone(),
                self.transform.clone(),
                self.cancel.clone(),
            ),
            Owner::Sub(id) => {
                let Some((_, producer)) = self.subs.iter().find(|(sid, _)| *sid == id) else {
                    return;
                };
                worker::spawn_sub(producer.clone(), self.cancel.clone())
            }
        };

        let mut ev = Event::new(EventKind::TaskScheduled);
        if let Owner::Sub(id) = owner {
            ev = ev.with_sub(id);
        }
        self.bus.publish(ev);

        self.insert_entry(TaskEntry { owner, handle });
    }

    /// Places a new task into the buffer.
    ///
    /// Unordered mode appends. Ordered mode inserts immediately after the
    /// last existing task owned by the same producer, so each producer's
    /// results drain in strict per-producer sequential order; a producer
    /// with no buffered tasks goes to the front (sub) or the back (root).
    fn insert_entry(&mut self, entry: TaskEntry<R>) {
        if !self.ordered {
            self.buffer.push_back(entry);
            return;
        }

        let pos = self
            .buffer
            .iter()
            .rposition(|e| e.owner == entry.owner)
            .map(|i| i + 1)
            .unwrap_or(match entry.owner {
                Owner::Sub(_) => 0,
                Owner::Root => self.buffer.len(),
            });
        self.buffer.insert(pos, entry);
    }

    /// Registers a discovered sub-producer and returns its id.
    fn register_sub(&mut self, producer: Box<dyn Produce<R>>) -> SubId {
        let id = self.next_sub;
        self.next_sub += 1;

        let handle = shared(producer);
        if self.ordered {
            self.subs.push_front((id, handle));
        } else {
            self.subs.push_back((id, handle));
        }

        self.bus
            .publish(Event::new(EventKind::SubDiscovered).with_sub(id));
        id
    }

    /// Removes a sub-producer from the live set.
    ///
    /// A sub retired on failure still gets its close issued, on a detached
    /// task; an exhausted sub completed its own lifecycle.
    fn retire_sub(&mut self, id: SubId, failed: bool) {
        let Some(pos) = self.subs.iter().position(|(sid, _)| *sid == id) else {
            return;
        };
        if let Some((_, producer)) = self.subs.remove(pos) {
            if failed {
                lifecycle::close_detached(id, producer, &self.bus);
            }
        }
        self.bus
            .publish(Event::new(EventKind::SubRetired).with_sub(id));
    }

    /// Terminates the scheduler and settles the terminal outcome.
    ///
    /// No-op when already terminated. Cancels in-flight workers, drops
    /// their handles (they settle in the background), closes the root (if
    /// not exhausted) and every live sub-producer concurrently, then
    /// surfaces the latched error when asked to — exactly once.
    async fn shutdown(&mut self, surface_error: bool) -> Result<Option<R>, MapError> {
        if !self.terminated {
            self.terminated = true;
            self.bus.publish(Event::new(EventKind::ShutdownStarted));
            self.cancel.cancel();
            self.buffer.clear();

            let root = (!self.root_exhausted).then(|| self.root.clone());
            let subs: Vec<(SubId, SharedProducer<R>)> = self.subs.drain(..).collect();
            lifecycle::close_all(root, subs, &self.bus).await;

            self.bus.publish(Event::new(EventKind::Terminated));
        }

        if surface_error {
            if let Some(err) = self.latched.take() {
                return Err(err);
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl<T, R> Produce<R> for BufferedMap<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    async fn advance(&mut self) -> Result<Option<R>, MapError> {
        BufferedMap::advance(self).await
    }

    async fn close(&mut self) -> Result<(), MapError> {
        BufferedMap::close(self).await;
        Ok(())
    }
}

/// Merges any number of producers into one output sequence.
///
/// Each source is flattened into the shared output under one concurrency
/// budget and one fairness policy; lifecycle and error semantics are those
/// of [`BufferedMap`].
///
/// # Example
/// ```rust
/// use bufmap::{merge, IterSource, MapConfig, MapError, Produce};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), MapError> {
///     let sources: Vec<Box<dyn Produce<i32>>> = vec![
///         Box::new(IterSource::new(vec![1, 2])),
///         Box::new(IterSource::new(vec![3])),
///     ];
///
///     let mut merged = merge(sources, MapConfig::default())?;
///     let mut seen = Vec::new();
///     while let Some(value) = merged.advance().await? {
///         seen.push(value);
///     }
///     seen.sort_unstable();
///     assert_eq!(seen, vec![1, 2, 3]);
///     Ok(())
/// }
/// ```
pub fn merge<R>(
    sources: Vec<Box<dyn Produce<R>>>,
    config: MapConfig,
) -> Result<BufferedMap<Box<dyn Produce<R>>, R>, MapError>
where
    R: Send + 'static,
{
    BufferedMap::new(Source::finite(sources), Mapped::Sequence, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::IterSource;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use tokio::time::sleep;

    /// Producer that sleeps before each step and records `close()`.
    struct Tracked {
        items: std::vec::IntoIter<i32>,
        delay: Duration,
        closed: Arc<AtomicBool>,
    }

    impl Tracked {
        fn new(items: Vec<i32>, delay_ms: u64, closed: Arc<AtomicBool>) -> Self {
            Self {
                items: items.into_iter(),
                delay: Duration::from_millis(delay_ms),
                closed,
            }
        }
    }

    #[async_trait]
    impl Produce<i32> for Tracked {
        async fn advance(&mut self) -> Result<Option<i32>, MapError> {
            sleep(self.delay).await;
            Ok(self.items.next())
        }

        async fn close(&mut self) -> Result<(), MapError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn drain(map: &mut BufferedMap<i32, i32>) -> (Vec<i32>, Vec<MapError>) {
        let mut values = Vec::new();
        let mut errors = Vec::new();
        loop {
            match map.advance().await {
                Ok(Some(value)) => values.push(value),
                Ok(None) => break,
                Err(e) => errors.push(e),
            }
        }
        (values, errors)
    }

    #[tokio::test]
    async fn test_identity_preserves_multiset() {
        let mut map =
            BufferedMap::new((0..10).collect::<Vec<_>>(), Mapped::ready, MapConfig::default())
                .unwrap();

        let (mut values, errors) = drain(&mut map).await;
        values.sort_unstable();
        assert_eq!(values, (0..10).collect::<Vec<_>>());
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn test_empty_input_exhausts_immediately() {
        let mut map =
            BufferedMap::new(Vec::<i32>::new(), Mapped::ready, MapConfig::default()).unwrap();
        assert!(map.advance().await.unwrap().is_none());
        assert!(map.advance().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_capacity_rejected_at_construction() {
        let cfg = MapConfig {
            capacity: 0,
            ..MapConfig::default()
        };
        let res = BufferedMap::new(vec![1], Mapped::ready, cfg);
        assert!(matches!(res, Err(MapError::InvalidCapacity)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unordered_emits_in_completion_order() {
        let mut map = BufferedMap::new(
            vec![10, 20, 30],
            |item: i32| {
                Mapped::future(async move {
                    let delay = match item {
                        10 => 100,
                        20 => 2000,
                        _ => 300,
                    };
                    sleep(Duration::from_millis(delay)).await;
                    Ok(item)
                })
            },
            MapConfig::default(),
        )
        .unwrap();

        let (values, errors) = drain(&mut map).await;
        assert_eq!(values, vec![10, 30, 20]);
        assert!(errors.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ordered_preserves_input_order_exactly() {
        let cfg = MapConfig {
            ordered: true,
            ..MapConfig::default()
        };
        let mut map = BufferedMap::new(
            (0..10).collect::<Vec<_>>(),
            |item: i32| {
                Mapped::future(async move {
                    let delay = if item % 2 == 1 { 200 } else { 10 };
                    sleep(Duration::from_millis(delay)).await;
                    Ok(item)
                })
            },
            cfg,
        )
        .unwrap();

        let (values, errors) = drain(&mut map).await;
        assert_eq!(values, (0..10).collect::<Vec<_>>());
        assert!(errors.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_transforms_never_exceed_capacity() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let cfg = MapConfig {
            capacity: 3,
            ..MapConfig::default()
        };
        let mut map = BufferedMap::new(
            (0..12).collect::<Vec<_>>(),
            {
                let in_flight = in_flight.clone();
                let max_seen = max_seen.clone();
                move |item: i32| {
                    let in_flight = in_flight.clone();
                    let max_seen = max_seen.clone();
                    Mapped::future(async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        sleep(Duration::from_millis(50)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok(item)
                    })
                }
            },
            cfg,
        )
        .unwrap();

        let (values, errors) = drain(&mut map).await;
        assert_eq!(values.len(), 12);
        assert!(errors.is_empty());
        assert!(max_seen.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_sequence_outcomes_are_flattened() {
        let mut map = BufferedMap::new(
            vec![0, 1, 2],
            |item: i32| Mapped::sequence(IterSource::new(vec![item * 10, item * 10 + 1])),
            MapConfig::default(),
        )
        .unwrap();

        let (mut values, errors) = drain(&mut map).await;
        values.sort_unstable();
        assert_eq!(values, vec![0, 1, 10, 11, 20, 21]);
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn test_deferred_collection_is_one_opaque_item() {
        let mut map = BufferedMap::new(
            vec![0, 1, 2],
            |item: i32| Mapped::future(async move { Ok(vec![item * 10, item * 10 + 1]) }),
            MapConfig::default(),
        )
        .unwrap();

        let mut values = Vec::new();
        while let Some(batch) = map.advance().await.unwrap() {
            values.push(batch);
        }
        values.sort_unstable();
        assert_eq!(values, vec![vec![0, 1], vec![10, 11], vec![20, 21]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ordered_flattening_is_depth_first() {
        let cfg = MapConfig {
            ordered: true,
            ..MapConfig::default()
        };
        let mut map = BufferedMap::new(
            vec![0, 1, 2],
            |item: i32| {
                Mapped::sequence(Tracked::new(
                    vec![item * 10, item * 10 + 1, item * 10 + 2],
                    if item % 2 == 1 { 40 } else { 5 },
                    Arc::new(AtomicBool::new(false)),
                ))
            },
            cfg,
        )
        .unwrap();

        let (values, errors) = drain(&mut map).await;
        assert_eq!(values, vec![0, 1, 2, 10, 11, 12, 20, 21, 22]);
        assert!(errors.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_failure_surfaces_exactly_once() {
        let mut map = BufferedMap::new(
            (0..6).collect::<Vec<_>>(),
            |item: i32| {
                Mapped::future(async move {
                    if item == 3 {
                        return Err(MapError::transform(format!("item {item} refused")));
                    }
                    Ok(item)
                })
            },
            MapConfig::default(),
        )
        .unwrap();

        let (mut values, errors) = drain(&mut map).await;
        values.sort_unstable();
        assert_eq!(values, vec![0, 1, 2, 4, 5]);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], MapError::Transform { .. }));

        // Terminal outcome already settled; further pulls stay exhausted.
        assert!(map.advance().await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_error_wins_latching() {
        let mut map = BufferedMap::new(
            vec![0, 1],
            |item: i32| {
                Mapped::future(async move {
                    sleep(Duration::from_millis(100 * (item as u64 + 1))).await;
                    Err(MapError::transform(format!("item {item}")))
                })
            },
            MapConfig::default(),
        )
        .unwrap();

        let (values, errors) = drain(&mut map).await;
        assert!(values.is_empty());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "transform failed: item 0");
    }

    #[tokio::test(start_paused = true)]
    async fn test_latched_error_stops_root_pulls_and_closes_root() {
        let root_closed = Arc::new(AtomicBool::new(false));
        let calls = Arc::new(AtomicUsize::new(0));

        let cfg = MapConfig {
            capacity: 5,
            ..MapConfig::default()
        };
        let mut map = BufferedMap::new(
            Source::pull(Tracked::new((0..60).collect(), 0, root_closed.clone())),
            {
                let calls = calls.clone();
                move |item: i32| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Mapped::future(async move {
                        if item == 1 {
                            sleep(Duration::from_millis(5)).await;
                            return Err(MapError::transform("item 1 refused"));
                        }
                        sleep(Duration::from_millis(20)).await;
                        Ok(item)
                    })
                }
            },
            cfg,
        )
        .unwrap();

        let (mut values, errors) = drain(&mut map).await;
        values.sort_unstable();
        assert_eq!(values, vec![0, 2, 3, 4]);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], MapError::Transform { .. }));

        // Only the primed invocations ran: the latch stops further root
        // pulls, so the 60-item source is never drained.
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        // The root never exhausted, so shutdown must still close it.
        assert!(root_closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_panicking_transform_surfaces_single_invalid_step() {
        let mut map = BufferedMap::new(
            (0..100).collect::<Vec<_>>(),
            |item: i32| {
                Mapped::future(async move {
                    if item == 2 {
                        panic!("worker gave up");
                    }
                    Ok(item)
                })
            },
            MapConfig::default(),
        )
        .unwrap();

        let (values, errors) = drain(&mut map).await;
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], MapError::InvalidStep));
        assert!(!values.contains(&2));
        assert!(values.len() < 100);

        assert!(map.advance().await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_reaches_root_and_every_discovered_sub() {
        let root_closed = Arc::new(AtomicBool::new(false));
        let sub_flags: Arc<StdMutex<Vec<Arc<AtomicBool>>>> = Arc::new(StdMutex::new(Vec::new()));

        let mut map = BufferedMap::new(
            Source::pull(Tracked::new(
                (0..20).collect(),
                5,
                root_closed.clone(),
            )),
            {
                let sub_flags = sub_flags.clone();
                move |item: i32| {
                    let closed = Arc::new(AtomicBool::new(false));
                    sub_flags.lock().unwrap().push(closed.clone());
                    Mapped::sequence(Tracked::new(vec![item; 10], 5, closed))
                }
            },
            MapConfig::default(),
        )
        .unwrap();

        let mut rx = map.subscribe();

        // Consume a couple of flattened items, then cancel mid-stream.
        assert!(map.advance().await.unwrap().is_some());
        assert!(map.advance().await.unwrap().is_some());

        map.close().await;

        // Every sub-producer the scheduler registered must see its close;
        // sequence outcomes dropped undrained were never started at all.
        let mut discovered = 0;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::SubDiscovered {
                discovered += 1;
            }
        }
        assert!(discovered > 0);

        let closed = sub_flags
            .lock()
            .unwrap()
            .iter()
            .filter(|flag| flag.load(Ordering::SeqCst))
            .count();
        assert_eq!(closed, discovered);
        assert!(root_closed.load(Ordering::SeqCst));

        // Pulls after cancellation yield exhaustion without throwing.
        assert!(map.advance().await.unwrap().is_none());
        map.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_source_closes_producers_and_surfaces_error() {
        struct Failing {
            closed: Arc<AtomicBool>,
        }

        #[async_trait]
        impl Produce<i32> for Failing {
            async fn advance(&mut self) -> Result<Option<i32>, MapError> {
                sleep(Duration::from_millis(10)).await;
                Err(MapError::source("stream reset"))
            }

            async fn close(&mut self) -> Result<(), MapError> {
                self.closed.store(true, Ordering::SeqCst);
                Ok(())
            }
        }

        let closed = Arc::new(AtomicBool::new(false));
        let mut map = BufferedMap::new(
            Source::pull(Failing {
                closed: closed.clone(),
            }),
            Mapped::ready,
            MapConfig::default(),
        )
        .unwrap();

        let (values, errors) = drain(&mut map).await;
        assert!(values.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], MapError::Source { .. }));
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_fail_propagates_caller_error_over_latched_state() {
        let mut map =
            BufferedMap::new((0..10).collect::<Vec<_>>(), Mapped::ready, MapConfig::default())
                .unwrap();

        assert!(map.advance().await.unwrap().is_some());

        let res = map.fail(MapError::aborted("consumer gave up")).await;
        assert!(matches!(res, Err(MapError::Aborted { .. })));

        assert!(map.advance().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_instances_chain_without_loss() {
        let stage_one = BufferedMap::new(
            (0..10).collect::<Vec<_>>(),
            Mapped::ready,
            MapConfig::default(),
        )
        .unwrap();

        let mut stage_two = BufferedMap::new(
            Source::pull(stage_one),
            |item: i32| Mapped::future(async move { Ok(item * 2) }),
            MapConfig::default(),
        )
        .unwrap();

        let (mut values, errors) = drain(&mut stage_two).await;
        values.sort_unstable();
        assert_eq!(values, (0..10).map(|i| i * 2).collect::<Vec<_>>());
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn test_merge_combines_all_sources() {
        let sources: Vec<Box<dyn Produce<i32>>> = vec![
            Box::new(IterSource::new(vec![1, 2, 3])),
            Box::new(IterSource::new(vec![4, 5])),
            Box::new(IterSource::new(Vec::new())),
        ];

        let mut merged = merge(sources, MapConfig::default()).unwrap();
        let mut values = Vec::new();
        while let Some(value) = merged.advance().await.unwrap() {
            values.push(value);
        }
        values.sort_unstable();
        assert_eq!(values, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_events_cover_discovery_and_termination() {
        let mut map = BufferedMap::new(
            vec![0, 1],
            |item: i32| Mapped::sequence(IterSource::new(vec![item])),
            MapConfig::default(),
        )
        .unwrap();
        let mut rx = map.subscribe();

        let (mut values, errors) = drain(&mut map).await;
        values.sort_unstable();
        assert_eq!(values, vec![0, 1]);
        assert!(errors.is_empty());

        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        assert!(kinds.contains(&EventKind::SubDiscovered));
        assert!(kinds.contains(&EventKind::SubRetired));
        assert!(kinds.contains(&EventKind::RootExhausted));
        assert!(kinds.contains(&EventKind::Terminated));
    }
}
