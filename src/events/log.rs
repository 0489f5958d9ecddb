use tokio::task::JoinHandle;

use super::{Bus, Event, EventKind};

/// Demo sink that logs scheduler events to stdout.
///
/// Enabled via the `logging` feature. Useful for demos and debugging.
pub struct LogWriter;

impl LogWriter {
    /// Subscribes to `bus` and drains events on a spawned task.
    ///
    /// The task exits when the bus is dropped.
    pub fn spawn(bus: &Bus) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            while let Ok(ev) = rx.recv().await {
                Self::write(&ev);
            }
        })
    }

    fn write(ev: &Event) {
        match ev.kind {
            EventKind::TaskScheduled => match ev.sub {
                Some(sub) => println!("[scheduled] seq={} sub={sub}", ev.seq),
                None => println!("[scheduled] seq={} root", ev.seq),
            },
            EventKind::ItemDelivered => println!("[delivered] seq={}", ev.seq),
            EventKind::SubDiscovered => {
                println!("[sub-discovered] seq={} sub={:?}", ev.seq, ev.sub);
            }
            EventKind::SubRetired => {
                println!("[sub-retired] seq={} sub={:?}", ev.seq, ev.sub);
            }
            EventKind::RootExhausted => println!("[root-exhausted] seq={}", ev.seq),
            EventKind::ErrorLatched => {
                println!("[error-latched] seq={} err={:?}", ev.seq, ev.error);
            }
            EventKind::CloseFailed => {
                println!("[close-failed] seq={} sub={:?} err={:?}", ev.seq, ev.sub, ev.error);
            }
            EventKind::ShutdownStarted => println!("[shutdown] seq={}", ev.seq),
            EventKind::Terminated => println!("[terminated] seq={}", ev.seq),
        }
    }
}
