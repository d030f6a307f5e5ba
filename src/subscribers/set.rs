//! # SubscriberSet: non-blocking fan-out over multiple subscribers.
//!
//! [`SubscriberSet`] distributes each [`Event`] to multiple subscribers
//! **without awaiting** their processing.
//!
//! ## What it guarantees
//! - `emit(&Event)` returns immediately.
//! - Per-subscriber FIFO (queue order).
//! - Panics inside subscribers are caught and logged (isolation).
//!
//! ## What it does **not** guarantee
//! - No global ordering across different subscribers (use `Event::seq`).
//! - No retries on queue overflow: events are dropped for that subscriber.
//!
//! ```text
//!    emit(&Event)
//!        │                        (Arc-clone per subscriber)
//!        ├────────────────► [queue S1] ─► worker S1 ─► on_event()
//!        ├────────────────► [queue S2] ─► worker S2 ─► on_event()
//!        └────────────────► [queue SN] ─► worker SN ─► on_event()
//! ```

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::events::Event;

use super::subscriber::Subscribe;

/// Per-subscriber channel with metadata.
struct Channel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Composite fan-out with per-subscriber bounded queues and worker tasks.
pub struct SubscriberSet {
    channels: Vec<Channel>,
    workers: Vec<JoinHandle<()>>,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker per subscriber.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let name = sub.name();
            let cap = sub.queue_capacity().max(1);
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(cap);

            let worker = tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = sub.on_event(ev.as_ref());
                    if let Err(panic) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        eprintln!("[ordervisor] subscriber '{}' panicked: {panic:?}", sub.name());
                    }
                }
            });

            channels.push(Channel { name, sender: tx });
            workers.push(worker);
        }

        Self { channels, workers }
    }

    /// Number of subscribers in the set.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns `true` when the set has no subscribers.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Fan-out one event to all subscribers (non-blocking).
    ///
    /// If a subscriber's queue is **full** or its worker is gone, the event
    /// is dropped for it and a warning is printed with the subscriber name.
    pub fn emit(&self, event: &Event) {
        let ev = Arc::new(event.clone());
        for channel in &self.channels {
            match channel.sender.try_send(Arc::clone(&ev)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    eprintln!(
                        "[ordervisor] subscriber '{}' dropped event: queue full",
                        channel.name
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    eprintln!(
                        "[ordervisor] subscriber '{}' dropped event: worker closed",
                        channel.name
                    );
                }
            }
        }
    }
}

impl Drop for SubscriberSet {
    fn drop(&mut self) {
        // Drop cannot await a drain: workers are aborted and any events
        // still queued at teardown are discarded.
        self.channels.clear();
        for worker in &self.workers {
            worker.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::events::{Event, EventKind};
    use crate::subscribers::Subscribe;

    use super::SubscriberSet;

    struct Counting {
        seen: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Subscribe for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn on_event(&self, _event: &Event) {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Panicking;

    #[async_trait]
    impl Subscribe for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }

        async fn on_event(&self, _event: &Event) {
            panic!("subscriber blew up");
        }
    }

    async fn wait_until(check: impl Fn() -> bool) {
        for _ in 0..1000 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test(start_paused = true)]
    async fn emit_fans_out_to_every_subscriber() {
        let seen_a = Arc::new(AtomicUsize::new(0));
        let seen_b = Arc::new(AtomicUsize::new(0));
        let set = SubscriberSet::new(vec![
            Arc::new(Counting {
                seen: Arc::clone(&seen_a),
            }),
            Arc::new(Counting {
                seen: Arc::clone(&seen_b),
            }),
        ]);
        assert_eq!(set.len(), 2);

        for _ in 0..3 {
            set.emit(&Event::new(EventKind::PermitGranted).with_task("t"));
        }

        wait_until(|| seen_a.load(Ordering::SeqCst) == 3).await;
        wait_until(|| seen_b.load(Ordering::SeqCst) == 3).await;
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_subscriber_is_isolated() {
        let seen = Arc::new(AtomicUsize::new(0));
        let set = SubscriberSet::new(vec![
            Arc::new(Panicking) as Arc<dyn Subscribe>,
            Arc::new(Counting {
                seen: Arc::clone(&seen),
            }),
        ]);

        // Per-subscriber FIFO must survive a sibling panicking on every event.
        for _ in 0..4 {
            set.emit(&Event::new(EventKind::TaskReady).with_task("t"));
        }

        wait_until(|| seen.load(Ordering::SeqCst) == 4).await;
    }
}
