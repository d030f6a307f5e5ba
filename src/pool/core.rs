//! # ResourcePool: FIFO admission actor.
//!
//! The pool state (`in_use`, `pending`) is owned by a single actor task and
//! mutated only there; handles and permits communicate with it through an
//! unbounded command channel. This gives a total order over concurrent
//! `acquire`/`release` calls without locks.
//!
//! ## Lifecycle
//! The actor runs until every handle **and** every outstanding permit is
//! dropped (permits carry a sender clone). On exit it asserts that no
//! capacity is still checked out.
//!
//! ## Grant path
//! Grants are sent through a oneshot channel, never invoked inline:
//! a releaser's stack frame only enqueues the handoff, the admitted task
//! resumes on its own executor task.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};

use super::permit::Permit;

/// Commands processed by the pool actor.
#[derive(Debug)]
pub(crate) enum PoolCmd {
    /// Request one unit of capacity.
    Acquire(Waiter),
    /// Return one unit of capacity (sent by [`Permit`]).
    Release { holder: Arc<str> },
}

/// A pending admission request.
#[derive(Debug)]
pub(crate) struct Waiter {
    id: Arc<str>,
    grant: oneshot::Sender<Permit>,
    token: CancellationToken,
    /// Sender clone embedded into the granted permit so its release can
    /// reach the actor without the actor holding itself alive.
    releaser: mpsc::UnboundedSender<PoolCmd>,
}

/// Shared, fixed-capacity admission controller.
///
/// Cheap to share via `Arc`; all methods take `&self`.
///
/// ## Example
/// ```rust
/// use ordervisor::{Bus, ResourcePool};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let pool = ResourcePool::new(2, Bus::new(16));
/// let token = CancellationToken::new();
///
/// let permit = pool.acquire("fry", &token).await.unwrap();
/// assert!(permit.is_held());
/// drop(permit); // capacity returns to the pool
/// # }
/// ```
pub struct ResourcePool {
    capacity: usize,
    tx: mpsc::UnboundedSender<PoolCmd>,
    bus: Bus,
}

impl ResourcePool {
    /// Creates a pool with the given capacity and spawns its actor.
    ///
    /// `capacity` is clamped to a minimum of 1.
    pub fn new(capacity: usize, bus: Bus) -> Arc<Self> {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::unbounded_channel();

        let actor = PoolActor {
            capacity,
            in_use: 0,
            pending: VecDeque::new(),
            bus: bus.clone(),
        };
        tokio::spawn(actor.run(rx));

        Arc::new(Self { capacity, tx, bus })
    }

    /// Fixed capacity of this pool.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Event bus shared by this pool and everything built on top of it.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Requests one unit of capacity.
    ///
    /// Resolves with a [`Permit`] once admitted — immediately if the pool has
    /// free capacity, otherwise after queued predecessors release (strict
    /// FIFO, no starvation). Admission is never rejected; the only error
    /// paths are cancellation and runtime shutdown.
    ///
    /// Cancelling `token` while queued abandons the request: the actor skips
    /// it at handoff time and it never consumes capacity. If cancellation
    /// races with a grant, the undelivered permit is released automatically.
    pub async fn acquire(
        &self,
        id: impl Into<Arc<str>>,
        token: &CancellationToken,
    ) -> Result<Permit, TaskError> {
        let (grant_tx, grant_rx) = oneshot::channel();
        let waiter = Waiter {
            id: id.into(),
            grant: grant_tx,
            token: token.clone(),
            releaser: self.tx.clone(),
        };
        self.tx
            .send(PoolCmd::Acquire(waiter))
            .map_err(|_| TaskError::PoolClosed)?;

        tokio::select! {
            biased;
            _ = token.cancelled() => Err(TaskError::Canceled),
            res = grant_rx => res.map_err(|_| TaskError::PoolClosed),
        }
    }
}

/// State confined to the actor task.
struct PoolActor {
    capacity: usize,
    in_use: usize,
    pending: VecDeque<Waiter>,
    bus: Bus,
}

impl PoolActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<PoolCmd>) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                PoolCmd::Acquire(waiter) => self.on_acquire(waiter),
                PoolCmd::Release { holder } => self.on_release(&holder),
            }
        }
        // The channel closes only after every handle and permit is gone,
        // so leaked capacity here means a permit bypassed its Drop.
        debug_assert!(self.in_use == 0, "pool dropped with {} permits held", self.in_use);
    }

    fn on_acquire(&mut self, waiter: Waiter) {
        if waiter.token.is_cancelled() {
            return;
        }
        if self.in_use < self.capacity {
            if self.try_grant(waiter) {
                self.in_use += 1;
            }
        } else {
            self.bus.publish(
                Event::new(EventKind::PermitQueued)
                    .with_task(Arc::clone(&waiter.id))
                    .with_depth(self.pending.len() + 1),
            );
            self.pending.push_back(waiter);
        }
    }

    fn on_release(&mut self, holder: &Arc<str>) {
        self.bus
            .publish(Event::new(EventKind::PermitReleased).with_task(Arc::clone(holder)));

        // Hand the freed unit to the first still-live waiter; `in_use`
        // stays unchanged on a handoff.
        while let Some(waiter) = self.pending.pop_front() {
            if waiter.token.is_cancelled() {
                continue;
            }
            if self.try_grant(waiter) {
                return;
            }
        }

        if self.in_use == 0 {
            debug_assert!(false, "release without matching acquire");
            self.bus
                .publish(Event::capacity_violated("release without matching acquire"));
            return;
        }
        self.in_use -= 1;
    }

    /// Attempts to deliver a permit; returns `false` if the waiter is gone.
    fn try_grant(&self, waiter: Waiter) -> bool {
        let permit = Permit::new(waiter.releaser, Arc::clone(&waiter.id));
        match waiter.grant.send(permit) {
            Ok(()) => {
                self.bus
                    .publish(Event::new(EventKind::PermitGranted).with_task(waiter.id));
                true
            }
            Err(permit) => {
                // Receiver dropped before delivery: the capacity was never
                // handed out, so the returned permit must not release.
                permit.disarm();
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    use crate::error::TaskError;
    use crate::events::{Bus, EventKind};

    use super::ResourcePool;

    /// Waits until the bus reports the given kind for the given task.
    async fn wait_for(
        rx: &mut tokio::sync::broadcast::Receiver<crate::events::Event>,
        kind: EventKind,
        task: &str,
    ) {
        loop {
            let ev = rx.recv().await.expect("bus closed");
            if ev.kind == kind && ev.task.as_deref() == Some(task) {
                return;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_is_never_exceeded() {
        let pool = ResourcePool::new(3, Bus::new(64));
        let token = CancellationToken::new();

        let held = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..16 {
            let pool = Arc::clone(&pool);
            let token = token.clone();
            let held = Arc::clone(&held);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let permit = pool.acquire(format!("r{i}"), &token).await.unwrap();
                let now = held.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                held.fetch_sub(1, Ordering::SeqCst);
                drop(permit);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3, "peak {} > capacity", peak.load(Ordering::SeqCst));
        assert_eq!(held.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn admission_order_is_arrival_order() {
        let pool = ResourcePool::new(1, Bus::new(64));
        let token = CancellationToken::new();
        let mut events = pool.bus().subscribe();

        let first = pool.acquire("r0", &token).await.unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for name in ["r1", "r2", "r3"] {
            let pool = Arc::clone(&pool);
            let token = token.clone();
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let permit = pool.acquire(name, &token).await.unwrap();
                order.lock().await.push(name);
                drop(permit);
            }));
            // Arrival order must be established before the next request.
            wait_for(&mut events, EventKind::PermitQueued, name).await;
        }

        drop(first);
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(*order.lock().await, vec!["r1", "r2", "r3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn double_release_is_idempotent() {
        let pool = ResourcePool::new(1, Bus::new(64));
        let token = CancellationToken::new();
        let mut events = pool.bus().subscribe();

        let mut a = pool.acquire("a", &token).await.unwrap();

        let pool_b = Arc::clone(&pool);
        let token_b = token.clone();
        let b = tokio::spawn(async move { pool_b.acquire("b", &token_b).await.unwrap() });
        wait_for(&mut events, EventKind::PermitQueued, "b").await;

        a.release();
        a.release(); // no-op: must not free a second unit
        assert!(!a.is_held());

        let b_permit = b.await.unwrap();
        assert!(b_permit.is_held());

        // With b holding the only unit, a third request must still queue.
        let pool_c = Arc::clone(&pool);
        let token_c = token.clone();
        let c = tokio::spawn(async move { pool_c.acquire("c", &token_c).await.unwrap() });
        wait_for(&mut events, EventKind::PermitQueued, "c").await;

        drop(b_permit);
        c.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn released_capacity_goes_to_next_queued_not_later_arrivals() {
        let pool = ResourcePool::new(1, Bus::new(64));
        let token = CancellationToken::new();
        let mut events = pool.bus().subscribe();

        let a = pool.acquire("a", &token).await.unwrap();

        let pool_b = Arc::clone(&pool);
        let token_b = token.clone();
        let b = tokio::spawn(async move { pool_b.acquire("b", &token_b).await.unwrap() });
        wait_for(&mut events, EventKind::PermitQueued, "b").await;

        let pool_c = Arc::clone(&pool);
        let token_c = token.clone();
        let c = tokio::spawn(async move { pool_c.acquire("c", &token_c).await.unwrap() });
        wait_for(&mut events, EventKind::PermitQueued, "c").await;

        drop(a);
        wait_for(&mut events, EventKind::PermitGranted, "b").await;
        assert!(!c.is_finished());

        drop(b.await.unwrap());
        c.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_waiter_is_skipped_at_handoff() {
        let pool = ResourcePool::new(1, Bus::new(64));
        let token = CancellationToken::new();
        let mut events = pool.bus().subscribe();

        let a = pool.acquire("a", &token).await.unwrap();

        let b_token = CancellationToken::new();
        let pool_b = Arc::clone(&pool);
        let b_tok = b_token.clone();
        let b = tokio::spawn(async move { pool_b.acquire("b", &b_tok).await });
        wait_for(&mut events, EventKind::PermitQueued, "b").await;

        let pool_c = Arc::clone(&pool);
        let token_c = token.clone();
        let c = tokio::spawn(async move { pool_c.acquire("c", &token_c).await.unwrap() });
        wait_for(&mut events, EventKind::PermitQueued, "c").await;

        b_token.cancel();
        assert!(matches!(b.await.unwrap(), Err(TaskError::Canceled)));

        // b never consumes capacity: releasing a admits c directly.
        drop(a);
        c.await.unwrap();
    }
}
