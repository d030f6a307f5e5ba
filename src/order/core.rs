//! # CompositeOrder: exactly-once aggregation over concurrent tasks.
//!
//! ## Architecture
//! ```text
//! CompositeOrder::run
//!   ├─► spawn task 1 ──┐
//!   ├─► spawn task 2 ──┼── outcome mpsc ──► aggregation loop (this future)
//!   └─► spawn task N ──┘                        │
//!                                               ├─ all ready ──► Ok(receipt)   once
//!                                               └─ first fail ─► Err(..)       once
//! ```
//!
//! The aggregation loop is the order's serialized domain: it is the only
//! reader of the outcome channel, so two tasks finishing on different
//! workers at the same instant can never both decide "all ready". The loop
//! returns exactly once; outcomes arriving after that are observed by the
//! closed channel and ignored.
//!
//! ## Rules
//! - Task membership is fixed at construction.
//! - Failure short-circuits success: the first failed part fails the order
//!   even if every sibling later succeeds.
//! - Sibling tasks of a failed order keep running detached; their permits
//!   are still released through the permit drop guard.
//! - Cancelling the order token cancels all child task tokens and delivers
//!   `OrderError::Canceled` — still exactly once.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{OrderError, TaskError};
use crate::events::{Event, EventKind};
use crate::pool::ResourcePool;
use crate::task::StagedTask;

/// One delivered part of an [`OrderReceipt`].
#[derive(Debug, Clone)]
pub struct PartReceipt {
    /// Task identifier.
    pub task: Arc<str>,
    /// Activity label of the part (e.g. the requested ingredient).
    pub label: Arc<str>,
}

/// Successful outcome of a composite order.
///
/// Parts appear in construction order, so callers can match the receipt
/// against what was requested.
#[derive(Debug, Clone)]
pub struct OrderReceipt {
    /// Order identifier.
    pub order: Arc<str>,
    /// All delivered parts.
    pub parts: Vec<PartReceipt>,
}

/// Aggregation of staged tasks sharing one completion, fired exactly once.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
/// use ordervisor::{Bus, CompositeOrder, ResourcePool, StagedTask, TimedHold};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let pool = ResourcePool::new(8, Bus::new(64));
/// let order = CompositeOrder::new(
///     "hotdog-1",
///     vec![
///         StagedTask::new("fry-1", TimedHold::arc("sausage", Duration::from_millis(15))),
///         StagedTask::new("bake-1", TimedHold::arc("bread", Duration::from_millis(10))),
///     ],
/// );
///
/// let receipt = order.run(&pool, &CancellationToken::new()).await.unwrap();
/// assert_eq!(receipt.parts.len(), 2);
/// assert_eq!(&*receipt.parts[0].label, "sausage");
/// # }
/// ```
pub struct CompositeOrder {
    id: Arc<str>,
    tasks: Vec<Arc<StagedTask>>,
}

impl CompositeOrder {
    /// Creates an order over the given tasks. Membership is fixed from here on.
    pub fn new(id: impl Into<Arc<str>>, tasks: Vec<Arc<StagedTask>>) -> Self {
        Self {
            id: id.into(),
            tasks,
        }
    }

    /// Stable identifier of this order.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The constituent tasks, in construction order.
    pub fn tasks(&self) -> &[Arc<StagedTask>] {
        &self.tasks
    }

    /// Runs every task concurrently and resolves exactly once.
    ///
    /// Resolves `Ok` with a receipt when all tasks report ready, or `Err` as
    /// soon as the first task fails (later sibling outcomes are ignored).
    /// An empty order delivers immediately.
    pub async fn run(
        &self,
        pool: &Arc<ResourcePool>,
        token: &CancellationToken,
    ) -> Result<OrderReceipt, OrderError> {
        let total = self.tasks.len();
        if total == 0 {
            pool.bus()
                .publish(Event::new(EventKind::OrderDelivered).with_order(Arc::clone(&self.id)));
            return Ok(self.receipt());
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<(Arc<str>, Result<(), TaskError>)>();
        for task in &self.tasks {
            let task = Arc::clone(task);
            let pool = Arc::clone(pool);
            let child = token.child_token();
            let tx = tx.clone();
            tokio::spawn(async move {
                let res = task.run(&pool, &child).await;
                let _ = tx.send((task.id_arc(), res));
            });
        }
        drop(tx);

        let mut ready = 0usize;
        while let Some(outcome) = rx.recv().await {
            match outcome {
                (_, Ok(())) => {
                    ready += 1;
                    if ready == total {
                        pool.bus().publish(
                            Event::new(EventKind::OrderDelivered)
                                .with_order(Arc::clone(&self.id)),
                        );
                        return Ok(self.receipt());
                    }
                }
                (task, Err(source)) => {
                    // A part cancelled through the order token is an order
                    // cancellation, not a part defect.
                    let err = if token.is_cancelled() && matches!(source, TaskError::Canceled) {
                        OrderError::Canceled
                    } else {
                        OrderError::PartFailed { task, source }
                    };
                    return Err(self.fail(pool, err));
                }
            }
        }

        // Only reachable if a worker vanished without reporting (panic);
        // treat like cancellation.
        Err(self.fail(pool, OrderError::Canceled))
    }

    /// Spawns [`CompositeOrder::run`] and invokes `handler` with the outcome
    /// exactly once.
    pub fn execute<H>(
        self,
        pool: Arc<ResourcePool>,
        token: CancellationToken,
        handler: H,
    ) -> JoinHandle<()>
    where
        H: FnOnce(Result<OrderReceipt, OrderError>) + Send + 'static,
    {
        tokio::spawn(async move {
            let result = self.run(&pool, &token).await;
            handler(result);
        })
    }

    fn receipt(&self) -> OrderReceipt {
        OrderReceipt {
            order: Arc::clone(&self.id),
            parts: self
                .tasks
                .iter()
                .map(|t| PartReceipt {
                    task: t.id_arc(),
                    label: t.label().into(),
                })
                .collect(),
        }
    }

    fn fail(&self, pool: &ResourcePool, err: OrderError) -> OrderError {
        pool.bus().publish(
            Event::new(EventKind::OrderFailed)
                .with_order(Arc::clone(&self.id))
                .with_reason(err.as_message()),
        );
        err
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use rand::Rng;
    use tokio_util::sync::CancellationToken;

    use crate::error::{OrderError, TaskError};
    use crate::events::Bus;
    use crate::pool::ResourcePool;
    use crate::task::{ActivityFn, StagedTask, TimedHold};

    use super::CompositeOrder;

    fn timed_task(id: &str, label: &'static str, ms: u64) -> Arc<StagedTask> {
        StagedTask::new(id, TimedHold::arc(label, Duration::from_millis(ms)))
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_receipt_with_all_parts() {
        let pool = ResourcePool::new(8, Bus::new(64));
        let order = CompositeOrder::new(
            "o1",
            vec![
                timed_task("fry", "sausage", 150),
                timed_task("bake", "bread", 100),
            ],
        );

        let receipt = order.run(&pool, &CancellationToken::new()).await.unwrap();
        assert_eq!(&*receipt.order, "o1");
        let labels: Vec<&str> = receipt.parts.iter().map(|p| &*p.label).collect();
        assert_eq!(labels, vec!["sausage", "bread"]);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_order_delivers_immediately() {
        let pool = ResourcePool::new(1, Bus::new(16));
        let order = CompositeOrder::new("empty", Vec::new());
        let receipt = order.run(&pool, &CancellationToken::new()).await.unwrap();
        assert!(receipt.parts.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn handler_fires_exactly_once_over_randomized_interleavings() {
        let pool = ResourcePool::new(2, Bus::new(256));
        let fired = Arc::new(AtomicUsize::new(0));
        let mut rng = rand::thread_rng();

        const RUNS: usize = 1000;
        let mut handles = Vec::new();
        for i in 0..RUNS {
            let tasks = (0..3)
                .map(|p| {
                    let ms = rng.gen_range(1..50);
                    timed_task(&format!("o{i}-p{p}"), "part", ms)
                })
                .collect();
            let order = CompositeOrder::new(format!("o{i}"), tasks);
            let fired = Arc::clone(&fired);
            handles.push(order.execute(
                Arc::clone(&pool),
                CancellationToken::new(),
                move |res| {
                    assert!(res.is_ok());
                    fired.fetch_add(1, Ordering::SeqCst);
                },
            ));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(fired.load(Ordering::SeqCst), RUNS);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_short_circuits_and_ignores_late_success() {
        let pool = ResourcePool::new(8, Bus::new(64));
        let failing = StagedTask::new(
            "bad",
            ActivityFn::arc("bad", |_ctx: CancellationToken| async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Err::<(), _>(TaskError::ActivityFailed {
                    error: "burner flameout".into(),
                })
            }),
        );
        let slow_ok = timed_task("slow", "bread", 500);

        let fired = Arc::new(AtomicUsize::new(0));
        let order = CompositeOrder::new("o-fail", vec![failing, Arc::clone(&slow_ok)]);
        let fired_h = Arc::clone(&fired);
        let handle = order.execute(
            Arc::clone(&pool),
            CancellationToken::new(),
            move |res| {
                match res {
                    Err(OrderError::PartFailed { task, .. }) => assert_eq!(&*task, "bad"),
                    other => panic!("unexpected outcome: {other:?}"),
                }
                fired_h.fetch_add(1, Ordering::SeqCst);
            },
        );
        handle.await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Let the slow sibling finish; it must not re-invoke anything and
        // must have returned its permit.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(slow_ok.is_ready());
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        let mut permits = Vec::new();
        for i in 0..pool.capacity() {
            permits.push(
                pool.acquire(format!("drain-{i}"), &CancellationToken::new())
                    .await
                    .unwrap(),
            );
        }
        assert_eq!(permits.len(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_delivers_once_and_frees_capacity() {
        let pool = ResourcePool::new(1, Bus::new(64));
        let order = CompositeOrder::new(
            "o-cancel",
            vec![
                timed_task("a", "part", 60_000),
                timed_task("b", "part", 60_000),
            ],
        );

        let token = CancellationToken::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_h = Arc::clone(&fired);
        let handle = order.execute(Arc::clone(&pool), token.clone(), move |res| {
            assert!(matches!(res, Err(OrderError::Canceled)));
            fired_h.fetch_add(1, Ordering::SeqCst);
        });

        tokio::task::yield_now().await;
        token.cancel();
        handle.await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Both the active holder and the queued waiter must be gone.
        let next = pool
            .acquire("next", &CancellationToken::new())
            .await
            .unwrap();
        assert!(next.is_held());
    }
}
