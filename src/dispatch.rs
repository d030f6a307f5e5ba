//! # Dispatcher: wires the pool, the bus, and a batch of orders together.
//!
//! The [`Dispatcher`] owns the event bus, the shared [`ResourcePool`], and a
//! [`SubscriberSet`]; it spawns one aggregation future per submitted order
//! and drives them to completion with a grace-bounded shutdown.
//!
//! ## High-level architecture
//! ```text
//! Inputs to run():
//!   Vec<OrderSpec>  ──►  Dispatcher::run(specs, runtime_token)
//!
//! Spawn orders:
//!   OrderSpec[0]  OrderSpec[1]  ...  OrderSpec[N-1]
//!       │             │                   │
//!       └──► CompositeOrder::run(pool, child_token); handler(outcome)
//!
//! Event flow:
//!   pool/tasks/orders ── publish ──► Bus ──► listener ──► SubscriberSet::emit
//!
//! Shutdown path:
//!   runtime_token.cancel()
//!       └─► Bus.publish(ShutdownRequested)
//!       └─► child tokens cancel → orders deliver Canceled
//!       └─► wait up to Config::grace:
//!              ├─ all handlers fired  → Bus.publish(AllStoppedWithin)
//!              └─ grace exceeded      → Bus.publish(GraceExceeded)
//!                                       Err(RuntimeError::GraceExceeded)
//! ```
//!
//! No OS signals, sockets, or CLI here: the runtime token is the host
//! program's hook.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{OrderError, RuntimeError};
use crate::events::{Bus, Event, EventKind};
use crate::order::{CompositeOrder, OrderReceipt};
use crate::pool::ResourcePool;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Completion callback of one order, invoked exactly once.
pub type OrderHandler = Box<dyn FnOnce(Result<OrderReceipt, OrderError>) + Send + 'static>;

/// An order paired with its completion handler.
pub struct OrderSpec {
    order: CompositeOrder,
    handler: OrderHandler,
}

impl OrderSpec {
    /// Bundles an order with the handler to fire on its outcome.
    pub fn new<H>(order: CompositeOrder, handler: H) -> Self
    where
        H: FnOnce(Result<OrderReceipt, OrderError>) + Send + 'static,
    {
        Self {
            order,
            handler: Box::new(handler),
        }
    }

    /// Convenience: the order's name.
    pub fn name(&self) -> &str {
        self.order.id()
    }
}

/// Coordinates order execution over one shared pool, with event fan-out and
/// graceful shutdown.
pub struct Dispatcher {
    /// Global runtime configuration.
    pub cfg: Config,
    /// Event bus shared with the pool and all orders.
    pub bus: Bus,
    /// The shared admission pool.
    pub pool: Arc<ResourcePool>,
    /// Fan-out set for subscribers.
    pub subs: Arc<SubscriberSet>,
}

impl Dispatcher {
    /// Creates a dispatcher with the given config and subscribers, and wires
    /// the bus listener that feeds them.
    pub fn new(cfg: Config, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let pool = ResourcePool::new(cfg.capacity_clamped(), bus.clone());
        let subs = Arc::new(SubscriberSet::new(subscribers));

        let dispatcher = Self {
            cfg,
            bus,
            pool,
            subs,
        };
        dispatcher.subscriber_listener();
        dispatcher
    }

    /// The shared pool, for composing orders or acquiring permits directly.
    pub fn pool(&self) -> &Arc<ResourcePool> {
        &self.pool
    }

    /// Subscribes to the bus and forwards events to the subscriber set
    /// (fire-and-forget).
    fn subscriber_listener(&self) {
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        tokio::spawn(async move {
            while let Ok(ev) = rx.recv().await {
                set.emit(&ev);
            }
        });
    }

    /// Runs the provided orders until either:
    /// - every order's handler has fired, or
    /// - `runtime_token` is cancelled → graceful shutdown (may end with
    ///   [`RuntimeError::GraceExceeded`]).
    ///
    /// Order ids need not be unique: undelivered orders are tracked per
    /// name with a count, and the grace report lists each name that still
    /// has at least one undelivered instance.
    pub async fn run(
        &self,
        orders: Vec<OrderSpec>,
        runtime_token: CancellationToken,
    ) -> Result<(), RuntimeError> {
        let pending: Arc<Mutex<BTreeMap<String, usize>>> = Arc::new(Mutex::new(BTreeMap::new()));

        let mut set = JoinSet::new();
        for spec in orders {
            let name = spec.order.id().to_string();
            *lock(&pending).entry(name.clone()).or_insert(0) += 1;

            let pool = Arc::clone(&self.pool);
            let child = runtime_token.child_token();
            let pending = Arc::clone(&pending);
            set.spawn(async move {
                let result = spec.order.run(&pool, &child).await;
                (spec.handler)(result);

                let mut pending = lock(&pending);
                if let Some(n) = pending.get_mut(&name) {
                    *n -= 1;
                    if *n == 0 {
                        pending.remove(&name);
                    }
                }
            });
        }

        tokio::select! {
            _ = runtime_token.cancelled() => {
                self.bus.publish(Event::new(EventKind::ShutdownRequested));
                self.wait_all_with_grace(&mut set, &pending).await
            }
            _ = async { while set.join_next().await.is_some() {} } => {
                Ok(())
            }
        }
    }

    /// Waits for all order handlers to fire within the configured grace
    /// period.
    ///
    /// Publishes [`EventKind::AllStoppedWithin`] on success, or
    /// [`EventKind::GraceExceeded`] on timeout and returns
    /// [`RuntimeError::GraceExceeded`] with the undelivered order names.
    async fn wait_all_with_grace(
        &self,
        set: &mut JoinSet<()>,
        pending: &Mutex<BTreeMap<String, usize>>,
    ) -> Result<(), RuntimeError> {
        let grace = self.cfg.grace;
        let done = async { while set.join_next().await.is_some() {} };

        match tokio::time::timeout(grace, done).await {
            Ok(_) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                self.bus.publish(Event::new(EventKind::GraceExceeded));
                let pending = lock(pending).keys().cloned().collect();
                Err(RuntimeError::GraceExceeded { grace, pending })
            }
        }
    }
}

/// Locks a mutex, recovering the guard if a handler panicked while holding it.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
