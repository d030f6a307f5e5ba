//! # Runtime events emitted by the pool, staged tasks, and orders.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Admission events**: permit queueing, grants, and releases
//! - **Task lifecycle events**: a staged task entering/leaving its states
//! - **Order events**: composite delivery outcomes
//! - **Runtime events**: shutdown progress and defect traps
//!
//! The [`Event`] struct carries additional metadata such as timestamps,
//! task/order names, reasons, and queue depths.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! delivered out of order.
//!
//! ## Example
//! ```rust
//! use ordervisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TaskFailed)
//!     .with_task("fry-sausage")
//!     .with_order("hotdog-1")
//!     .with_reason("cancelled");
//!
//! assert_eq!(ev.kind, EventKind::TaskFailed);
//! assert_eq!(ev.task.as_deref(), Some("fry-sausage"));
//! assert_eq!(ev.order.as_deref(), Some("hotdog-1"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Admission events ===
    /// A permit request could not be granted immediately and was queued.
    ///
    /// Sets:
    /// - `task`: requester name
    /// - `depth`: pending queue depth after insertion
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    PermitQueued,

    /// A permit was granted (immediately, or handed off from a releaser).
    ///
    /// Sets:
    /// - `task`: holder name
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    PermitGranted,

    /// A permit was released back to the pool.
    ///
    /// Sets:
    /// - `task`: former holder name
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    PermitReleased,

    /// Defect trap: the pool counter would have gone negative.
    ///
    /// Fatal (`debug_assert!`) in debug builds; in release builds the
    /// release is ignored and this event is the only observable effect.
    ///
    /// Sets:
    /// - `reason`: description of the violated invariant
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    CapacityViolated,

    // === Task lifecycle events ===
    /// Task was admitted and its activity is starting.
    ///
    /// Sets:
    /// - `task`: task name
    /// - `hold_ms`: planned activity duration, when known
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    TaskStarting,

    /// Task's activity finished normally; the task is ready.
    ///
    /// Sets:
    /// - `task`: task name
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    TaskReady,

    /// Task ended in failure (activity error or cancellation).
    ///
    /// Sets:
    /// - `task`: task name
    /// - `reason`: failure message
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    TaskFailed,

    // === Order events ===
    /// All parts of an order reported ready; the handler was invoked.
    ///
    /// Sets:
    /// - `order`: order name
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    OrderDelivered,

    /// An order failed (first part failure, or cancellation).
    ///
    /// Sets:
    /// - `order`: order name
    /// - `reason`: failure message
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    OrderFailed,

    // === Runtime events ===
    /// Shutdown requested (runtime token cancelled).
    ///
    /// Sets:
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    ShutdownRequested,

    /// All orders delivered within the configured grace period.
    ///
    /// Sets:
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    AllStoppedWithin,

    /// Grace period exceeded; some orders were still undelivered.
    ///
    /// Sets:
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    GraceExceeded,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,

    /// Event classification.
    pub kind: EventKind,
    /// Name of the task, if applicable.
    pub task: Option<Arc<str>>,
    /// Name of the order, if applicable.
    pub order: Option<Arc<str>>,
    /// Human-readable reason (errors, defect details, etc.).
    pub reason: Option<Arc<str>>,
    /// Planned activity duration in milliseconds (compact).
    pub hold_ms: Option<u32>,
    /// Pending queue depth at the time of the event.
    pub depth: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and
    /// next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            order: None,
            reason: None,
            hold_ms: None,
            depth: None,
        }
    }

    /// Attaches a task name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches an order name.
    #[inline]
    pub fn with_order(mut self, order: impl Into<Arc<str>>) -> Self {
        self.order = Some(order.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a planned activity duration (stored as milliseconds).
    #[inline]
    pub fn with_hold(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.hold_ms = Some(ms);
        self
    }

    /// Attaches the pending queue depth.
    #[inline]
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth.min(u32::MAX as usize) as u32);
        self
    }

    /// Creates a capacity-violation defect event.
    #[inline]
    pub fn capacity_violated(reason: &'static str) -> Self {
        Event::new(EventKind::CapacityViolated).with_reason(reason)
    }
}
