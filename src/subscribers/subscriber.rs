//! # The `Subscribe` trait.
//!
//! Implement this to observe runtime events (logging, metrics, alerting).
//! Handlers run on a dedicated worker task per subscriber, fed from a
//! bounded queue, so a slow subscriber never blocks publishers.

use async_trait::async_trait;

use crate::events::Event;

/// # Asynchronous event observer.
///
/// ## Example
/// ```rust
/// use async_trait::async_trait;
/// use ordervisor::{Event, EventKind, Subscribe};
///
/// struct FailureCounter;
///
/// #[async_trait]
/// impl Subscribe for FailureCounter {
///     fn name(&self) -> &'static str { "failure-counter" }
///
///     async fn on_event(&self, ev: &Event) {
///         if ev.kind == EventKind::TaskFailed {
///             // increment a counter...
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Stable subscriber name, used in overflow/panic diagnostics.
    fn name(&self) -> &'static str {
        "subscriber"
    }

    /// Capacity of this subscriber's event queue.
    ///
    /// When the queue is full, new events are dropped for this subscriber
    /// (publishers are never blocked).
    fn queue_capacity(&self) -> usize {
        256
    }

    /// Handles one event.
    async fn on_event(&self, event: &Event);
}
