//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints events to stdout in a human-readable format.
//!
//! ## Output format
//! ```text
//! [queued] task=bake-2 depth=3
//! [granted] task=bake-2
//! [starting] task=bake-2 hold_ms=100
//! [ready] task=bake-2
//! [released] task=bake-2
//! [delivered] order=hotdog-2
//! [order-failed] order=hotdog-3 reason="part failed: ..."
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};

use super::subscriber::Subscribe;

/// Simple stdout logging subscriber.
///
/// Enabled via the `logging` feature. Prints human-readable event
/// descriptions to stdout for debugging and demonstration purposes.
///
/// Not intended for production use — implement a custom [`Subscribe`] for
/// structured logging or metrics collection.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    fn name(&self) -> &'static str {
        "log-writer"
    }

    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::PermitQueued => {
                println!("[queued] task={:?} depth={:?}", e.task, e.depth);
            }
            EventKind::PermitGranted => {
                println!("[granted] task={:?}", e.task);
            }
            EventKind::PermitReleased => {
                println!("[released] task={:?}", e.task);
            }
            EventKind::CapacityViolated => {
                println!("[capacity-violated] reason={:?}", e.reason);
            }
            EventKind::TaskStarting => {
                println!("[starting] task={:?} hold_ms={:?}", e.task, e.hold_ms);
            }
            EventKind::TaskReady => {
                println!("[ready] task={:?}", e.task);
            }
            EventKind::TaskFailed => {
                println!("[failed] task={:?} reason={:?}", e.task, e.reason);
            }
            EventKind::OrderDelivered => {
                println!("[delivered] order={:?}", e.order);
            }
            EventKind::OrderFailed => {
                println!("[order-failed] order={:?} reason={:?}", e.order, e.reason);
            }
            EventKind::ShutdownRequested => {
                println!("[shutdown-requested]");
            }
            EventKind::AllStoppedWithin => {
                println!("[all-stopped-within-grace]");
            }
            EventKind::GraceExceeded => {
                println!("[grace-exceeded]");
            }
        }
    }
}
