//! # Single-use admission permit.
//!
//! A [`Permit`] represents one admitted unit of pool capacity. It is created
//! only by the pool actor on a successful grant and is owned exclusively by
//! the task that acquired it (movable, never shared).
//!
//! ## Rules
//! - Held → released happens **at most once**; a second [`Permit::release`]
//!   is a safe no-op and never double-decrements the pool counter.
//! - Dropping a held permit releases it — every exit path (normal return,
//!   early return, cancellation, panic unwind) returns capacity to the pool.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::core::PoolCmd;

/// One admitted unit of capacity from a [`ResourcePool`](super::ResourcePool).
///
/// Releasing (explicitly or on drop) sends a release command back to the
/// pool actor, which either hands the capacity to the front queued waiter or
/// decrements the in-use counter.
#[derive(Debug)]
pub struct Permit {
    /// Present while held; taken on release so a second release is a no-op.
    releaser: Option<mpsc::UnboundedSender<PoolCmd>>,
    holder: Arc<str>,
}

impl Permit {
    pub(crate) fn new(releaser: mpsc::UnboundedSender<PoolCmd>, holder: Arc<str>) -> Self {
        Self {
            releaser: Some(releaser),
            holder,
        }
    }

    /// Name of the requester this permit was granted to.
    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// Returns `true` if the permit has not been released yet.
    pub fn is_held(&self) -> bool {
        self.releaser.is_some()
    }

    /// Releases the permit back to the pool.
    ///
    /// Idempotent: the first call returns capacity to the pool, every
    /// subsequent call (and the eventual drop) is a no-op.
    pub fn release(&mut self) {
        if let Some(tx) = self.releaser.take() {
            // The actor may already be gone during shutdown; nothing to
            // return capacity to in that case.
            let _ = tx.send(PoolCmd::Release {
                holder: Arc::clone(&self.holder),
            });
        }
    }

    /// Drops the permit without notifying the pool.
    ///
    /// Used by the actor when a grant could not be delivered: the capacity
    /// was never handed out, so no release must be recorded.
    pub(crate) fn disarm(mut self) {
        self.releaser = None;
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.release();
    }
}
