//! # Activity abstraction and built-in implementations.
//!
//! This module defines the [`Activity`] trait (async, cancelable) and two
//! implementations: [`TimedHold`], the reference resource-occupying wait,
//! and [`ActivityFn`], a closure-backed activity producing a fresh future
//! per run.
//!
//! An activity receives a [`CancellationToken`] and should stop promptly
//! when it fires; the owning task treats cancellation as a terminal failure
//! and releases its permit either way.

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Shared handle to an activity.
pub type ActivityRef = Arc<dyn Activity>;

/// # The resource-bound part of a staged task.
///
/// Runs only while the owning task holds a permit (is `Active`). A label
/// identifies the activity in events and receipts; an optional planned
/// duration feeds observability.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use ordervisor::{Activity, TaskError};
///
/// struct Toast;
///
/// #[async_trait]
/// impl Activity for Toast {
///     fn label(&self) -> &str { "toast" }
///
///     async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
///         if ctx.is_cancelled() {
///             return Err(TaskError::Canceled);
///         }
///         // occupy the resource...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Activity: Send + Sync + 'static {
    /// Returns a stable, human-readable activity label.
    fn label(&self) -> &str;

    /// Planned duration of the activity, when known up front.
    ///
    /// Purely informational (attached to `TaskStarting` events).
    fn planned_hold(&self) -> Option<Duration> {
        None
    }

    /// Performs the activity until completion or cancellation.
    ///
    /// Implementations must not block the worker thread; waits go through
    /// the timer, not `std::thread::sleep`.
    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError>;
}

/// Occupies the resource for a fixed duration.
///
/// This is the reference activity: a bounded timed hold (frying time on a
/// burner). The wait is a scheduled timer, cancellable at any point.
#[derive(Debug, Clone)]
pub struct TimedHold {
    label: Cow<'static, str>,
    hold: Duration,
}

impl TimedHold {
    /// Creates a timed hold with the given label and duration.
    pub fn new(label: impl Into<Cow<'static, str>>, hold: Duration) -> Self {
        Self {
            label: label.into(),
            hold,
        }
    }

    /// Creates the activity and returns it as a shared handle.
    pub fn arc(label: impl Into<Cow<'static, str>>, hold: Duration) -> ActivityRef {
        Arc::new(Self::new(label, hold))
    }
}

#[async_trait]
impl Activity for TimedHold {
    fn label(&self) -> &str {
        &self.label
    }

    fn planned_hold(&self) -> Option<Duration> {
        Some(self.hold)
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
        tokio::select! {
            _ = tokio::time::sleep(self.hold) => Ok(()),
            _ = ctx.cancelled() => Err(TaskError::Canceled),
        }
    }
}

/// Closure-backed activity.
///
/// Wraps a closure that *creates* a new future per run, so there is no
/// hidden shared state between runs; if you need shared state, move an
/// `Arc<...>` into the closure explicitly.
///
/// ## Example
/// ```rust
/// use tokio_util::sync::CancellationToken;
/// use ordervisor::{ActivityFn, ActivityRef, TaskError};
///
/// let act: ActivityRef = ActivityFn::arc("probe", |_ctx: CancellationToken| async {
///     Ok::<_, TaskError>(())
/// });
///
/// assert_eq!(act.label(), "probe");
/// ```
#[derive(Debug)]
pub struct ActivityFn<F> {
    label: Cow<'static, str>,
    f: F,
}

impl<F> ActivityFn<F> {
    /// Creates a new closure-backed activity.
    ///
    /// Prefer [`ActivityFn::arc`] when you immediately need an [`ActivityRef`].
    pub fn new(label: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            label: label.into(),
            f,
        }
    }

    /// Creates the activity and returns it as a shared handle.
    pub fn arc(label: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(label, f))
    }
}

#[async_trait]
impl<F, Fut> Activity for ActivityFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static, // Fn, not FnMut
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn label(&self) -> &str {
        &self.label
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
        (self.f)(ctx).await
    }
}
