//! # Staged tasks and their activities.
//!
//! A [`StagedTask`] is a small state machine around one resource-bound
//! activity: it acquires a pool [`Permit`](crate::Permit), runs the activity
//! while `Active`, and releases the permit on every exit path.
//!
//! The work itself is an [`Activity`] — an async, cancelable trait object.
//! [`TimedHold`] is the reference implementation (occupy the resource for a
//! fixed duration); [`ActivityFn`] wraps a closure.

mod activity;
mod staged;

pub use self::activity::{Activity, ActivityFn, ActivityRef, TimedHold};
pub use self::staged::{StagedTask, TaskState};
