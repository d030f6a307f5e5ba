//! Error types used by the ordervisor runtime and staged tasks.
//!
//! This module defines three error enums:
//!
//! - [`TaskError`] — errors raised by a single staged task (lifecycle misuse,
//!   activity failure, cancellation).
//! - [`OrderError`] — terminal outcome of a composite order that did not
//!   deliver a receipt.
//! - [`RuntimeError`] — errors raised by the dispatch runtime itself.
//!
//! All types provide helper methods (`as_label`, `as_message`) for
//! logging/metrics, plus predicates such as [`TaskError::is_sequencing`].
//!
//! Invariant violations (negative pool counters, completing a task that is
//! not `Active`) are **not** represented here: they are programming defects,
//! trapped by `debug_assert!` in debug builds and reported as a
//! `CapacityViolated` event in release builds.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// # Errors produced by a single staged task.
///
/// Sequencing errors (`AlreadyStarted`, `AlreadyCompleted`) are reported
/// synchronously to the caller of the offending method and never touch the
/// pool. The remaining variants are terminal outcomes of a running task.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    /// `start` was called while the task was already in flight.
    #[error("task '{task}' already started")]
    AlreadyStarted {
        /// Name of the offending task.
        task: Arc<str>,
    },

    /// `start` was called on a task that already reached a terminal state.
    #[error("task '{task}' already completed")]
    AlreadyCompleted {
        /// Name of the offending task.
        task: Arc<str>,
    },

    /// The activity reported an abnormal termination instead of finishing.
    #[error("activity failed: {error}")]
    ActivityFailed {
        /// The underlying error message.
        error: String,
    },

    /// The task was cancelled via its token (while queued or while active).
    #[error("task cancelled")]
    Canceled,

    /// The resource pool actor is gone (runtime shut down mid-acquire).
    #[error("resource pool closed")]
    PoolClosed,
}

impl TaskError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use ordervisor::TaskError;
    ///
    /// let err = TaskError::Canceled;
    /// assert_eq!(err.as_label(), "task_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::AlreadyStarted { .. } => "task_already_started",
            TaskError::AlreadyCompleted { .. } => "task_already_completed",
            TaskError::ActivityFailed { .. } => "task_activity_failed",
            TaskError::Canceled => "task_canceled",
            TaskError::PoolClosed => "task_pool_closed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::AlreadyStarted { task } => format!("already started: {task}"),
            TaskError::AlreadyCompleted { task } => format!("already completed: {task}"),
            TaskError::ActivityFailed { error } => format!("activity failed: {error}"),
            TaskError::Canceled => "cancelled".to_string(),
            TaskError::PoolClosed => "pool closed".to_string(),
        }
    }

    /// Indicates whether the error is a lifecycle-sequencing misuse.
    ///
    /// Sequencing errors (`AlreadyStarted`, `AlreadyCompleted`) are surfaced
    /// to the caller of the lifecycle method and do not represent a failed
    /// execution attempt.
    ///
    /// # Example
    /// ```
    /// use ordervisor::TaskError;
    ///
    /// let seq = TaskError::AlreadyStarted { task: "fry".into() };
    /// assert!(seq.is_sequencing());
    ///
    /// let term = TaskError::Canceled;
    /// assert!(!term.is_sequencing());
    /// ```
    pub fn is_sequencing(&self) -> bool {
        matches!(
            self,
            TaskError::AlreadyStarted { .. } | TaskError::AlreadyCompleted { .. }
        )
    }
}

/// # Terminal failure of a composite order.
///
/// Delivered to the order handler exactly once, in place of a receipt.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum OrderError {
    /// A constituent task failed; the order fails immediately.
    ///
    /// Sibling tasks keep running detached and release their permits, but
    /// their later outcomes are ignored.
    #[error("part '{task}' failed: {source}")]
    PartFailed {
        /// Name of the failed task.
        task: Arc<str>,
        /// The task-level failure.
        source: TaskError,
    },

    /// The order's cancellation token fired before delivery.
    #[error("order cancelled")]
    Canceled,
}

impl OrderError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            OrderError::PartFailed { .. } => "order_part_failed",
            OrderError::Canceled => "order_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            OrderError::PartFailed { task, source } => {
                format!("part failed: task={task} error={}", source.as_message())
            }
            OrderError::Canceled => "cancelled".to_string(),
        }
    }
}

/// # Errors produced by the dispatch runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some orders were still undelivered.
    #[error("shutdown grace {grace:?} exceeded; pending orders: {pending:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of orders that had not delivered in time.
        pending: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, pending } => {
                format!("grace exceeded after {grace:?}; pending orders={pending:?}")
            }
        }
    }
}
