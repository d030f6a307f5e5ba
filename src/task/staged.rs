//! # StagedTask: permit-bound activity state machine.
//!
//! Supervises one activity through the admission pipeline:
//!
//! ```text
//! Idle ──start──► AwaitingPermit ──grant──► Active ──activity ok──► Completed
//!                       │                     │
//!                       │ cancel / closed     │ activity err / cancel
//!                       ▼                     ▼
//!                     Failed ◄────────────── Failed
//! ```
//!
//! ## Rules
//! - `run` is a lifecycle method: a second call while in flight returns
//!   `AlreadyStarted`, a call after a terminal state returns
//!   `AlreadyCompleted` — both synchronously, before any await.
//! - The permit is held exactly while `Active` and is released on **every**
//!   exit path (the permit's drop guard covers activity errors and
//!   cancellation).
//! - Marking the task ready is only legal from `Active`; anything else is a
//!   defect trapped by `debug_assert!`.
//! - The permit is released **before** the ready/failed event is published,
//!   so a queued successor can be admitted while this task's aggregation
//!   bookkeeping still runs.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::events::{Event, EventKind};
use crate::pool::ResourcePool;

use super::activity::ActivityRef;

/// Lifecycle state of a [`StagedTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    /// Not started yet.
    Idle = 0,
    /// Queued (or about to queue) for a pool permit.
    AwaitingPermit = 1,
    /// Holding a permit; the activity is running.
    Active = 2,
    /// Terminal: activity finished normally.
    Completed = 3,
    /// Terminal: activity failed or the task was cancelled.
    Failed = 4,
}

impl TaskState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => TaskState::Idle,
            1 => TaskState::AwaitingPermit,
            2 => TaskState::Active,
            3 => TaskState::Completed,
            _ => TaskState::Failed,
        }
    }

    /// Returns `true` for `Completed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

/// One resource-bound preparation step of an order.
///
/// Cheap to share via `Arc`; the state machine is lock-free (a single atomic
/// word), so `state()` can be polled from anywhere while `run` is in flight.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
/// use ordervisor::{Bus, ResourcePool, StagedTask, TaskState, TimedHold};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let pool = ResourcePool::new(1, Bus::new(16));
/// let task = StagedTask::new("fry-sausage", TimedHold::arc("fry", Duration::from_millis(5)));
///
/// task.run(&pool, &CancellationToken::new()).await.unwrap();
/// assert_eq!(task.state(), TaskState::Completed);
/// assert!(task.is_ready());
/// # }
/// ```
pub struct StagedTask {
    id: Arc<str>,
    activity: ActivityRef,
    state: AtomicU8,
}

impl StagedTask {
    /// Creates a new task in the `Idle` state.
    pub fn new(id: impl Into<Arc<str>>, activity: ActivityRef) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            activity,
            state: AtomicU8::new(TaskState::Idle as u8),
        })
    }

    /// Stable identifier of this task.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn id_arc(&self) -> Arc<str> {
        Arc::clone(&self.id)
    }

    /// Label of the underlying activity.
    pub fn label(&self) -> &str {
        self.activity.label()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns `true` once the activity finished normally.
    pub fn is_ready(&self) -> bool {
        self.state() == TaskState::Completed
    }

    /// Runs the task to a terminal state: acquire a permit, run the
    /// activity, release the permit.
    ///
    /// Sequencing misuse (`AlreadyStarted`, `AlreadyCompleted`) is returned
    /// before any await and leaves the pool untouched. All other errors are
    /// terminal outcomes of this execution.
    pub async fn run(
        &self,
        pool: &ResourcePool,
        token: &CancellationToken,
    ) -> Result<(), TaskError> {
        self.begin()?;

        let permit = match pool.acquire(Arc::clone(&self.id), token).await {
            Ok(permit) => permit,
            Err(e) => {
                self.fail();
                pool.bus().publish(
                    Event::new(EventKind::TaskFailed)
                        .with_task(Arc::clone(&self.id))
                        .with_reason(e.as_label()),
                );
                return Err(e);
            }
        };

        self.activate();
        let mut starting = Event::new(EventKind::TaskStarting).with_task(Arc::clone(&self.id));
        if let Some(hold) = self.activity.planned_hold() {
            starting = starting.with_hold(hold);
        }
        pool.bus().publish(starting);

        // Cooperative cancellation: the activity gets a child token and is
        // expected to stop promptly when it fires.
        let result = self.activity.run(token.child_token()).await;

        drop(permit);

        match result {
            Ok(()) => {
                self.complete();
                pool.bus()
                    .publish(Event::new(EventKind::TaskReady).with_task(Arc::clone(&self.id)));
                Ok(())
            }
            Err(e) => {
                self.fail();
                pool.bus().publish(
                    Event::new(EventKind::TaskFailed)
                        .with_task(Arc::clone(&self.id))
                        .with_reason(e.as_message()),
                );
                Err(e)
            }
        }
    }

    /// `Idle → AwaitingPermit`, or a synchronous sequencing error.
    fn begin(&self) -> Result<(), TaskError> {
        match self.state.compare_exchange(
            TaskState::Idle as u8,
            TaskState::AwaitingPermit as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(()),
            Err(actual) => match TaskState::from_u8(actual) {
                TaskState::AwaitingPermit | TaskState::Active => Err(TaskError::AlreadyStarted {
                    task: Arc::clone(&self.id),
                }),
                _ => Err(TaskError::AlreadyCompleted {
                    task: Arc::clone(&self.id),
                }),
            },
        }
    }

    /// `AwaitingPermit → Active`. Reaching this from any other state is a defect.
    fn activate(&self) {
        let prev = self
            .state
            .swap(TaskState::Active as u8, Ordering::AcqRel);
        debug_assert_eq!(
            TaskState::from_u8(prev),
            TaskState::AwaitingPermit,
            "activated out of sequence"
        );
    }

    /// `Active → Completed`. Marking ready outside `Active` is a defect; the
    /// mark is dropped in release builds.
    fn complete(&self) {
        let res = self.state.compare_exchange(
            TaskState::Active as u8,
            TaskState::Completed as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        debug_assert!(res.is_ok(), "marked ready outside Active");
    }

    /// Any non-terminal state `→ Failed`.
    fn fail(&self) {
        let mut current = self.state.load(Ordering::Acquire);
        while !TaskState::from_u8(current).is_terminal() {
            match self.state.compare_exchange_weak(
                current,
                TaskState::Failed as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use crate::error::TaskError;
    use crate::events::Bus;
    use crate::pool::ResourcePool;
    use crate::task::{ActivityFn, StagedTask, TaskState, TimedHold};

    #[tokio::test(start_paused = true)]
    async fn runs_to_completed() {
        let pool = ResourcePool::new(1, Bus::new(16));
        let task = StagedTask::new("t", TimedHold::arc("hold", Duration::from_millis(150)));
        let token = CancellationToken::new();

        assert_eq!(task.state(), TaskState::Idle);
        task.run(&pool, &token).await.unwrap();
        assert_eq!(task.state(), TaskState::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_fails_synchronously() {
        let pool = ResourcePool::new(1, Bus::new(16));
        let task = StagedTask::new("t", TimedHold::arc("hold", Duration::from_secs(10)));
        let token = CancellationToken::new();

        let runner = {
            let task = Arc::clone(&task);
            let pool = Arc::clone(&pool);
            let token = token.clone();
            tokio::spawn(async move { task.run(&pool, &token).await })
        };
        tokio::task::yield_now().await;

        let err = task.run(&pool, &token).await.unwrap_err();
        assert!(matches!(err, TaskError::AlreadyStarted { .. }));
        assert!(err.is_sequencing());

        token.cancel();
        let _ = runner.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_terminal_state_fails() {
        let pool = ResourcePool::new(1, Bus::new(16));
        let task = StagedTask::new("t", TimedHold::arc("hold", Duration::from_millis(1)));
        let token = CancellationToken::new();

        task.run(&pool, &token).await.unwrap();
        let err = task.run(&pool, &token).await.unwrap_err();
        assert!(matches!(err, TaskError::AlreadyCompleted { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_fails_task_and_frees_capacity() {
        let pool = ResourcePool::new(1, Bus::new(16));
        let task = StagedTask::new("t", TimedHold::arc("hold", Duration::from_secs(60)));
        let token = CancellationToken::new();

        let runner = {
            let task = Arc::clone(&task);
            let pool = Arc::clone(&pool);
            let token = token.clone();
            tokio::spawn(async move { task.run(&pool, &token).await })
        };
        tokio::task::yield_now().await;
        token.cancel();

        assert!(matches!(runner.await.unwrap(), Err(TaskError::Canceled)));
        assert_eq!(task.state(), TaskState::Failed);

        // The permit must have been released on the failure path.
        let next = pool
            .acquire("next", &CancellationToken::new())
            .await
            .unwrap();
        assert!(next.is_held());
    }

    #[tokio::test(start_paused = true)]
    async fn activity_error_fails_task_and_frees_capacity() {
        let pool = ResourcePool::new(1, Bus::new(16));
        let task = StagedTask::new(
            "t",
            ActivityFn::arc("boom", |_ctx: CancellationToken| async {
                Err::<(), _>(TaskError::ActivityFailed {
                    error: "boom".into(),
                })
            }),
        );

        let err = task
            .run(&pool, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::ActivityFailed { .. }));
        assert_eq!(task.state(), TaskState::Failed);

        let next = pool
            .acquire("next", &CancellationToken::new())
            .await
            .unwrap();
        assert!(next.is_held());
    }
}
