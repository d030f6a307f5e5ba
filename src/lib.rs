//! # ordervisor
//!
//! **Ordervisor** is a bounded-resource admission-control library for Rust.
//!
//! It provides primitives to bound concurrent access to a shared resource
//! (a fixed pool of permits with a FIFO wait queue), run multi-stage tasks
//! against that pool, and aggregate several tasks into a composite order
//! whose completion fires exactly once. The crate is designed as a building
//! block for higher-level pipelines; it owns no sockets, files, or wire
//! formats.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ StagedTask   │   │ StagedTask   │   │ StagedTask   │
//!     │ (activity 1) │   │ (activity 2) │   │ (activity 3) │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ acquire          │ acquire          │ acquire
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  ResourcePool (admission actor)                                   │
//! │  - in_use ≤ capacity, always                                      │
//! │  - pending: FIFO queue of waiters                                 │
//! │  - grants delivered via oneshot (never inline)                    │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!     Permit             Permit             Permit      (release on drop)
//!
//!     CompositeOrder ── spawns tasks, aggregates outcomes ── handler ×1
//!     Dispatcher ── batch of orders + bus fan-out + grace shutdown
//! ```
//!
//! ### Task lifecycle
//! ```text
//! Idle ──run──► AwaitingPermit ──grant──► Active ──ok──► Completed
//!                     │                     │
//!                     │ cancel              │ activity error / cancel
//!                     ▼                     ▼
//!                   Failed                Failed
//!
//! The permit is held exactly while Active and released on every exit path.
//! ```
//!
//! ## Guarantees
//! | Area           | Guarantee                                                        |
//! |----------------|------------------------------------------------------------------|
//! | **Capacity**   | At most `capacity` permits are held at any instant.              |
//! | **Fairness**   | Waiters are admitted in strict arrival order; no starvation.     |
//! | **Release**    | A permit releases exactly once (idempotent, drop-guarded).       |
//! | **Delivery**   | An order's handler fires exactly once, for any interleaving.     |
//! | **Failure**    | The first failed part fails the order; later successes are       |
//! |                | observed and ignored, and sibling permits still come back.       |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use ordervisor::{Bus, CompositeOrder, ResourcePool, StagedTask, TimedHold};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // One cooker, eight burners.
//!     let pool = ResourcePool::new(8, Bus::new(256));
//!
//!     let order = CompositeOrder::new(
//!         "hotdog-1",
//!         vec![
//!             StagedTask::new("fry-1", TimedHold::arc("sausage", Duration::from_millis(150))),
//!             StagedTask::new("bake-1", TimedHold::arc("bread", Duration::from_millis(100))),
//!         ],
//!     );
//!
//!     let receipt = order.run(&pool, &CancellationToken::new()).await?;
//!     assert_eq!(receipt.parts.len(), 2);
//!     Ok(())
//! }
//! ```

mod config;
mod dispatch;
mod error;
mod events;
mod order;
mod pool;
mod subscribers;
mod task;

// ---- Public re-exports ----

pub use config::Config;
pub use dispatch::{Dispatcher, OrderHandler, OrderSpec};
pub use error::{OrderError, RuntimeError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use order::{CompositeOrder, OrderReceipt, PartReceipt};
pub use pool::{Permit, ResourcePool};
pub use subscribers::{Subscribe, SubscriberSet};
pub use task::{Activity, ActivityFn, ActivityRef, StagedTask, TaskState, TimedHold};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
