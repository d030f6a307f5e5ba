//! # Global runtime configuration.
//!
//! Provides [`Config`], centralized settings for the dispatch runtime.
//!
//! Config is used in two ways:
//! 1. **Dispatcher creation**: `Dispatcher::new(config, subscribers)`
//! 2. **Pool sizing**: `capacity` bounds concurrent permit holders
//!
//! ## Field semantics
//! - `capacity`: number of concurrently admitted tasks (must be `> 0`)
//! - `bus_capacity`: event bus ring buffer size (min 1; clamped by `Bus`)
//! - `grace`: maximum wait for in-flight orders during shutdown

use std::time::Duration;

/// Global configuration for the dispatch runtime.
///
/// Defines:
/// - **Admission limits**: how many tasks may hold a permit at once
/// - **Event system**: bus capacity for event delivery
/// - **Shutdown behavior**: grace period for draining in-flight orders
///
/// ## Notes
/// All fields are public for flexibility. Prefer the accessor helpers to
/// avoid sprinkling clamp logic across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Number of capacity units in the shared resource pool.
    ///
    /// Fixed for the lifetime of the pool. Requests beyond `capacity` are
    /// queued FIFO, never rejected. Must be greater than zero; the pool
    /// constructor clamps `0` up to `1`.
    pub capacity: usize,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages
    /// will receive `Lagged` and skip older items. Minimum value is 1.
    pub bus_capacity: usize,

    /// Maximum time to wait for in-flight orders during shutdown.
    ///
    /// When the runtime token is cancelled:
    /// - Orders are cancelled via their child tokens
    /// - The dispatcher waits up to `grace` for handlers to fire
    /// - If the timeout elapses, `RuntimeError::GraceExceeded` is returned
    pub grace: Duration,
}

impl Config {
    /// Returns the pool capacity clamped to a minimum of 1.
    #[inline]
    pub fn capacity_clamped(&self) -> usize {
        self.capacity.max(1)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    ///
    /// The `Bus` uses this value to avoid constructing an invalid channel.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `capacity = 8` (the reference kitchen has one cooker with 8 burners)
    /// - `bus_capacity = 1024` (good baseline)
    /// - `grace = 60s` (reasonable drain window)
    fn default() -> Self {
        Self {
            capacity: 8,
            bus_capacity: 1024,
            grace: Duration::from_secs(60),
        }
    }
}
