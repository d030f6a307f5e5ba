//! # Event subscribers for the ordervisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the non-blocking
//! [`SubscriberSet`] fan-out, and (behind the `logging` feature) a built-in
//! [`LogWriter`] for demos.
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   pool / tasks / orders ── publish(Event) ──► Bus
//!                                               │
//!                              Dispatcher listener (single receiver)
//!                                               │
//!                                    SubscriberSet::emit(&Event)
//!                                    ┌─────────┼─────────┐
//!                                    ▼         ▼         ▼
//!                                 LogWriter  Metrics   Custom
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscriber;

#[cfg(feature = "logging")]
pub use self::log::LogWriter;
pub use self::set::SubscriberSet;
pub use self::subscriber::Subscribe;
